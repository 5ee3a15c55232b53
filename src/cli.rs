//! Command-line arguments.

use clap::{Parser, ValueEnum};

/// How the server process is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// One process serving HTTP.
    #[default]
    Fork,
    /// A supervising primary plus one worker process per CPU core.
    Cluster,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "storefront", version, about = "Storefront web server")]
pub struct Cli {
    #[arg(short, long, value_enum, default_value_t = Mode::Fork)]
    pub mode: Mode,

    /// Set by the cluster primary on the processes it spawns.
    #[arg(long, hide = true)]
    pub worker: bool,
}

/// Which part a process plays once its arguments are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Single,
    Primary,
    Worker,
}

impl Cli {
    pub fn role(&self) -> Role {
        match (self.mode, self.worker) {
            (Mode::Fork, _) => Role::Single,
            (Mode::Cluster, false) => Role::Primary,
            (Mode::Cluster, true) => Role::Worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_is_the_default_mode() {
        let cli = Cli::try_parse_from(["storefront"]).unwrap();
        assert_eq!(cli.mode, Mode::Fork);
        assert_eq!(cli.role(), Role::Single);
    }

    #[test]
    fn short_flag_selects_cluster_primary() {
        let cli = Cli::try_parse_from(["storefront", "-m", "cluster"]).unwrap();
        assert_eq!(cli.role(), Role::Primary);
    }

    #[test]
    fn worker_flag_marks_spawned_processes() {
        let cli = Cli::try_parse_from(["storefront", "--mode", "cluster", "--worker"]).unwrap();
        assert_eq!(cli.role(), Role::Worker);
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert!(Cli::try_parse_from(["storefront", "--mode", "threads"]).is_err());
    }
}
