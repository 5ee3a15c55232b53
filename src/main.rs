use clap::Parser;
use dotenvy::dotenv;
use storefront::bootstrap::bootstrap;
use storefront::cli::{Cli, Role};
use storefront::config::Config;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let role = cli.role();
    let config = Config::from_env()?;

    // Cluster workers already run one per core
    let runtime = match role {
        Role::Worker => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?,
        Role::Single | Role::Primary => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?,
    };

    runtime.block_on(bootstrap(role, config))?;

    Ok(())
}
