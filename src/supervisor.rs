//! Fixed-size pool of worker processes.
//!
//! The primary launches one worker per slot and waits on all of them. When
//! a worker exits, for whatever reason, its slot gets exactly one
//! replacement. Slots that keep dying are respawned with an exponentially
//! growing delay instead of in a tight loop.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

/// A running worker.
#[async_trait]
pub trait Worker: Send {
    fn pid(&self) -> Option<u32>;

    /// Waits for the worker to exit. `Ok(None)` means it was killed by a
    /// signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Starts workers for the supervisor.
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    async fn launch(&self, slot: usize) -> io::Result<Box<dyn Worker>>;
}

/// Launches workers by re-executing the current binary in worker role.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// This executable with `--mode cluster --worker`.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            vec!["--mode".into(), "cluster".into(), "--worker".into()],
        ))
    }
}

struct ProcessWorker {
    child: Child,
}

#[async_trait]
impl Worker for ProcessWorker {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, _slot: usize) -> io::Result<Box<dyn Worker>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Box::new(ProcessWorker { child }))
    }
}

/// Respawn delays for a slot, based on how often it exited recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Exits older than this no longer count against a slot.
    pub window: Duration,
    /// Delay after the second exit inside the window; doubles after that.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RestartPolicy {
    /// Delay before respawning a slot with `recent_exits` exits (this one
    /// included) inside the window. The first is respawned immediately.
    pub fn delay_for(&self, recent_exits: usize) -> Duration {
        if recent_exits <= 1 {
            return Duration::ZERO;
        }
        let doublings = u32::try_from(recent_exits - 2).unwrap_or(u32::MAX).min(16);
        self.base_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay)
    }
}

/// Exit timestamps of one slot inside the policy window.
#[derive(Debug, Default)]
struct RestartHistory {
    exits: VecDeque<Instant>,
}

impl RestartHistory {
    fn record_exit(&mut self, now: Instant, policy: &RestartPolicy) -> Duration {
        while let Some(oldest) = self.exits.front() {
            if now.saturating_duration_since(*oldest) > policy.window {
                self.exits.pop_front();
            } else {
                break;
            }
        }
        self.exits.push_back(now);
        policy.delay_for(self.exits.len())
    }
}

struct SlotExit {
    slot: usize,
    pid: Option<u32>,
    status: io::Result<Option<i32>>,
}

pub struct Supervisor<L> {
    launcher: Arc<L>,
    size: usize,
    policy: RestartPolicy,
}

impl<L: WorkerLauncher> Supervisor<L> {
    pub fn new(launcher: Arc<L>, size: usize, policy: RestartPolicy) -> Self {
        Self {
            launcher,
            size,
            policy,
        }
    }

    /// Keeps `size` workers alive until `shutdown` resolves, then drops
    /// them all (process workers are killed on drop).
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut pool = JoinSet::new();
        let mut slots: HashMap<task::Id, usize> = HashMap::with_capacity(self.size);
        let mut history: Vec<RestartHistory> =
            (0..self.size).map(|_| RestartHistory::default()).collect();

        for slot in 0..self.size {
            let handle = pool.spawn(run_slot(Arc::clone(&self.launcher), slot, Duration::ZERO));
            slots.insert(handle.id(), slot);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(workers = pool.len(), "Primary shutting down");
                    pool.shutdown().await;
                    return;
                }
                Some(joined) = pool.join_next_with_id() => {
                    let slot = match joined {
                        Ok((id, exit)) => {
                            slots.remove(&id);
                            let pid = display_pid(exit.pid);
                            match &exit.status {
                                Ok(code) => info!(slot = exit.slot, ?code, "worker {pid} died"),
                                Err(err) => warn!(slot = exit.slot, error = %err, "worker {pid} failed"),
                            }
                            exit.slot
                        }
                        Err(err) => {
                            let Some(slot) = slots.remove(&err.id()) else {
                                error!(error = %err, "unknown worker task failed");
                                continue;
                            };
                            error!(slot, error = %err, "worker task failed");
                            slot
                        }
                    };

                    let delay = history[slot].record_exit(Instant::now(), &self.policy);
                    if !delay.is_zero() {
                        warn!(
                            slot,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "worker restarting too often, delaying respawn"
                        );
                    }
                    let handle = pool.spawn(run_slot(Arc::clone(&self.launcher), slot, delay));
                    slots.insert(handle.id(), slot);
                }
            }
        }
    }
}

async fn run_slot<L: WorkerLauncher>(launcher: Arc<L>, slot: usize, delay: Duration) -> SlotExit {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut worker = match launcher.launch(slot).await {
        Ok(worker) => worker,
        Err(err) => {
            return SlotExit {
                slot,
                pid: None,
                status: Err(err),
            }
        }
    };

    let pid = worker.pid();
    info!(slot, "worker {} is running", display_pid(pid));
    let status = worker.wait().await;

    SlotExit { slot, pid, status }
}

fn display_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "?".to_owned(), |pid| pid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            window: Duration::from_secs(60),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn first_exit_is_respawned_immediately() {
        assert_eq!(policy().delay_for(1), Duration::ZERO);
    }

    #[test]
    fn repeated_exits_back_off_exponentially_up_to_the_cap() {
        let policy = policy();
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(800));
        assert_eq!(policy.delay_for(6), Duration::from_secs(1));
        assert_eq!(policy.delay_for(10_000), Duration::from_secs(1));
    }

    #[test]
    fn exits_outside_the_window_are_forgotten() {
        let policy = policy();
        let mut history = RestartHistory::default();
        let start = Instant::now();

        assert_eq!(history.record_exit(start, &policy), Duration::ZERO);
        assert_eq!(
            history.record_exit(start + Duration::from_secs(1), &policy),
            Duration::from_millis(100)
        );
        // Both earlier exits have aged out
        assert_eq!(
            history.record_exit(start + Duration::from_secs(120), &policy),
            Duration::ZERO
        );
    }
}
