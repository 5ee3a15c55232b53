mod common;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::wait_until;
use storefront::supervisor::{ProcessLauncher, RestartPolicy, Supervisor, Worker, WorkerLauncher};
use tokio::sync::oneshot;

/// Launches in-process stand-ins that exit when told to.
#[derive(Default)]
struct FakeLauncher {
    launches: AtomicUsize,
    /// Fails this many launches before succeeding.
    failures_left: AtomicUsize,
    /// Panics this many launches after the failures are used up.
    panics_left: AtomicUsize,
    running: Mutex<Vec<oneshot::Sender<i32>>>,
}

struct FakeWorker {
    pid: u32,
    exit: oneshot::Receiver<i32>,
}

#[async_trait]
impl Worker for FakeWorker {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok((&mut self.exit).await.ok())
    }
}

#[async_trait]
impl WorkerLauncher for FakeLauncher {
    async fn launch(&self, _slot: usize) -> io::Result<Box<dyn Worker>> {
        let attempt = self.launches.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(io::Error::other("spawn refused"));
        }
        if self
            .panics_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("launcher blew up");
        }

        let (tx, rx) = oneshot::channel();
        self.running.lock().unwrap().push(tx);
        Ok(Box::new(FakeWorker {
            pid: 1000 + u32::try_from(attempt).unwrap(),
            exit: rx,
        }))
    }
}

impl FakeLauncher {
    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn running(&self) -> usize {
        self.running
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Makes the oldest running worker exit with a crash code.
    fn crash_one(&self) {
        let tx = self.running.lock().unwrap().remove(0);
        tx.send(1).unwrap();
    }
}

fn quick_policy() -> RestartPolicy {
    RestartPolicy {
        window: Duration::from_secs(60),
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn pool_starts_one_worker_per_slot_and_replaces_each_exit_once() {
    let launcher = Arc::new(FakeLauncher::default());
    let (stop, stopped) = oneshot::channel::<()>();
    let supervisor = Supervisor::new(Arc::clone(&launcher), 4, quick_policy());
    let handle = tokio::spawn(supervisor.run(async {
        let _ = stopped.await;
    }));

    wait_until(|| launcher.launches() == 4).await;
    assert_eq!(launcher.running(), 4);

    launcher.crash_one();
    wait_until(|| launcher.launches() == 5).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(launcher.launches(), 5);
    assert_eq!(launcher.running(), 4);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn slot_that_keeps_crashing_is_respawned_with_a_delay() {
    let launcher = Arc::new(FakeLauncher::default());
    let (stop, stopped) = oneshot::channel::<()>();
    let supervisor = Supervisor::new(Arc::clone(&launcher), 1, quick_policy());
    let handle = tokio::spawn(supervisor.run(async {
        let _ = stopped.await;
    }));

    wait_until(|| launcher.launches() == 1).await;
    launcher.crash_one();
    wait_until(|| launcher.launches() == 2).await;

    // Second exit inside the window waits base_delay before relaunching
    launcher.crash_one();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(launcher.launches(), 2);
    assert_eq!(launcher.running(), 0);

    wait_until(|| launcher.launches() == 3).await;
    assert_eq!(launcher.running(), 1);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn failed_launch_is_retried() {
    let launcher = Arc::new(FakeLauncher {
        failures_left: AtomicUsize::new(1),
        ..FakeLauncher::default()
    });
    let (stop, stopped) = oneshot::channel::<()>();
    let policy = RestartPolicy {
        base_delay: Duration::from_millis(10),
        ..quick_policy()
    };
    let supervisor = Supervisor::new(Arc::clone(&launcher), 1, policy);
    let handle = tokio::spawn(supervisor.run(async {
        let _ = stopped.await;
    }));

    wait_until(|| launcher.running() == 1).await;
    assert_eq!(launcher.launches(), 2);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_drops_every_worker() {
    let launcher = Arc::new(FakeLauncher::default());
    let (stop, stopped) = oneshot::channel::<()>();
    let supervisor = Supervisor::new(Arc::clone(&launcher), 3, quick_policy());
    let handle = tokio::spawn(supervisor.run(async {
        let _ = stopped.await;
    }));

    wait_until(|| launcher.running() == 3).await;
    stop.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(launcher.running(), 0);
}

#[tokio::test]
async fn slot_survives_a_panicking_launch() {
    let launcher = Arc::new(FakeLauncher {
        panics_left: AtomicUsize::new(1),
        ..FakeLauncher::default()
    });
    let (stop, stopped) = oneshot::channel::<()>();
    let supervisor = Supervisor::new(Arc::clone(&launcher), 1, quick_policy());
    let handle = tokio::spawn(supervisor.run(async {
        let _ = stopped.await;
    }));

    wait_until(|| launcher.running() == 1).await;
    assert_eq!(launcher.launches(), 2);

    // The replacement is a regular slot again and gets replaced on exit
    launcher.crash_one();
    wait_until(|| launcher.launches() == 3).await;
    wait_until(|| launcher.running() == 1).await;

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn process_worker_reports_the_exit_code() {
    let launcher = ProcessLauncher::new("sh", vec!["-c".into(), "exit 3".into()]);

    let mut worker = launcher.launch(0).await.unwrap();

    assert!(worker.pid().is_some());
    assert_eq!(worker.wait().await.unwrap(), Some(3));
}
