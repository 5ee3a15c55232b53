//! Best-effort notifications sent after a user registers.
//!
//! Sinks are fed by [`Notifier`], a bounded queue drained by a background
//! task. Request handlers only enqueue; delivery, retry and failure
//! logging happen off the request path, so a sink failure can never change
//! the outcome of a registration.

mod email;
mod whatsapp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::users::User;

pub use email::EmailSink;
pub use whatsapp::WhatsAppSink;

/// Notices waiting for delivery before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rejected by provider: {0}")]
    Rejected(String),
}

/// A delivery channel for new-user notices.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &'static str;

    async fn notify(&self, user: &User) -> Result<(), NotifyError>;
}

/// Sink used for channels without provider settings: the notice only
/// reaches the logs.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    channel: &'static str,
}

impl LogSink {
    pub fn new(channel: &'static str) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        self.channel
    }

    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        info!(
            channel = self.channel,
            user_id = user.id,
            email = %user.email,
            "new user notice (no provider configured)"
        );
        Ok(())
    }
}

/// Text body shared by the email and WhatsApp notices. Never includes the
/// password digest.
pub fn new_user_message(user: &User) -> String {
    format!(
        "NUEVO USUARIO REGISTRADO\n\
         NOMBRE: {}\n\
         DIRECCION: {}\n\
         EDAD: {}\n\
         TELEFONO: {}\n\
         EMAIL: {}\n\
         FOTO PERFIL: /uploads/{}",
        user.name, user.address, user.age, user.phone, user.email, user.photo
    )
}

/// Retry schedule for a single sink delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based, so attempt 1 has
    /// none).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 | 1 => Duration::ZERO,
            n => self
                .base_delay
                .saturating_mul(1u32 << (n - 2).min(16)),
        }
    }
}

/// Handle to the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<User>,
}

impl Notifier {
    /// Starts the dispatcher task on the current runtime.
    ///
    /// The task ends once every `Notifier` clone has been dropped and the
    /// queue is drained.
    pub fn spawn(
        sinks: Vec<Arc<dyn NotificationSink>>,
        policy: RetryPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(dispatch(rx, sinks, policy));
        (Self { tx }, handle)
    }

    /// Queues a notice for every sink. Never blocks and never fails: a full
    /// or closed queue drops the notice with a warning.
    pub fn enqueue(&self, user: User) {
        match self.tx.try_send(user) {
            Ok(()) => {}
            Err(TrySendError::Full(user)) => {
                warn!(user_id = user.id, "notification queue full, dropping notice");
            }
            Err(TrySendError::Closed(user)) => {
                warn!(user_id = user.id, "notification dispatcher stopped, dropping notice");
            }
        }
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<User>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    policy: RetryPolicy,
) {
    while let Some(user) = rx.recv().await {
        let user = Arc::new(user);
        let mut deliveries = JoinSet::new();
        for sink in &sinks {
            deliveries.spawn(deliver(Arc::clone(sink), Arc::clone(&user), policy));
        }
        while let Some(joined) = deliveries.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "notification delivery task failed");
            }
        }
    }
}

async fn deliver(sink: Arc<dyn NotificationSink>, user: Arc<User>, policy: RetryPolicy) {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match sink.notify(&user).await {
            Ok(()) => return,
            Err(err) if attempt < attempts => {
                warn!(
                    sink = sink.name(),
                    user_id = user.id,
                    attempt,
                    error = %err,
                    "notification failed, retrying"
                );
            }
            Err(err) => {
                error!(
                    sink = sink.name(),
                    user_id = user.id,
                    attempts,
                    error = %err,
                    "notification failed, giving up"
                );
            }
        }
    }
}
