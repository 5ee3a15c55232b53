#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use storefront::migration::{Migrator, MigratorTrait};
use storefront::notify::{NotificationSink, NotifyError, RetryPolicy};
use storefront::users::User;
use storefront::RegistrationForm;
use tokio::sync::mpsc;

/// Fresh in-memory SQLite database with the schema applied.
pub async fn database() -> DatabaseConnection {
    // One connection, or every checkout would see a different database
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .expect("in-memory sqlite should open");
    Migrator::up(&db, None)
        .await
        .expect("migrations should apply");
    db
}

pub async fn user_count(db: &DatabaseConnection) -> u64 {
    storefront::entity::user::Entity::find()
        .count(db)
        .await
        .expect("count users")
}

pub fn form(email: &str, phone: &str, password: &str) -> RegistrationForm {
    RegistrationForm {
        email: email.to_owned(),
        password: password.to_owned(),
        name: "Ana".to_owned(),
        address: "Av. Siempre Viva 742".to_owned(),
        age: 30,
        phone: phone.to_owned(),
        file_name: "ana.png".to_owned(),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

/// Forwards every notice it receives to a channel.
pub struct RecordingSink {
    name: &'static str,
    tx: mpsc::UnboundedSender<User>,
}

pub fn recording_sink(name: &'static str) -> (Arc<RecordingSink>, mpsc::UnboundedReceiver<User>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingSink { name, tx }), rx)
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        let _ = self.tx.send(user.clone());
        Ok(())
    }
}

/// Rejects every notice and counts the attempts.
#[derive(Default)]
pub struct FailingSink {
    pub calls: AtomicUsize,
}

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn notify(&self, _user: &User) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Rejected("provider down".into()))
    }
}

pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<User>) -> User {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notice should arrive")
        .expect("sink channel open")
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should hold within five seconds");
}
