//! Process startup for every role.
//!
//! - **Single** (`--mode fork`): migrate, start session cleanup, serve.
//! - **Primary** (`--mode cluster`): migrate, start session cleanup, then
//!   supervise one worker process per CPU core. Never listens itself.
//! - **Worker** (spawned by the primary): serve on the shared port.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tower_sessions::ExpiredDeletion;
use tracing::{error, info, warn};

use crate::cli::Role;
use crate::config::Config;
use crate::notify::{EmailSink, LogSink, NotificationSink, Notifier, RetryPolicy, WhatsAppSink};
use crate::registration::Registrar;
use crate::server::{self, available_cpus, shutdown_signal, ServeOutcome};
use crate::session_store::SeaOrmStore;
use crate::supervisor::{ProcessLauncher, RestartPolicy, Supervisor};
use crate::users::{SeaOrmUserStore, UserStore};
use crate::web::{self, AppState};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("http client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Upper bound for one notification request.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn bootstrap(role: Role, config: Config) -> Result<(), BootstrapError> {
    match role {
        Role::Single => run_single(config).await,
        Role::Primary => run_primary(config).await,
        Role::Worker => run_worker(config).await,
    }
}

async fn run_single(config: Config) -> Result<(), BootstrapError> {
    let conn = connect(&config.database_url).await?;
    prepare_database(&conn).await?;
    spawn_session_cleanup(SeaOrmStore::new(conn.clone()), config.session.cleanup_interval);

    serve_http(conn, &config, false).await
}

async fn run_primary(config: Config) -> Result<(), BootstrapError> {
    let conn = connect(&config.database_url).await?;
    prepare_database(&conn).await?;
    spawn_session_cleanup(SeaOrmStore::new(conn), config.session.cleanup_interval);

    let workers = available_cpus();
    info!(workers, "Primary {} is running", std::process::id());

    let launcher = Arc::new(ProcessLauncher::current_exe()?);
    Supervisor::new(launcher, workers, RestartPolicy::default())
        .run(shutdown_signal())
        .await;

    Ok(())
}

async fn run_worker(config: Config) -> Result<(), BootstrapError> {
    let conn = connect(&config.database_url).await?;
    serve_http(conn, &config, true).await
}

async fn serve_http(
    conn: DatabaseConnection,
    config: &Config,
    reuse_port: bool,
) -> Result<(), BootstrapError> {
    let app = build_app(conn, config)?;

    match server::serve(config.listen_addr(), reuse_port, app, shutdown_signal()).await? {
        ServeOutcome::Stopped => {}
        ServeOutcome::BindFailed => {
            // Already logged as fatal; the process stays up without a
            // listener until it is told to stop.
            shutdown_signal().await;
        }
    }

    Ok(())
}

/// Opens a connection pool with the same limits in every process.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(10 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;
    info!("Connected to database");
    Ok(conn)
}

#[cfg(feature = "migration")]
async fn prepare_database(conn: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm_migration::MigratorTrait;

    crate::migration::Migrator::up(conn, None).await?;
    info!("Database migrations applied");
    Ok(())
}

#[cfg(not(feature = "migration"))]
async fn prepare_database(_conn: &DatabaseConnection) -> Result<(), DbErr> {
    warn!("built without the `migration` feature, assuming the schema exists");
    Ok(())
}

fn spawn_session_cleanup(store: SeaOrmStore, interval: Duration) {
    tokio::spawn(async move {
        if let Err(err) = store.continuously_delete_expired(interval).await {
            error!(error = %err, "expired session cleanup stopped");
        }
    });
}

/// Routes, session layer and notification dispatcher for one serving
/// process. Must be called inside a tokio runtime.
pub fn build_app(conn: DatabaseConnection, config: &Config) -> Result<Router, BootstrapError> {
    let users: Arc<dyn UserStore> = Arc::new(SeaOrmUserStore::new(conn.clone()));
    let sinks = notification_sinks(config)?;
    let (notifier, _dispatcher) = Notifier::spawn(sinks, RetryPolicy::default());

    let state = AppState {
        registrar: Registrar::new(Arc::clone(&users), notifier),
        users,
    };

    Ok(web::app(state, SeaOrmStore::new(conn), &config.session))
}

fn notification_sinks(config: &Config) -> Result<Vec<Arc<dyn NotificationSink>>, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;

    let email: Arc<dyn NotificationSink> = match &config.mail {
        Some(settings) => Arc::new(EmailSink::new(client.clone(), settings.clone())),
        None => {
            warn!("mail relay not configured, new-user emails only go to the log");
            Arc::new(LogSink::new("email"))
        }
    };

    let whatsapp: Arc<dyn NotificationSink> = match &config.whatsapp {
        Some(settings) => Arc::new(WhatsAppSink::new(client, settings.clone())),
        None => {
            warn!("Twilio not configured, new-user WhatsApp messages only go to the log");
            Arc::new(LogSink::new("whatsapp"))
        }
    };

    Ok(vec![email, whatsapp])
}
