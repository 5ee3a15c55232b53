//! Listener setup and the HTTP serve loop shared by fork mode and cluster
//! workers.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info};

const BACKLOG: u32 = 1024;

/// How a call to [`serve`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The server ran and shut down gracefully.
    Stopped,
    /// The listener could not be bound; nothing was served.
    BindFailed,
}

/// Number of CPU cores available to this process, at least one.
pub fn available_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}

/// Binds a listener on `addr`.
///
/// With `reuse_port` every cluster worker binds the same port and the
/// kernel spreads incoming connections across them.
pub fn bind_listener(addr: SocketAddr, reuse_port: bool) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    #[cfg(unix)]
    if reuse_port {
        socket.set_reuseport(true)?;
    }
    #[cfg(not(unix))]
    let _ = reuse_port;

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}

/// Serves `app` on `addr` until `shutdown` resolves.
///
/// A bind failure is logged as fatal and reported as
/// [`ServeOutcome::BindFailed`] rather than returned as an error: the
/// caller decides whether the process lives on.
pub async fn serve<F>(
    addr: SocketAddr,
    reuse_port: bool,
    app: Router,
    shutdown: F,
) -> io::Result<ServeOutcome>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = match bind_listener(addr, reuse_port) {
        Ok(listener) => listener,
        Err(err) => {
            error!(fatal = true, %addr, error = %err, "Server error: {err}");
            return Ok(ServeOutcome::BindFailed);
        }
    };

    let local = listener.local_addr()?;
    info!(
        port = local.port(),
        cpus = available_cpus(),
        "Server listening on port {}",
        local.port()
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!(port = local.port(), "Server stopped");
    Ok(ServeOutcome::Stopped)
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
