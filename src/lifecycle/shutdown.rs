//! Shutdown coordination for the proxy.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;

/// How long in-flight requests get to finish after a shutdown signal.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator for graceful shutdown.
///
/// Wraps the server handle so the binary, signal handling and tests can all
/// stop the listener and learn its bound address.
#[derive(Clone)]
pub struct Shutdown {
    handle: Handle,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            handle: Handle::new(),
        }
    }

    /// The handle given to the server.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Wait until the server is listening and return its address.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Stop accepting and let open connections drain for [`DRAIN_TIMEOUT`].
    pub fn trigger(&self) {
        self.handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
    }

    /// Number of connections still open.
    pub fn connection_count(&self) -> usize {
        self.handle.connection_count()
    }

    /// Trigger shutdown on Ctrl+C or SIGTERM.
    pub fn on_signal(&self) -> tokio::task::JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!(
                open_connections = shutdown.connection_count(),
                drain_secs = DRAIN_TIMEOUT.as_secs(),
                "Shutdown signal received, draining connections"
            );
            shutdown.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
