//! Graceful shutdown and signal handling.
//!
//! [`ShutdownHandle::shutdown`] is the only way to stop a running server. The
//! signal task installed by [`setup_shutdown_handler`] calls it on SIGINT
//! (Ctrl+C) or SIGTERM; tests call it directly.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;

use crate::config::GRACEFUL_SHUTDOWN_SECS;

/// Cloneable handle controlling one server run.
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    handle: Handle,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting connections and drain in-flight ones.
    ///
    /// Connections still open after [`GRACEFUL_SHUTDOWN_SECS`] are dropped.
    /// Calling this before the server starts makes it stop right after binding.
    pub fn shutdown(&self) {
        tracing::info!(
            connections = self.handle.connection_count(),
            "Graceful shutdown initiated, waiting up to {} seconds for connections to close",
            GRACEFUL_SHUTDOWN_SECS
        );
        self.handle
            .graceful_shutdown(Some(Duration::from_secs(GRACEFUL_SHUTDOWN_SECS)));
    }

    /// Wait until the server is listening and return its address.
    ///
    /// Returns `None` if the server stopped before it started listening.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    pub(crate) fn server_handle(&self) -> Handle {
        self.handle.clone()
    }
}

/// Setup graceful shutdown on SIGTERM and SIGINT.
pub fn setup_shutdown_handler(handle: ShutdownHandle) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
        }

        handle.shutdown();
    });
}
