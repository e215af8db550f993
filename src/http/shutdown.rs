//! Process signal handling for hosts of a [`WebServer`].
//!
//! Handles:
//! - SIGTERM/SIGINT: resolve [`shutdown_signal`] so the host can stop the server
//! - SIGHUP: restart the server, reloading the keystore without waiting for
//!   the next poll

use super::server::WebServer;

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
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
}

/// Restart `server` on every SIGHUP.
///
/// A failed restart leaves the server stopped; later signals try again.
#[cfg(unix)]
pub fn spawn_reload_handler(server: WebServer) {
    tokio::spawn(async move {
        let mut sighup =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(sighup) => sighup,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGHUP handler");
                    return;
                }
            };

        loop {
            sighup.recv().await;
            tracing::info!("Received SIGHUP, reloading keystore");

            match server.restart().await {
                Ok(()) => {
                    tracing::info!("Keystore reloaded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload keystore, server stopped");
                }
            }
        }
    });
}

/// No-op reload handler for non-Unix platforms.
#[cfg(not(unix))]
pub fn spawn_reload_handler(_server: WebServer) {
    tracing::warn!("Keystore reload via SIGHUP not supported on this platform");
}
