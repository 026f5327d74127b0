//! Graceful Shutdown Module
//!
//! Stops accepting connections on the first signal and gives in-flight
//! requests a bounded window to finish.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Serves `app` until `signal` resolves, then drains for at most
/// `drain_timeout`.
///
/// # Errors
///
/// Returns the server's I/O error if it stops on its own.
pub async fn serve_with_graceful_shutdown<F>(
    listener: TcpListener,
    app: Router,
    drain_timeout: Duration,
    signal: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        () = signal => {}
        result = &mut server => {
            return match result {
                Ok(outcome) => outcome,
                Err(err) => Err(io::Error::other(err)),
            };
        }
    }

    info!(timeout_secs = drain_timeout.as_secs(), "Draining in-flight requests");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(Ok(outcome)) => {
            info!("Shutdown complete");
            outcome
        }
        Ok(Err(err)) => Err(io::Error::other(err)),
        Err(_) => {
            warn!("Shutdown timeout reached, aborting remaining connections");
            server.abort();
            Ok(())
        }
    }
}
