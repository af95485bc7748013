//! OS signal handling.
//!
//! SIGINT and SIGTERM both start the shutdown sequence. A signal arriving
//! while shutdown is running re-enters [`Lifecycle::shutdown`], which logs
//! and returns without repeating any step.

use std::sync::Arc;

use crate::lifecycle::manager::Lifecycle;
use crate::lifecycle::shutdown::ShutdownOutcome;

/// Wait for the next termination signal and return its name.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Block until a termination signal, then run the shutdown sequence.
pub async fn shutdown_on_signal(lifecycle: Arc<Lifecycle>) -> ShutdownOutcome {
    let signal = wait_for_signal().await;
    tracing::info!(signal, "Received shutdown signal");

    let repeat = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            loop {
                let signal = wait_for_signal().await;
                tracing::info!(signal, "Received shutdown signal");
                lifecycle.shutdown().await;
            }
        })
    };

    let outcome = lifecycle.shutdown().await;
    repeat.abort();
    outcome
}
