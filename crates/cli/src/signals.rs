//! Ctrl+C / SIGTERM handling.
//!
//! The first signal trips the run's [`CancellationToken`]; the engine then
//! stops at its next checkpoint and the command exits cleanly.

use tracing::{info, warn};

use locsync_core::CancellationToken;

/// Resolve once SIGINT (Ctrl+C) or, on Unix, SIGTERM arrives.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C)"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Trip `cancel` when a shutdown signal arrives.
pub fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        cancel.cancel();
    });
}
