//! SIGINT/SIGTERM handling, adapted from the teacher gateway's
//! `shutdown_signal()`. There's no HTTP server to drain here — on signal
//! the run future is simply dropped, which tears down in-flight plugin
//! hosts via their `Drop` impl, and the process exits 130.

use tokio::signal;
use tracing::info;

pub async fn wait_for_interrupt() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
