//! Signal-driven shutdown for the server.
//!
//! Draining beyond what the transport provides is intentionally absent:
//! `axum::serve`'s graceful shutdown stops accepting connections and lets
//! in-flight requests finish, which is all this shell needs.

use tracing::info;

/// Resolves when the process receives SIGINT (Ctrl+C) or SIGTERM.
///
/// Hand this future to `ServerModule::serve`; when it resolves the server
/// stops accepting connections and the process exits with code 0.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
