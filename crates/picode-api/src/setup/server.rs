//! HTTP listener

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use picode_core::Config;

/// Serve `app` until SIGINT or SIGTERM, then drain in-flight requests.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Binding listener");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        image_root = %config.image_root().display(),
        max_image_kb = config.max_image_size_bytes() / 1024,
        thumbnail = %format!("{}x{}", config.thumbnail_width(), config.thumbnail_height()),
        "Accepting uploads"
    );

    // socket addresses feed uploader identity when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
///
/// # Panics
/// Panics if a signal handler cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Draining in-flight requests");
}
