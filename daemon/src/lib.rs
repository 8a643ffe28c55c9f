//! teamboard daemon
//!
//! The API service: translates HTTP requests on the metrics collection into
//! single store operations and reports service/store health.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;

use anyhow::Result;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

pub use config::DaemonConfig;
pub use state::{AppContext, connect_store};

/// Serve the API on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = api::router(ctx)?;

    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
