use anyhow::Context;
use tokio::signal;
use tracing::info;

use super::open_database;
use crate::app::{self, AppState};
use crate::config::AppConfig;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting dabar-api in {:?} mode", config.environment);

    let db = open_database(&config).await?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(db.clone(), config).context("invalid security configuration")?;
    let router = app::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    db.close().await;
    served.context("server error")?;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, draining connections");
}
