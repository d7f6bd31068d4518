use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use catalux_rest::{build_router, init_tracing, AppState};
use catalux_service::{CatalogService, ServiceConfig};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load()?;
    init_tracing(&config.logging)?;

    tracing::info!(
        catalog = %config.sources.catalog_path.display(),
        rules = %config.sources.rules_path.display(),
        threads = ?config.rebuild.threads,
        "starting catalux"
    );

    let service = Arc::new(CatalogService::from_config(&config));

    // Queries answer 503 until this first rebuild publishes a snapshot.
    if config.rebuild.on_startup {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = service.rebuild().await {
                tracing::error!(error = %e, "initial rebuild failed");
            }
        });
    } else {
        tracing::warn!("rebuild on startup disabled; POST /admin/rebuild to build the index");
    }

    let app = build_router(AppState::new(Arc::clone(&service), config.query.clone())).layer(
        TimeoutLayer::new(Duration::from_secs(config.server.timeout_seconds)),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("REST server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Waits for SIGINT or SIGTERM, then stops any running rebuild so the
/// blocking workers do not hold up process exit.
async fn shutdown_signal(service: Arc<CatalogService>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }

    if service.cancel_rebuild() {
        tracing::info!("cancelled running rebuild");
    }
}
