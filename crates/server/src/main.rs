use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use baywatch_core::catalog::Catalog;
use baywatch_server::config::ServerConfig;
use baywatch_server::state::{self, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK_PERIOD: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    info!(db_path = %config.db_path, "connecting to database");
    let pool = baywatch_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;

    baywatch_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    let catalog = Catalog::load(&config.catalog_path).with_context(|| {
        format!("failed to load catalog from {}", config.catalog_path.display())
    })?;

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::open(pool, Arc::new(catalog), config)
        .await
        .context("failed to restore view state")?;

    let ticker = tokio::spawn(state::run_ticker(app_state.clone(), TICK_PERIOD));

    let app = baywatch_server::routes::build_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    if let Err(e) = state::shutdown(&app_state).await {
        warn!(error = %e, "failed to persist view state on shutdown");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
