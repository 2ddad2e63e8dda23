use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use backend::{
    access::RoleBasedAccess,
    api::{self, ApiState},
    config::AppConfig,
    db::Db,
    logger::init_tracing,
    metrics::Counters,
    nozzle::SqlxNozzleRegistry,
    shift::{ShiftService, SqlxShiftRepository},
};

/// Initializes the DB, runs migrations and wires the repository, access
/// policy and service into the shared router state.
async fn init_state(cfg: &AppConfig) -> anyhow::Result<ApiState> {
    let db = Db::connect(&cfg.database_url, cfg.max_connections).await?;
    db.migrate().await?;

    let counters = Counters::default();
    let repo = Arc::new(SqlxShiftRepository::new(db.pool.clone()));
    let service = Arc::new(ShiftService::new(
        repo,
        Arc::new(RoleBasedAccess),
        counters.clone(),
        cfg.require_verification,
    ));
    let registry = Arc::new(SqlxNozzleRegistry::new(db.pool.clone()));

    Ok(ApiState {
        service,
        registry,
        counters,
        started_at: Instant::now(),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error=?e, "failed to install shutdown handler");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting Forecourt backend...");

    let cfg = AppConfig::from_env();

    let state = init_state(&cfg).await?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_addr))?;
    tracing::info!(addr = %cfg.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received");

    Ok(())
}
