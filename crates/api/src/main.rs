//! API server binary

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shepherd_api::{routes, AppState, Config};
use shepherd_billing::BillingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let pool = shepherd_shared::db::create_pool(&config.database_url).await?;

    // Migrations run on a dedicated single-connection pool with a longer
    // acquire timeout
    let migration_pool = shepherd_shared::db::create_migration_pool(&config.database_url).await?;
    shepherd_shared::db::run_migrations(&migration_pool).await?;
    migration_pool.close().await;

    let billing = Arc::new(BillingEngine::from_env(pool.clone())?);
    let state = AppState::new(config.clone(), pool, billing);

    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = %config.bind_address, "API server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
