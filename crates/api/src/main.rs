use anyhow::Context;

use tenantry_api::app::{build_app, services::spawn_blacklist_pruner};
use tenantry_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tenantry_observability::init();

    let config = AppConfig::from_env()?;
    let (app, state) = build_app(&config).await?;
    let _pruner = spawn_blacklist_pruner(state.codec.clone(), config.blacklist_prune_interval());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
