use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ride_reliability::{config::ServiceConfig, contract::feature_names, server, Engine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServiceConfig::from_env().context("invalid service configuration")?;

    // No listener until the artifact is loaded and verified.
    let engine = Engine::load(&cfg.model_path, &cfg.meta_path).with_context(|| {
        format!(
            "failed to load scoring artifact {} (meta {})",
            cfg.model_path.display(),
            cfg.meta_path.display()
        )
    })?;
    let meta = engine.meta();
    tracing::info!(
        path = %cfg.model_path.display(),
        trees = engine.tree_count(),
        model_version = %meta.model_version,
        contract_version = meta.contract_version,
        "loaded model; feat_list[{}]: {:?}",
        meta.feat_list.len(),
        feature_names()
    );

    let state = server::AppState::new(Arc::new(engine), cfg.log_predictions);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(cfg.addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.addr))?;
    tracing::info!("listening on {}", cfg.addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
