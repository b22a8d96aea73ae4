//! dialog-hub HTTP 服务
//!
//! 启动: cargo run --bin dialog-hub-web --features web
//! 接口: POST /api/chat, GET /api/health

#![cfg(feature = "web")]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use dialog_hub::config::load_config;
use dialog_hub::core::{
    run_with_graceful_shutdown, SessionStoreCleanup, ShutdownCoordinator, ShutdownManager,
};
use dialog_hub::gateway::ModeRouter;
use dialog_hub::integrations::http::create_router;
use dialog_hub::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let router = Arc::new(
        ModeRouter::from_config(&cfg)
            .await
            .context("Failed to build dialog router")?,
    );

    let manager = Arc::new(ShutdownManager::new());
    let cleanup = Arc::clone(&router).spawn_cleanup(
        Duration::from_secs(cfg.session.cleanup_interval_secs.max(1)),
        manager.token(),
    );

    let port = std::env::var("HUB_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = format!("{}:{}", cfg.web.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("dialog-hub listening on http://{}", addr);

    let app = create_router(Arc::clone(&router));
    let stop = manager.token();
    let server = async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!("HTTP server error: {}", e);
        }
    };

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(SessionStoreCleanup::new(router.store()));
    run_with_graceful_shutdown(manager, server, coordinator).await;

    let _ = cleanup.await;
    Ok(())
}
