//! contract-press webhook server.
//!
//! Binds the webhook router to the configured port with the production
//! bitable client and Chromium renderer wired in. Shuts down gracefully on
//! ctrl-c or SIGTERM so an in-flight generation finishes before exit.

use anyhow::Context;
use contract_press::bitable::BitableClient;
use contract_press::config::AppConfig;
use contract_press::pipeline::render::ChromiumRenderer;
use contract_press::server::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,contract_press=debug")),
        )
        .with_target(true)
        .init();

    let config = AppConfig::from_env().context("load configuration")?;
    let port = config.port;

    let store = BitableClient::new(&config).context("build bitable client")?;
    let renderer = ChromiumRenderer::new(config.render_settle_ms);

    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        renderer: Arc::new(renderer),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("contract-press listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
