use anyhow::Context;
use game_server::{router, Config, Services};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(
        rules = %config.rules,
        matching_timeout = ?config.matching_timeout,
        reconnect_grace_secs = config.reconnect_grace.as_secs(),
        "Loaded config"
    );

    let services = Services::new(config.clone());
    let app = router(services.clone());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Starting server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
            services.shutdown().await;
        })
        .await
        .context("server error")?;

    Ok(())
}
