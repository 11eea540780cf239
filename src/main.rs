//! Annet - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the assistant API.

use annet::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annet=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, policies={}",
        config.default_model,
        config.retrieval.policy_dir.display()
    );
    if config.search.serpapi_key.is_none() {
        info!("SERPAPI_KEY not set, web search uses DuckDuckGo");
    }

    info!("Starting server on {}:{}", config.host, config.port);
    api::serve(config).await?;

    Ok(())
}
