use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weather_assistant::{
    server::{self, AppState},
    Config, WeatherAssistant,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let shutdown = CancellationToken::new();

    let assistant = WeatherAssistant::from_config(&config)?.with_cancellation(shutdown.child_token());
    let state = Arc::new(AppState {
        assistant,
        format: config.answer_format(),
    });
    let app = server::router(state, config.public_dir.clone());

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(
        weather = if config.search.is_some() { "search" } else { "static" },
        "Server is running on http://localhost:{}",
        config.port
    );

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "failed to listen for ctrl-c");
                return;
            }
            info!("shutting down");
            shutdown.cancel();
        }
    });

    server::serve(listener, app, shutdown).await?;
    Ok(())
}
