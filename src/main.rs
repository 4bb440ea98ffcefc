use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use casebook_client::ExpertApiClient;
use casebook_core::config::{api_timeout_from_env_value, domains_from_env_value};
use casebook_core::constants::DEFAULT_EXPERT_API_URL;
use casebook_core::CoreConfig;

/// Main entry point for the casebook service
///
/// Serves the REST API for the authoring and review screens. Every case operation is forwarded to
/// the expert agent.
///
/// # Environment Variables
/// - `CASEBOOK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CASEBOOK_EXPERT_API_URL`: expert agent base URL (default: "http://localhost:5001")
/// - `CASEBOOK_API_TIMEOUT_MS`: timeout for expert agent calls in milliseconds
/// - `CASEBOOK_DOMAINS`: comma-separated domain tags offered to authors
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casebook=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = std::env::var("CASEBOOK_REST_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;

    let expert_api_url = std::env::var("CASEBOOK_EXPERT_API_URL")
        .unwrap_or_else(|_| DEFAULT_EXPERT_API_URL.into());
    let api_timeout = api_timeout_from_env_value(std::env::var("CASEBOOK_API_TIMEOUT_MS").ok())?;
    let domains = domains_from_env_value(std::env::var("CASEBOOK_DOMAINS").ok());
    let cfg = Arc::new(CoreConfig::new(expert_api_url, api_timeout, domains)?);

    let client = ExpertApiClient::new(cfg.clone())?;
    match client.health().await {
        Ok(true) => tracing::info!("expert agent reachable at {}", client.base_url()),
        Ok(false) => tracing::warn!("expert agent at {} reports unhealthy", client.base_url()),
        Err(err) => tracing::warn!("expert agent not reachable yet: {}", err),
    }

    let app = api_rest::router(AppState::new(cfg, Arc::new(client)));

    tracing::info!("-- Starting casebook REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
