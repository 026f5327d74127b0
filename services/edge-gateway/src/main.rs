//! Edge Gateway - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use edge_gateway::config::Config;
use edge_gateway::identity::HttpIdentityClient;
use edge_gateway::observability::{TelemetryConfig, init_tracing};
use edge_gateway::policy::GatewayPolicy;
use edge_gateway::server::{AppState, build_router};
use edge_gateway::shutdown::{serve_with_graceful_shutdown, wait_for_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("invalid configuration")?;

    init_tracing(&TelemetryConfig::with_format(config.log_format))?;

    info!("Starting Edge Gateway");

    let policy = GatewayPolicy::load(config.policy_file.as_deref())
        .context("invalid gateway policy")?;
    let identity = HttpIdentityClient::new(
        config.identity_service_url.clone(),
        config.identity_timeout(),
    )?;
    let state = AppState::new(&config, policy, Arc::new(identity))?;
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    info!(addr = %config.bind_addr(), identity = %config.identity_service_url, "Edge Gateway listening");

    serve_with_graceful_shutdown(listener, app, config.shutdown_timeout(), wait_for_signal()).await?;

    info!("Edge Gateway stopped");
    Ok(())
}
