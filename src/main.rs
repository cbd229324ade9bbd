//! Gateway entry point: load topology, compile, serve.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rewrite_gateway::config::{load_config, GatewayConfig};
use rewrite_gateway::gateway::topology::{Topology, TopologyHandle};
use rewrite_gateway::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewrite_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("rewrite-gateway v0.1.0 starting");

    // Load topology configuration; a missing path falls back to defaults
    // (useful for smoke-testing the server without any routes).
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_config(&path)?,
        None => {
            tracing::warn!("no topology file given, starting with an empty topology");
            GatewayConfig::default()
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        rules = config.rules.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "configuration loaded"
    );

    // Compile and publish the topology; malformed topologies fail deployment
    let topology = Topology::compile(&config)?;
    let handle = Arc::new(TopologyHandle::new(topology));

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "listening for connections");

    // Initialize metrics server
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            rewrite_gateway::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            );
        }
    }

    // Create and run the gateway server
    let server = GatewayServer::new(config, handle);
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
