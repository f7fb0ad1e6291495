//! Garage Server - HTTP API for cluster node lifecycle
//!
//! This is the main entry point for the server. Cluster directories listed in
//! `GARAGE_CLUSTERS` are loaded at startup; more can be added over the API.
//!
//! The process exits on `POST /shutdown` or Ctrl-C, after in-flight requests
//! have drained.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use garage_control::{ClusterManager, InteriorRegistry};
use garage_gateway::{create_router, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,garage=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Garage Server");

    let config = GatewayConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        clusters = config.clusters.len(),
        "Server configuration loaded"
    );

    let registry = Arc::new(InteriorRegistry::with_builtin());
    tracing::info!(interiors = ?registry.kinds(), "Interior backends registered");
    let manager = Arc::new(ClusterManager::new(registry));

    for dir in &config.clusters {
        match manager.add(dir).await {
            Ok(cluster) => tracing::info!(cluster = %cluster.name(), "Cluster loaded"),
            Err(e) => tracing::error!(path = %dir.display(), error = %e, "Failed to load cluster"),
        }
    }

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(manager, config);
    let shutdown = state.clone();
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = shutdown.shutdown_requested() => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
