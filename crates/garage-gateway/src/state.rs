//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use garage_control::ClusterManager;
use tokio::sync::Notify;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState {
    /// Every registered cluster.
    pub manager: Arc<ClusterManager>,
    /// Signalled when a client requests shutdown.
    pub shutdown: Arc<Notify>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(manager: Arc<ClusterManager>, config: GatewayConfig) -> Self {
        Self {
            manager,
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    /// Resolves once shutdown has been requested.
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}

impl Clone for GatewayState {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            shutdown: Arc::clone(&self.shutdown),
            config: self.config.clone(),
        }
    }
}
