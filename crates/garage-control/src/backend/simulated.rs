//! Simulated interior for demos and tests.
//!
//! Every capability is present. Each action reports the state it settles to
//! after the configured delay, unless the node has a fault configured for
//! that action, in which case an error is reported instead.

use std::time::Duration;

use garage_core::NodeId;
use serde_json::json;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::interior::{Capabilities, Interior, Monitor};
use crate::lifecycle::{Action, InteriorState};
use crate::types::ActionOptions;

/// Registry key of this backend.
pub const KIND: &str = "simulated";

/// In-memory interior.
#[derive(Debug)]
pub struct SimulatedInterior {
    node: NodeId,
    delay: Duration,
    fault: Option<Action>,
    current: InteriorState,
    monitor: Monitor,
}

impl SimulatedInterior {
    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the registry.
    #[allow(clippy::unnecessary_wraps)]
    pub fn create(
        node: &NodeId,
        config: &BackendConfig,
        monitor: Monitor,
    ) -> Result<Box<dyn Interior>> {
        Ok(Box::new(Self::new(node, config, monitor)))
    }

    /// Create an interior for `node`.
    #[must_use]
    pub fn new(node: &NodeId, config: &BackendConfig, monitor: Monitor) -> Self {
        Self {
            node: node.clone(),
            delay: config.simulation.delay(),
            fault: config.simulation.faults.get(node.as_str()).copied(),
            current: InteriorState::Offline,
            monitor,
        }
    }
}

impl Interior for SimulatedInterior {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn invoke(&mut self, action: Action, _opts: &ActionOptions) {
        let monitor = self.monitor.clone();
        let delay = self.delay;

        if self.fault == Some(action) {
            let message = format!("simulated {action} failure on node {}", self.node);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                monitor.error(message);
            });
            return;
        }

        let settled = action.settles_to();
        if let Some(state) = settled {
            self.current = state;
        }
        let status = json!({ "state": self.current.as_str(), "node": self.node.as_str() });

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match settled {
                Some(state) => monitor.state(state),
                None => monitor.status(status),
            }
        });
    }
}
