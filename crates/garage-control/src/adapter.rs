//! Per-cluster owner of node controllers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use garage_core::NodeId;
use parking_lot::{Mutex, RwLock};

use crate::config::BackendConfig;
use crate::controller::ControllerHandle;
use crate::error::Result;
use crate::interior::InteriorRegistry;
use crate::types::{ActionOptions, AdapterInfo, NodeStatus};

/// Adapter kind reported in cluster info.
pub const ADAPTER_KIND: &str = "container";

/// Maps node ids to controllers and binds them to the cluster's backend.
///
/// Controllers are created lazily on the first start of a node and removed
/// by [`Adapter::reload`] once they are offline with nothing pending.
#[derive(Debug)]
pub struct Adapter {
    registry: Arc<InteriorRegistry>,
    config: RwLock<BackendConfig>,
    controllers: Mutex<HashMap<NodeId, ControllerHandle>>,
}

impl Adapter {
    /// Create an adapter with no controllers.
    #[must_use]
    pub fn new(config: BackendConfig, registry: Arc<InteriorRegistry>) -> Self {
        Self {
            registry,
            config: RwLock::new(config),
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Current backend configuration.
    #[must_use]
    pub fn config(&self) -> BackendConfig {
        self.config.read().clone()
    }

    /// Describe the adapter.
    #[must_use]
    pub fn info(&self) -> AdapterInfo {
        let config = self.config.read();
        AdapterInfo {
            adapter: ADAPTER_KIND.to_string(),
            interior: config.interior.clone(),
            workdir: config.workdir.clone(),
        }
    }

    /// Ids of nodes with a controller, numeric ids first in numeric order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.controllers.lock().keys().cloned().collect();
        ids.sort_by(|a, b| node_order(a.as_str(), b.as_str()));
        ids
    }

    /// State of a node; `UNPROVISIONED` if it has no controller.
    #[must_use]
    pub fn node_status(&self, id: &NodeId) -> NodeStatus {
        self.controllers
            .lock()
            .get(id)
            .map_or_else(NodeStatus::unprovisioned, ControllerHandle::status)
    }

    /// Start a node, creating its controller if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the interior cannot be created or the start
    /// sequence fails.
    pub async fn start_node(&self, id: &NodeId, opts: ActionOptions) -> Result<()> {
        let existing = self.controllers.lock().get(id).map(|handle| handle.start(opts));
        let pending = match existing {
            Some(pending) => pending,
            None => {
                // Interior creation may block on the filesystem; keep it outside the lock.
                let config = self.config();
                let prepared = ControllerHandle::prepare(id.clone(), &self.registry, &config)?;
                // A concurrent start may have won; its controller is kept and ours is discarded.
                self.controllers
                    .lock()
                    .entry(id.clone())
                    .or_insert_with(|| ControllerHandle::launch(prepared))
                    .start(opts)
            }
        };
        pending.await
    }

    /// Stop a node. A node without a controller is already stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop sequence fails.
    pub async fn stop_node(&self, id: &NodeId, opts: ActionOptions) -> Result<()> {
        let pending = self.controllers.lock().get(id).map(|handle| handle.stop(opts));
        match pending {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }

    /// Replace the backend configuration and drop retired controllers.
    ///
    /// Live controllers keep the interior they were created with; the new
    /// configuration applies to controllers created afterwards.
    pub fn reload(&self, config: BackendConfig) {
        *self.config.write() = config;

        let mut controllers = self.controllers.lock();
        let before = controllers.len();
        controllers.retain(|_, handle| !handle.is_retired());
        let removed = before - controllers.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = controllers.len(), "Swept retired controllers");
        }
    }
}

/// Numeric ids sort numerically and before any other id.
fn node_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{recording_registry, Taps, KIND};
    use crate::interior::Capabilities;
    use crate::lifecycle::{Action, InteriorState};
    use crate::types::NodeState;
    use garage_core::ClusterName;

    fn adapter(settle: bool) -> (Adapter, Taps) {
        let (registry, taps) = recording_registry(Capabilities::ALL, settle);
        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), KIND);
        (Adapter::new(config, Arc::new(registry)), taps)
    }

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[tokio::test]
    async fn unknown_node_is_unprovisioned() {
        let (adapter, taps) = adapter(true);
        assert_eq!(adapter.node_status(&id("9")), NodeStatus::unprovisioned());
        adapter.stop_node(&id("9"), ActionOptions::default()).await.unwrap();
        assert!(adapter.node_ids().is_empty());
        assert!(taps.is_empty());
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_controller() {
        let (adapter, taps) = adapter(true);
        let node = id("1");
        let (a, b) = tokio::join!(
            adapter.start_node(&node, ActionOptions::default()),
            adapter.start_node(&node, ActionOptions::default()),
        );
        // One of the two may be superseded; the other drives the node up.
        assert!(a.is_ok() || b.is_ok());
        assert_eq!(taps.len(), 1);
        assert_eq!(taps.get("1").unwrap().count(Action::Load), 1);
        assert_eq!(adapter.node_status(&node).state, NodeState::Running);
    }

    #[tokio::test]
    async fn node_ids_sort_numerically() {
        let (adapter, _) = adapter(true);
        for n in ["10", "2", "web", "1"] {
            adapter.start_node(&id(n), ActionOptions::default()).await.unwrap();
        }
        let ids: Vec<String> = adapter.node_ids().into_iter().map(String::from).collect();
        assert_eq!(ids, ["1", "2", "10", "web"]);
    }

    #[tokio::test]
    async fn reload_sweeps_only_retired_controllers() {
        let (adapter, taps) = adapter(true);
        adapter.start_node(&id("1"), ActionOptions::default()).await.unwrap();
        adapter.start_node(&id("2"), ActionOptions::default()).await.unwrap();
        adapter.stop_node(&id("2"), ActionOptions::default()).await.unwrap();

        // The unload report settles asynchronously.
        for _ in 0..100 {
            if adapter.node_status(&id("2")).state == NodeState::Offline {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(adapter.node_status(&id("2")).state, NodeState::Offline);

        let mut config = adapter.config();
        config.workdir = Some("/srv/lab".into());
        adapter.reload(config);

        assert_eq!(adapter.node_ids(), vec![id("1")]);
        assert_eq!(adapter.node_status(&id("2")), NodeStatus::unprovisioned());
        assert_eq!(adapter.info().workdir, Some("/srv/lab".into()));
        assert_eq!(taps.len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_nodes_in_flight() {
        let (adapter, taps) = adapter(false);
        let adapter = Arc::new(adapter);
        let starting = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.start_node(&id("3"), ActionOptions::default()).await })
        };
        for _ in 0..100 {
            if taps.get("3").is_some_and(|p| p.count(Action::Load) == 1) {
                break;
            }
            tokio::task::yield_now().await;
        }
        adapter.reload(adapter.config());
        assert_eq!(adapter.node_ids(), vec![id("3")]);

        let tap = taps.get("3").unwrap();
        tap.report_state(InteriorState::Running);
        starting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reload_keeps_node_with_queued_start() {
        let (adapter, taps) = adapter(true);
        let node = id("1");
        adapter.start_node(&node, ActionOptions::default()).await.unwrap();
        adapter.stop_node(&node, ActionOptions::default()).await.unwrap();
        for _ in 0..100 {
            if adapter.node_status(&node).state == NodeState::Offline {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(adapter.node_status(&node).state, NodeState::Offline);

        // Queue a start that the controller has not handled yet.
        let start = adapter.start_node(&node, ActionOptions::default());
        tokio::pin!(start);
        assert!(futures::poll!(&mut start).is_pending());

        adapter.reload(adapter.config());
        assert_eq!(adapter.node_ids(), vec![node.clone()]);

        start.await.unwrap();
        assert_eq!(adapter.node_status(&node).state, NodeState::Running);
        assert_eq!(taps.len(), 1);
        assert_eq!(taps.get("1").unwrap().count(Action::Load), 2);
    }

    #[tokio::test]
    async fn interior_created_outside_controller_lock() {
        use std::sync::{OnceLock, Weak};

        use crate::backend::recording::RecordingInterior;
        use crate::interior::{Interior, Monitor};

        let slot: Arc<OnceLock<Weak<Adapter>>> = Arc::new(OnceLock::new());
        let mut registry = InteriorRegistry::new();
        let seen = Arc::clone(&slot);
        registry.register(
            "listing",
            move |_: &NodeId, _: &BackendConfig, monitor: Monitor| -> Result<Box<dyn Interior>> {
                // Would deadlock if the adapter held its map lock here.
                if let Some(adapter) = seen.get().and_then(Weak::upgrade) {
                    let _ = adapter.node_ids();
                }
                let (interior, _) = RecordingInterior::with_monitor(Capabilities::ALL, monitor);
                Ok(Box::new(interior.settling()))
            },
        );
        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), "listing");
        let adapter = Arc::new(Adapter::new(config, Arc::new(registry)));
        slot.set(Arc::downgrade(&adapter)).unwrap();

        adapter.start_node(&id("4"), ActionOptions::default()).await.unwrap();
        assert_eq!(adapter.node_ids(), vec![id("4")]);
        assert_eq!(adapter.node_status(&id("4")).state, NodeState::Running);
    }

    #[test]
    fn info_describes_backend() {
        let (adapter, _) = adapter(true);
        let info = adapter.info();
        assert_eq!(info.adapter, ADAPTER_KIND);
        assert_eq!(info.interior, KIND);
    }
}
