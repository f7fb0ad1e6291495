//! Clusters and node handles.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use garage_core::{ClusterName, NodeId};

use crate::adapter::Adapter;
use crate::config::BackendConfig;
use crate::error::Result;
use crate::interior::InteriorRegistry;
use crate::types::{ActionOptions, ClusterInfo, NodeStatus};

/// A named group of nodes sharing one backend configuration.
#[derive(Debug)]
pub struct Cluster {
    name: ClusterName,
    adapter: Adapter,
}

impl Cluster {
    /// Create a cluster from its backend configuration.
    #[must_use]
    pub fn new(config: BackendConfig, registry: Arc<InteriorRegistry>) -> Self {
        Self {
            name: config.cluster.clone(),
            adapter: Adapter::new(config, registry),
        }
    }

    /// Cluster name.
    #[must_use]
    pub const fn name(&self) -> &ClusterName {
        &self.name
    }

    /// Directory the cluster was loaded from; `None` for clusters
    /// registered programmatically.
    #[must_use]
    pub fn basedir(&self) -> Option<PathBuf> {
        self.adapter.config().basedir
    }

    /// The cluster's adapter.
    #[must_use]
    pub const fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Adapter info merged with the cluster name and directory.
    #[must_use]
    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            name: self.name.to_string(),
            basedir: self.basedir(),
            adapter: self.adapter.info(),
        }
    }

    /// Handles for every node that has a controller.
    #[must_use]
    pub fn nodes(self: &Arc<Self>) -> Vec<Node> {
        self.adapter
            .node_ids()
            .into_iter()
            .map(|id| self.node(id))
            .collect()
    }

    /// Handle for a node. The node need not exist yet.
    #[must_use]
    pub fn node(self: &Arc<Self>, id: NodeId) -> Node {
        Node {
            cluster: Arc::clone(self),
            id,
        }
    }

    /// State of every node that has a controller, keyed by id.
    #[must_use]
    pub fn node_statuses(&self) -> BTreeMap<String, NodeStatus> {
        self.adapter
            .node_ids()
            .into_iter()
            .map(|id| {
                let status = self.adapter.node_status(&id);
                (id.into(), status)
            })
            .collect()
    }

    /// Apply a new backend configuration in place.
    pub fn reload(&self, config: BackendConfig) {
        tracing::info!(cluster = %self.name, interior = %config.interior, "Reloading cluster");
        self.adapter.reload(config);
    }
}

/// Stable handle to one node of a cluster.
#[derive(Clone)]
pub struct Node {
    cluster: Arc<Cluster>,
    id: NodeId,
}

impl Node {
    /// Node id.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// Owning cluster.
    #[must_use]
    pub const fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Qualified name, `<cluster>-<id>`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-{}", self.cluster.name(), self.id)
    }

    /// Current state and status.
    #[must_use]
    pub fn info(&self) -> NodeStatus {
        self.cluster.adapter().node_status(&self.id)
    }

    /// Start the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the start sequence fails.
    pub async fn start(&self, opts: ActionOptions) -> Result<()> {
        self.cluster.adapter().start_node(&self.id, opts).await
    }

    /// Stop the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop sequence fails.
    pub async fn stop(&self, opts: ActionOptions) -> Result<()> {
        self.cluster.adapter().stop_node(&self.id, opts).await
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("cluster", self.cluster.name())
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{recording_registry, KIND};
    use crate::interior::Capabilities;
    use crate::types::NodeState;

    fn cluster() -> Arc<Cluster> {
        let (registry, _) = recording_registry(Capabilities::ALL, true);
        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), KIND);
        Arc::new(Cluster::new(config, Arc::new(registry)))
    }

    #[test]
    fn info_merges_name_and_adapter() {
        let info = cluster().info();
        assert_eq!(info.name, "lab");
        assert!(info.basedir.is_none());
        assert_eq!(info.adapter.interior, KIND);
    }

    #[tokio::test]
    async fn node_handles_delegate_to_adapter() {
        let cluster = cluster();
        let node = cluster.node(NodeId::new("4").unwrap());
        assert_eq!(node.name(), "lab-4");
        assert_eq!(node.info().state, NodeState::Unprovisioned);
        assert!(cluster.nodes().is_empty());

        node.start(ActionOptions::default()).await.unwrap();
        assert_eq!(node.info().state, NodeState::Running);

        let nodes = cluster.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id().as_str(), "4");
        assert_eq!(
            cluster.node_statuses().get("4").map(|s| s.state),
            Some(NodeState::Running)
        );
    }
}
