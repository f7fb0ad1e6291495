//! Request and response types for control plane operations.
//!
//! These types define the shapes exchanged with the transport layer.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::LifecycleState;

/// Options accompanying a lifecycle action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionOptions {
    /// Re-issue an action even if one is already in flight.
    pub force: bool,
    /// Ask the interior to discard node state (passed through to backends).
    pub clean: bool,
}

impl fmt::Display for ActionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [(self.force, "force"), (self.clean, "clean")]
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect();
        write!(f, "{{{}}}", flags.join(", "))
    }
}

/// Externally visible state of a node.
///
/// Mirrors [`LifecycleState`] plus `UNPROVISIONED` for nodes that have
/// never been started and therefore have no controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// No controller exists for the node.
    Unprovisioned,
    /// Not loaded.
    Offline,
    /// Loading.
    Loading,
    /// Unloading.
    Unloading,
    /// Loaded, not started.
    Stopped,
    /// Starting.
    Starting,
    /// Running.
    Running,
    /// Stopping.
    Stopping,
}

impl From<LifecycleState> for NodeState {
    fn from(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Offline => Self::Offline,
            LifecycleState::Loading => Self::Loading,
            LifecycleState::Unloading => Self::Unloading,
            LifecycleState::Stopped => Self::Stopped,
            LifecycleState::Starting => Self::Starting,
            LifecycleState::Running => Self::Running,
            LifecycleState::Stopping => Self::Stopping,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unprovisioned => "UNPROVISIONED",
            Self::Offline => "OFFLINE",
            Self::Loading => "LOADING",
            Self::Unloading => "UNLOADING",
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
        };
        f.write_str(s)
    }
}

/// Snapshot of a node's state and last reported status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Current state.
    pub state: NodeState,
    /// Last status payload reported by the interior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl NodeStatus {
    /// Status of a node that has no controller.
    #[must_use]
    pub const fn unprovisioned() -> Self {
        Self {
            state: NodeState::Unprovisioned,
            status: None,
        }
    }
}

/// Description of a cluster's adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Adapter kind.
    pub adapter: String,
    /// Interior backend kind.
    pub interior: String,
    /// Working directory passed to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

/// Description of a cluster, as returned by list and add operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name.
    pub name: String,
    /// Directory the cluster was loaded from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basedir: Option<PathBuf>,
    /// Adapter description.
    #[serde(flatten)]
    pub adapter: AdapterInfo,
}
