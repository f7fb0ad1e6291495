//! API request and response types for the server client.
//!
//! These types mirror the JSON bodies of the garage-server API. Fields the
//! client only prints are kept as loose JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Server
// =============================================================================

/// Response of `GET /info`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    /// Server package version.
    pub version: String,
    /// API version.
    pub api: String,
    /// Service name.
    pub service: String,
}

/// Error envelope returned by the server for failed requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// Error code and message.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Machine readable code.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

// =============================================================================
// Clusters
// =============================================================================

/// A cluster as listed by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name.
    pub name: String,
    /// Every other field, sorted by key.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Body of `POST /v1/clusters`.
#[derive(Debug, Clone, Serialize)]
pub struct AddClustersRequest {
    /// Cluster directories.
    pub paths: Vec<String>,
}

// =============================================================================
// Nodes
// =============================================================================

/// Options forwarded with start and stop requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionOptions {
    /// Force the action.
    pub force: bool,
    /// Discard node data.
    pub clean: bool,
}

/// State and last status of one node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    /// Lifecycle state, e.g. `RUNNING`.
    pub state: String,
    /// Last status reported by the backend.
    #[serde(default)]
    pub status: Option<Value>,
}

/// Body of the bulk start and stop requests.
#[derive(Debug, Clone, Serialize)]
pub struct NodesRequest {
    /// Node ids or `start-end` ranges; omitted to stop every node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Action options.
    pub options: ActionOptions,
}
