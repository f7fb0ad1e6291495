//! Per-node endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use garage_control::{ActionOptions, NodeId, NodeStatus};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Optional body for single-node start and stop.
#[derive(Debug, Default, Deserialize)]
pub struct NodeActionBody {
    /// Action options.
    #[serde(default)]
    pub options: ActionOptions,
}

/// State of every node with a controller.
///
/// # Errors
///
/// Returns `404` for an unknown cluster.
pub async fn list_nodes(
    State(state): State<Arc<GatewayState>>,
    Path(cluster): Path<String>,
) -> Result<Json<BTreeMap<String, NodeStatus>>, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    Ok(Json(cluster.node_statuses()))
}

/// State of one node. Nodes never started are `UNPROVISIONED`.
///
/// # Errors
///
/// Returns `404` for an unknown cluster and `400` for a malformed node id.
pub async fn get_node(
    State(state): State<Arc<GatewayState>>,
    Path((cluster, node)): Path<(String, String)>,
) -> Result<Json<NodeStatus>, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    let id = parse_node(node)?;
    Ok(Json(cluster.node(id).info()))
}

/// Start one node.
///
/// # Errors
///
/// Returns `404` for an unknown cluster or the node's failure.
pub async fn start_node(
    State(state): State<Arc<GatewayState>>,
    Path((cluster, node)): Path<(String, String)>,
    body: Option<Json<NodeActionBody>>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    let Json(body) = body.unwrap_or_default();
    cluster.node(parse_node(node)?).start(body.options).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stop one node.
///
/// # Errors
///
/// Returns `404` for an unknown cluster or the node's failure.
pub async fn stop_node(
    State(state): State<Arc<GatewayState>>,
    Path((cluster, node)): Path<(String, String)>,
    body: Option<Json<NodeActionBody>>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    let Json(body) = body.unwrap_or_default();
    cluster.node(parse_node(node)?).stop(body.options).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_node(node: String) -> Result<NodeId, ApiError> {
    NodeId::new(node).map_err(|e| ApiError::BadRequest(format!("invalid node id: {e}")))
}
