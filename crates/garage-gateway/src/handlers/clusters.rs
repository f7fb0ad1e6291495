//! Cluster endpoints and bulk node operations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures::future::join_all;
use serde::Deserialize;

use garage_control::{fleet, ActionOptions, ClusterInfo};

use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request Types
// =============================================================================

/// Request to add clusters.
#[derive(Debug, Deserialize)]
pub struct AddClustersBody {
    /// Cluster directories.
    pub paths: Option<Vec<PathBuf>>,
}

/// Request to start nodes.
#[derive(Debug, Deserialize)]
pub struct StartNodesBody {
    /// Node ids or `start-end` ranges.
    pub ids: Option<Vec<String>>,
    /// Action options.
    #[serde(default)]
    pub options: ActionOptions,
}

/// Request to stop nodes.
#[derive(Debug, Default, Deserialize)]
pub struct StopNodesBody {
    /// Node ids or `start-end` ranges; every node when omitted.
    pub ids: Option<Vec<String>>,
    /// Action options.
    #[serde(default)]
    pub options: ActionOptions,
}

// =============================================================================
// Handlers
// =============================================================================

/// List every cluster.
pub async fn list_clusters(
    State(state): State<Arc<GatewayState>>,
) -> Json<BTreeMap<String, ClusterInfo>> {
    Json(state.manager.list())
}

/// Load clusters from directories.
///
/// # Errors
///
/// Returns `400` when `paths` is missing, otherwise the first failure after
/// every directory has been tried.
pub async fn add_clusters(
    State(state): State<Arc<GatewayState>>,
    body: Option<Json<AddClustersBody>>,
) -> Result<(StatusCode, Json<Vec<ClusterInfo>>), ApiError> {
    let paths = body
        .and_then(|Json(body)| body.paths)
        .ok_or_else(|| ApiError::BadRequest("paths is required".to_string()))?;

    let results = join_all(paths.iter().map(|path| state.manager.add(path))).await;
    let clusters = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    Ok((
        StatusCode::CREATED,
        Json(clusters.iter().map(|c| c.info()).collect()),
    ))
}

/// Reload every cluster loaded from a directory.
///
/// # Errors
///
/// Returns the first reload failure.
pub async fn reload_clusters(
    State(state): State<Arc<GatewayState>>,
) -> Result<StatusCode, ApiError> {
    state.manager.reload().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start the listed nodes of a cluster.
///
/// # Errors
///
/// Returns `404` for an unknown cluster, `400` when `ids` is missing, or the
/// first node failure.
pub async fn start_nodes(
    State(state): State<Arc<GatewayState>>,
    Path(cluster): Path<String>,
    body: Option<Json<StartNodesBody>>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    let Some(Json(StartNodesBody {
        ids: Some(ids),
        options,
    })) = body
    else {
        return Err(ApiError::BadRequest("ids is required".to_string()));
    };

    fleet::start_nodes(&cluster, &ids, options).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stop the listed nodes of a cluster, or all of them.
///
/// # Errors
///
/// Returns `404` for an unknown cluster or the first node failure.
pub async fn stop_nodes(
    State(state): State<Arc<GatewayState>>,
    Path(cluster): Path<String>,
    body: Option<Json<StopNodesBody>>,
) -> Result<StatusCode, ApiError> {
    let cluster = state.manager.cluster(&cluster)?;
    let Json(body) = body.unwrap_or_default();

    fleet::stop_nodes(&cluster, body.ids.as_deref(), body.options).await?;
    Ok(StatusCode::NO_CONTENT)
}
