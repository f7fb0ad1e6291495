//! Health, server info and shutdown endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use garage_core::VersionInfo;
use serde::Serialize;

use crate::state::GatewayState;

/// Service name reported by `/info`.
pub const SERVICE_NAME: &str = "garage-server";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check handler.
///
/// # Example
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    };

    (StatusCode::OK, Json(response))
}

/// Version and build metadata.
pub async fn info() -> Json<VersionInfo> {
    Json(VersionInfo::current(SERVICE_NAME))
}

/// Acknowledge, then let the server drain and exit.
pub async fn shutdown(State(state): State<Arc<GatewayState>>) -> StatusCode {
    tracing::info!("Shutdown requested");
    state.shutdown.notify_one();
    StatusCode::NO_CONTENT
}
