//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use garage_core::VersionInfo;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{clusters, health, nodes};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// Cluster and node routes live under the API prefix derived from the API
/// version (`/v1`).
///
/// # Routes
///
/// ## Server
/// - `GET /health` - Health check
/// - `GET /info` - Version metadata
/// - `POST /shutdown` - Acknowledge and exit
///
/// ## Clusters
/// - `GET /v1/clusters` - List clusters
/// - `POST /v1/clusters` - Add clusters from directories
/// - `POST /v1/clusters/reload` - Reload directory-backed clusters
/// - `POST /v1/clusters/:cluster/start` - Start nodes by id or range
/// - `POST /v1/clusters/:cluster/stop` - Stop listed nodes, or all
///
/// ## Nodes
/// - `GET /v1/clusters/:cluster/nodes` - List node states
/// - `GET /v1/clusters/:cluster/nodes/:node` - Node state
/// - `POST /v1/clusters/:cluster/nodes/:node/start` - Start node
/// - `POST /v1/clusters/:cluster/nodes/:node/stop` - Stop node
pub fn create_router(state: GatewayState) -> Router {
    // Extract config values before moving state
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let api_prefix = VersionInfo::current(health::SERVICE_NAME).api_prefix();
    let state = Arc::new(state);

    let api = Router::new()
        // Clusters
        .route(
            "/clusters",
            get(clusters::list_clusters).post(clusters::add_clusters),
        )
        .route("/clusters/reload", post(clusters::reload_clusters))
        .route("/clusters/:cluster/start", post(clusters::start_nodes))
        .route("/clusters/:cluster/stop", post(clusters::stop_nodes))
        // Nodes
        .route("/clusters/:cluster/nodes", get(nodes::list_nodes))
        .route("/clusters/:cluster/nodes/:node", get(nodes::get_node))
        .route("/clusters/:cluster/nodes/:node/start", post(nodes::start_node))
        .route("/clusters/:cluster/nodes/:node/stop", post(nodes::stop_node));

    Router::new()
        // Server
        .route("/health", get(health::health))
        .route("/info", get(health::info))
        .route("/shutdown", post(health::shutdown))
        .nest(&api_prefix, api)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use garage_control::{
        Action, BackendConfig, ClusterManager, ClusterName, InteriorRegistry, SimulationConfig,
    };
    use serde_json::{json, Value};

    use crate::config::GatewayConfig;

    fn server_with(manager: Arc<ClusterManager>) -> (TestServer, GatewayState) {
        let state = GatewayState::new(manager, GatewayConfig::default());
        let server = TestServer::new(create_router(state.clone())).unwrap();
        (server, state)
    }

    fn simulated_manager(faults: &[(&str, Action)]) -> Arc<ClusterManager> {
        let manager = ClusterManager::new(Arc::new(InteriorRegistry::with_builtin()));
        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), "simulated")
            .with_simulation(SimulationConfig {
                delay_ms: 1,
                faults: faults
                    .iter()
                    .map(|(id, action)| ((*id).to_string(), *action))
                    .collect(),
            });
        manager.register(config).unwrap();
        Arc::new(manager)
    }

    #[tokio::test]
    async fn health_and_info() {
        let (server, _) = server_with(simulated_manager(&[]));

        let health = server.get("/health").await;
        health.assert_status_ok();
        assert_eq!(health.json::<Value>()["status"], "healthy");

        let info = server.get("/info").await;
        info.assert_status_ok();
        assert_eq!(info.json::<Value>()["service"], "garage-server");
    }

    #[tokio::test]
    async fn list_clusters() {
        let (server, _) = server_with(simulated_manager(&[]));
        let response = server.get("/v1/clusters").await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({"lab": {"name": "lab", "adapter": "container", "interior": "simulated"}})
        );
    }

    #[tokio::test]
    async fn unknown_cluster_is_404() {
        let (server, _) = server_with(simulated_manager(&[]));
        let response = server.get("/v1/clusters/ghost/nodes").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn start_requires_ids() {
        let (server, _) = server_with(simulated_manager(&[]));
        let response = server
            .post("/v1/clusters/lab/start")
            .json(&json!({"options": {"clean": true}}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_range_is_rejected() {
        let (server, _) = server_with(simulated_manager(&[]));
        let response = server
            .post("/v1/clusters/lab/start")
            .json(&json!({"ids": ["0-18446744073709551615"]}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(server
            .get("/v1/clusters/lab/nodes")
            .await
            .json::<Value>()
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn add_requires_paths() {
        let (server, _) = server_with(simulated_manager(&[]));
        let response = server.post("/v1/clusters").json(&json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn start_list_and_stop_nodes() {
        let (server, _) = server_with(simulated_manager(&[]));

        server
            .post("/v1/clusters/lab/start")
            .json(&json!({"ids": ["1", "2-3"]}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let nodes = server.get("/v1/clusters/lab/nodes").await.json::<Value>();
        for id in ["1", "2", "3"] {
            assert_eq!(nodes[id]["state"], "RUNNING");
        }

        let fresh = server.get("/v1/clusters/lab/nodes/9").await;
        fresh.assert_status_ok();
        assert_eq!(fresh.json::<Value>(), json!({"state": "UNPROVISIONED"}));

        server
            .post("/v1/clusters/lab/nodes/2/stop")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let two = server.get("/v1/clusters/lab/nodes/2").await.json::<Value>();
        assert_ne!(two["state"], "RUNNING");

        server
            .post("/v1/clusters/lab/stop")
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn node_failure_is_bad_gateway() {
        let (server, _) = server_with(simulated_manager(&[("2", Action::Load)]));
        let response = server
            .post("/v1/clusters/lab/start")
            .json(&json!({"ids": ["1-2"]}))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.json::<Value>()["error"]["code"], "backend_error");

        let one = server.get("/v1/clusters/lab/nodes/1").await.json::<Value>();
        assert_eq!(one["state"], "RUNNING");
    }

    #[tokio::test]
    async fn add_and_reload_cluster_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cluster.yml"),
            "name: yard\ninterior: simulated\n",
        )
        .unwrap();
        let (server, _) = server_with(simulated_manager(&[]));

        let response = server
            .post("/v1/clusters")
            .json(&json!({"paths": [dir.path()]}))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()[0]["name"], "yard");

        server
            .post("/v1/clusters/reload")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let clusters = server.get("/v1/clusters").await.json::<Value>();
        assert!(clusters.get("yard").is_some());
        assert!(clusters.get("lab").is_some());
    }

    #[tokio::test]
    async fn shutdown_notifies_server() {
        let (server, state) = server_with(simulated_manager(&[]));
        server
            .post("/shutdown")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        tokio::time::timeout(std::time::Duration::from_secs(1), state.shutdown_requested())
            .await
            .unwrap();
    }
}
