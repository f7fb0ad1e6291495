//! HTTP client for the garage-server REST API.
//!
//! This module provides a typed client for interacting with garage-server.

use std::collections::BTreeMap;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{
    ActionOptions, AddClustersRequest, ApiErrorResponse, ClusterInfo, NodeStatus, NodesRequest,
    ServerInfo,
};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("{message} ({status} {code})")]
    Api {
        /// HTTP status.
        status: u16,
        /// Server error code.
        code: String,
        /// Server error message.
        message: String,
    },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Client for the garage-server REST API.
#[derive(Debug, Clone)]
pub struct ServerClient {
    client: Client,
    base_url: String,
}

impl ServerClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the server (e.g., "http://localhost:3030")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ClientError {
        let status = response.status();
        match response.json::<ApiErrorResponse>().await {
            Ok(err) => ClientError::Api {
                status: status.as_u16(),
                code: err.error.code,
                message: err.error.message,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: "unknown".to_string(),
                message: format!("Request failed {status}"),
            },
        }
    }

    async fn checked(response: Response) -> Result<Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::handle_error(response).await)
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        tracing::debug!(path, "GET");
        let response = Self::checked(self.client.get(self.url(path)).send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        tracing::debug!(path, "POST");
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::checked(request.send().await?).await
    }

    // =========================================================================
    // Server
    // =========================================================================

    /// Server version record.
    pub async fn info(&self) -> Result<ServerInfo, ClientError> {
        self.get("/info").await
    }

    /// Ask the server to exit.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.post::<()>("/shutdown", None).await?;
        Ok(())
    }

    // =========================================================================
    // Cluster Operations
    // =========================================================================

    /// List all clusters by name.
    pub async fn list_clusters(&self) -> Result<BTreeMap<String, ClusterInfo>, ClientError> {
        self.get("/v1/clusters").await
    }

    /// Register clusters from directories on the server host.
    pub async fn add_clusters(&self, paths: Vec<String>) -> Result<Vec<ClusterInfo>, ClientError> {
        let response = self
            .post("/v1/clusters", Some(&AddClustersRequest { paths }))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Reload directory-backed clusters.
    pub async fn reload(&self) -> Result<(), ClientError> {
        self.post::<()>("/v1/clusters/reload", None).await?;
        Ok(())
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// State of every node of a cluster.
    pub async fn list_nodes(
        &self,
        cluster: &str,
    ) -> Result<BTreeMap<String, NodeStatus>, ClientError> {
        self.get(&format!("/v1/clusters/{cluster}/nodes")).await
    }

    /// State of one node.
    pub async fn node(&self, cluster: &str, id: &str) -> Result<NodeStatus, ClientError> {
        self.get(&format!("/v1/clusters/{cluster}/nodes/{id}")).await
    }

    /// Start nodes by id or `start-end` range.
    pub async fn start_nodes(
        &self,
        cluster: &str,
        ids: Vec<String>,
        options: ActionOptions,
    ) -> Result<(), ClientError> {
        let body = NodesRequest {
            ids: Some(ids),
            options,
        };
        self.post(&format!("/v1/clusters/{cluster}/start"), Some(&body))
            .await?;
        Ok(())
    }

    /// Stop the listed nodes, or every node when `ids` is `None`.
    pub async fn stop_nodes(
        &self,
        cluster: &str,
        ids: Option<Vec<String>>,
        options: ActionOptions,
    ) -> Result<(), ClientError> {
        let body = NodesRequest { ids, options };
        self.post(&format!("/v1/clusters/{cluster}/stop"), Some(&body))
            .await?;
        Ok(())
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use garage_control::{
        BackendConfig, ClusterManager, ClusterName, InteriorRegistry, SimulationConfig,
    };
    use garage_gateway::{create_router, GatewayConfig, GatewayState};

    async fn spawn_server() -> ServerClient {
        let manager = ClusterManager::new(Arc::new(InteriorRegistry::with_builtin()));
        manager
            .register(
                BackendConfig::new(ClusterName::new("lab").unwrap(), "simulated")
                    .with_simulation(SimulationConfig {
                        delay_ms: 1,
                        ..SimulationConfig::default()
                    }),
            )
            .unwrap();
        let state = GatewayState::new(Arc::new(manager), GatewayConfig::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        ServerClient::new(format!("http://{addr}/"))
    }

    #[test]
    fn trims_trailing_slash() {
        let client = ServerClient::new("http://localhost:3030/");
        assert_eq!(client.base_url(), "http://localhost:3030");
    }

    #[tokio::test]
    async fn lists_clusters_and_info() {
        let client = spawn_server().await;

        let info = client.info().await.unwrap();
        assert_eq!(info.service, "garage-server");

        let clusters = client.list_clusters().await.unwrap();
        assert_eq!(clusters["lab"].details["interior"], "simulated");
    }

    #[tokio::test]
    async fn starts_and_stops_nodes() {
        let client = spawn_server().await;
        let options = ActionOptions::default();

        client
            .start_nodes("lab", vec!["1-2".into()], options)
            .await
            .unwrap();
        client
            .start_nodes("lab", vec!["5".into()], options)
            .await
            .unwrap();

        let nodes = client.list_nodes("lab").await.unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.values().all(|n| n.state == "RUNNING"));

        client.stop_nodes("lab", None, options).await.unwrap();
        assert_ne!(client.node("lab", "1").await.unwrap().state, "RUNNING");
    }

    #[tokio::test]
    async fn server_errors_carry_message() {
        let client = spawn_server().await;
        match client.list_nodes("ghost").await {
            Err(ClientError::Api { status, code, message }) => {
                assert_eq!(status, 404);
                assert_eq!(code, "not_found");
                assert!(message.contains("ghost"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
