//! HTTP gateway for the garage cluster controller.
//!
//! This crate exposes a [`ClusterManager`](garage_control::ClusterManager)
//! over a small JSON API. It handles:
//!
//! - Listing, adding and reloading clusters
//! - Starting and stopping single nodes or id ranges
//! - Reporting per-node lifecycle state
//! - Server info and remote shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Clients (garage CLI)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP / JSON
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      garage-gateway                          │
//! │        Router + Handlers  ──►  ApiError mapping              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            garage-control (ClusterManager, fleet)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use garage_control::{ClusterManager, InteriorRegistry};
//! use garage_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(ClusterManager::new(Arc::new(InteriorRegistry::with_builtin())));
//! manager.add("/srv/clusters/lab").await?;
//!
//! let state = GatewayState::new(manager, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3030").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
