//! Control plane for garage node lifecycles.
//!
//! This crate drives isolated execution environments ("nodes") grouped into
//! clusters. Each node is backed by a lifecycle state machine whose actions
//! are carried out by a pluggable interior backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP) / CLI                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ClusterManager ──▶ Cluster ──▶ Adapter ──▶ Controller task │
//! │        │                                        │           │
//! │   ConfigLoader                              Container       │
//! │                                            (state machine)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!        ┌──────────┐   ┌────────────┐   ┌────────────┐
//!        │  script  │   │ simulated  │   │    ...     │
//!        └──────────┘   └────────────┘   └────────────┘
//!                    InteriorRegistry backends
//! ```
//!
//! Requests flow down; state, status and error reports flow back up
//! through each interior's [`Monitor`].
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use garage_control::{fleet, ActionOptions, ClusterManager, InteriorRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ClusterManager::new(Arc::new(InteriorRegistry::with_builtin()));
//! let cluster = manager.add("/srv/clusters/lab").await?;
//!
//! fleet::start_nodes(&cluster, &["1-3"], ActionOptions::default()).await?;
//! for (id, status) in cluster.node_statuses() {
//!     println!("{id}: {}", status.state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! See the [`lifecycle`] module for the state machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod backend;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod error;
pub mod fleet;
pub mod interior;
pub mod lifecycle;
pub mod manager;
pub mod types;

pub use adapter::Adapter;
pub use cluster::{Cluster, Node};
pub use config::{BackendConfig, ClusterConfig, ConfigError, ConfigLoader, SimulationConfig, YamlConfigLoader};
pub use controller::{ControllerHandle, Pending, Prepared, Snapshot};
pub use error::{ControlError, Result};
pub use interior::{Capabilities, Interior, InteriorRegistry, Monitor, MonitorEvent};
pub use lifecycle::{Action, Container, ContainerEvent, InteriorState, LifecycleState};
pub use manager::ClusterManager;
pub use types::{ActionOptions, AdapterInfo, ClusterInfo, NodeState, NodeStatus};

// Re-export commonly used types from dependencies for convenience
pub use garage_core::{ClusterName, NodeId};
