//! Core types and utilities for garage.
//!
//! This crate provides the foundational types shared by the garage crates:
//!
//! - **Identifiers**: validated node ids and cluster names
//! - **Version**: the server version record reported to clients
//!
//! # Example
//!
//! ```
//! use garage_core::{ClusterName, NodeId};
//!
//! let cluster = ClusterName::new("lab").unwrap();
//! let node: NodeId = "3".parse().unwrap();
//! assert_eq!(format!("{cluster}-{node}"), "lab-3");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod version;

pub use ids::{ClusterName, IdError, NodeId};
pub use version::{VersionInfo, API_VERSION};
