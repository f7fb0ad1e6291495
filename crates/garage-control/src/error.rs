//! Error types for the control plane.
//!
//! This module defines all errors that can occur while driving node
//! lifecycles, loading cluster configuration and resolving clusters.

use garage_core::{ClusterName, IdError, NodeId};
use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::{Action, LifecycleState};
use crate::types::ActionOptions;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The action is not permitted in the container's current state.
    #[error("invalid operation {action} {options} on node {node} in state {state}")]
    InvalidOperation {
        /// The node the action was requested on.
        node: NodeId,
        /// The rejected action.
        action: Action,
        /// Options supplied with the action.
        options: ActionOptions,
        /// The state the container was in.
        state: LifecycleState,
    },

    /// The node settled in a state the pending operation did not expect.
    #[error("node {node} entered unexpected state {state}")]
    InvalidState {
        /// The node.
        node: NodeId,
        /// The state it entered.
        state: LifecycleState,
    },

    /// A pending operation was superseded by a newer one.
    #[error("operation on node {0} was superseded by a newer request")]
    Overrun(NodeId),

    /// The interior reported an error while an operation was pending.
    #[error("interior error on node {node}: {message}")]
    Interior {
        /// The node.
        node: NodeId,
        /// The reported error.
        message: String,
    },

    /// The requested cluster is not registered.
    #[error("cluster not found: {0}")]
    ClusterNotFound(ClusterName),

    /// No interior backend is registered under this name.
    #[error("unknown interior backend: {0}")]
    UnknownInterior(String),

    /// Cluster configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A node list expands to more ids than a single request may address.
    #[error("node list expands to {requested} ids, at most {max} allowed")]
    TooManyNodes {
        /// Number of ids the tokens expand to, saturating at `u64::MAX`.
        requested: u64,
        /// Limit per request.
        max: u64,
    },

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::ClusterNotFound(_) => 404,
            Self::InvalidId(_)
            | Self::TooManyNodes { .. }
            | Self::Config(_)
            | Self::UnknownInterior(_) => 400,
            Self::InvalidOperation { .. } | Self::InvalidState { .. } | Self::Overrun(_) => 409,
            Self::Interior { .. } => 502,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let node = NodeId::new("1").unwrap();

        assert_eq!(
            ControlError::ClusterNotFound(ClusterName::new("lab").unwrap()).http_status_code(),
            404
        );
        assert_eq!(
            ControlError::InvalidId(IdError::Empty).http_status_code(),
            400
        );
        assert_eq!(
            ControlError::InvalidOperation {
                node: node.clone(),
                action: Action::Start,
                options: ActionOptions::default(),
                state: LifecycleState::Offline,
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            ControlError::TooManyNodes {
                requested: 20_000,
                max: 10_000
            }
            .http_status_code(),
            400
        );
        assert_eq!(ControlError::Overrun(node.clone()).http_status_code(), 409);
        assert_eq!(
            ControlError::Interior {
                node,
                message: "boom".into()
            }
            .http_status_code(),
            502
        );
        assert_eq!(ControlError::Internal("x".into()).http_status_code(), 500);
    }

    #[test]
    fn invalid_operation_message() {
        let err = ControlError::InvalidOperation {
            node: NodeId::new("4").unwrap(),
            action: Action::Load,
            options: ActionOptions {
                force: true,
                clean: false,
            },
            state: LifecycleState::Running,
        };
        assert_eq!(
            err.to_string(),
            "invalid operation load {force} on node 4 in state running"
        );
    }
}
