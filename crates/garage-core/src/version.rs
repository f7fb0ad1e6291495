//! Server version metadata.

use serde::{Deserialize, Serialize};

/// Version of the control-plane HTTP API.
///
/// The major component selects the route prefix (`/v1`).
pub const API_VERSION: &str = "1.0";

/// Version and build metadata reported by the server info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Package version of the running server.
    pub version: String,
    /// Version of the HTTP API.
    pub api: String,
    /// Name of the server component.
    pub service: String,
}

impl VersionInfo {
    /// Build the version record for the given service component.
    #[must_use]
    pub fn current(service: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            api: API_VERSION.to_string(),
            service: service.into(),
        }
    }

    /// Return the route prefix derived from the API major version.
    #[must_use]
    pub fn api_prefix(&self) -> String {
        let major = self.api.split('.').next().unwrap_or("1");
        format!("/v{major}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_prefix_uses_major_version() {
        let info = VersionInfo::current("garage-server");
        assert_eq!(info.api_prefix(), "/v1");
        assert_eq!(info.service, "garage-server");
        assert!(!info.version.is_empty());
    }
}
