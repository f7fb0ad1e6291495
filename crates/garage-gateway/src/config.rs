//! Gateway configuration types.
//!
//! Configuration is read from the environment:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `LISTEN_ADDR` | `127.0.0.1:3030` | Socket address to bind |
//! | `ADDRESS` / `PORT` | | Used when `LISTEN_ADDR` is unset |
//! | `GARAGE_CLUSTERS` | | Path list of cluster directories to preload |
//! | `REQUEST_TIMEOUT_SECONDS` | `30` | Per-request timeout |
//! | `MAX_BODY_BYTES` | `1048576` | Request body limit |

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "127.0.0.1:3030").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Cluster directories loaded at startup.
    #[serde(default)]
    pub clusters: Vec<PathBuf>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "127.0.0.1:3030".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unparsable values fall back to
    /// their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| {
            match (lookup("ADDRESS"), lookup("PORT")) {
                (None, None) => Self::default_listen_addr(),
                (address, port) => format!(
                    "{}:{}",
                    address.as_deref().unwrap_or("127.0.0.1"),
                    port.as_deref().unwrap_or("3030")
                ),
            }
        });

        let clusters = lookup("GARAGE_CLUSTERS")
            .map(|paths| {
                std::env::split_paths(&paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            listen_addr,
            clusters,
            max_body_bytes: lookup("MAX_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(Self::default_max_body),
            request_timeout_seconds: lookup("REQUEST_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(Self::default_request_timeout),
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            clusters: Vec::new(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}
