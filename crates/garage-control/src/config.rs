//! Cluster configuration.
//!
//! A cluster directory may hold a `cluster.yml`:
//!
//! ```yaml
//! name: lab            # defaults to the directory name
//! interior: script     # backend kind
//! workdir: ./work      # relative paths resolve against the directory
//! scriptdir: ./scripts
//! env:
//!   IMAGE: debian-12
//! simulation:
//!   delay_ms: 20
//!   faults:
//!     "2": start
//! ```
//!
//! Keys other than the ones above are kept as opaque backend options.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use garage_core::{ClusterName, IdError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::Action;

/// Name of the configuration file inside a cluster directory.
pub const CONFIG_FILE: &str = "cluster.yml";

/// Backend kind used when none is configured.
pub const DEFAULT_INTERIOR: &str = "script";

/// Errors that can occur while loading cluster configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The directory or file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid YAML for a cluster configuration.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The configured or derived cluster name is not a valid identifier.
    #[error("invalid cluster name for {path}: {source}")]
    InvalidName {
        /// Cluster directory.
        path: PathBuf,
        /// Validation error.
        #[source]
        source: IdError,
    },
}

/// Timings and faults for the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Delay before each action reports, in milliseconds.
    pub delay_ms: u64,
    /// Node id to the action that fails on that node.
    pub faults: BTreeMap<String, Action>,
}

impl SimulationConfig {
    /// Delay before each action reports.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 50,
            faults: BTreeMap::new(),
        }
    }
}

/// Everything a backend needs to build interiors for a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Name of the owning cluster.
    pub cluster: ClusterName,
    /// Backend kind, a key of the interior registry.
    pub interior: String,
    /// Cluster directory, if the cluster was loaded from one.
    pub basedir: Option<PathBuf>,
    /// Working directory for the backend.
    pub workdir: Option<PathBuf>,
    /// Directory holding action scripts.
    pub scriptdir: Option<PathBuf>,
    /// Extra environment for scripts.
    pub env: BTreeMap<String, String>,
    /// Simulated backend settings.
    pub simulation: SimulationConfig,
    /// Unrecognized keys, passed through untouched.
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl BackendConfig {
    /// Create a configuration for a cluster with no directory.
    #[must_use]
    pub fn new(cluster: ClusterName, interior: impl Into<String>) -> Self {
        Self {
            cluster,
            interior: interior.into(),
            basedir: None,
            workdir: None,
            scriptdir: None,
            env: BTreeMap::new(),
            simulation: SimulationConfig::default(),
            options: BTreeMap::new(),
        }
    }

    /// Set the simulated backend settings.
    #[must_use]
    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// Set the script directory.
    #[must_use]
    pub fn with_scriptdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scriptdir = Some(dir.into());
        self
    }
}

/// A loaded cluster configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Resolved cluster name.
    pub name: ClusterName,
    /// Backend settings.
    pub backend: BackendConfig,
}

/// On-disk shape of `cluster.yml`.
#[derive(Debug, Default, Deserialize)]
struct ClusterFile {
    name: Option<String>,
    interior: Option<String>,
    workdir: Option<PathBuf>,
    scriptdir: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    simulation: SimulationConfig,
    #[serde(flatten)]
    options: BTreeMap<String, serde_yaml::Value>,
}

/// Loads cluster configuration from a directory.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Load the configuration of the cluster rooted at `dir`.
    async fn load(&self, dir: &Path) -> Result<ClusterConfig, ConfigError>;
}

/// Reads `cluster.yml` from the cluster directory.
#[derive(Debug, Clone, Default)]
pub struct YamlConfigLoader;

impl YamlConfigLoader {
    /// Create a loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigLoader for YamlConfigLoader {
    async fn load(&self, dir: &Path) -> Result<ClusterConfig, ConfigError> {
        let basedir = tokio::fs::canonicalize(dir)
            .await
            .map_err(|source| ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
        let path = basedir.join(CONFIG_FILE);

        let file = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => ClusterFile::default(),
            Ok(contents) => serde_yaml::from_str(&contents)
                .map_err(|source| ConfigError::Parse { path: path.clone(), source })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No cluster file, using defaults");
                ClusterFile::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        resolve(file, basedir)
    }
}

fn resolve(file: ClusterFile, basedir: PathBuf) -> Result<ClusterConfig, ConfigError> {
    let raw_name = match file.name {
        Some(name) => name,
        None => basedir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let name = ClusterName::new(raw_name).map_err(|source| ConfigError::InvalidName {
        path: basedir.clone(),
        source,
    })?;

    let workdir = file
        .workdir
        .map_or_else(|| basedir.clone(), |w| basedir.join(w));
    let scriptdir = basedir.join(file.scriptdir.unwrap_or_else(|| PathBuf::from("scripts")));

    let backend = BackendConfig {
        cluster: name.clone(),
        interior: file.interior.unwrap_or_else(|| DEFAULT_INTERIOR.to_string()),
        basedir: Some(basedir),
        workdir: Some(workdir),
        scriptdir: Some(scriptdir),
        env: file.env,
        simulation: file.simulation,
        options: file.options,
    };

    Ok(ClusterConfig { name, backend })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(dir: &Path) -> Result<ClusterConfig, ConfigError> {
        YamlConfigLoader::new().load(dir).await
    }

    #[tokio::test]
    async fn missing_file_uses_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("alpha");
        std::fs::create_dir(&dir).unwrap();

        let config = load(&dir).await.unwrap();
        assert_eq!(config.name.as_str(), "alpha");
        assert_eq!(config.backend.interior, DEFAULT_INTERIOR);
        let base = config.backend.basedir.clone().unwrap();
        assert_eq!(config.backend.scriptdir, Some(base.join("scripts")));
        assert_eq!(config.backend.workdir, Some(base));
    }

    #[tokio::test]
    async fn file_overrides_and_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "name: lab\ninterior: simulated\nworkdir: work\nenv:\n  IMAGE: debian\n\
             simulation:\n  delay_ms: 5\n  faults:\n    \"2\": start\nmemory: 512\n",
        )
        .unwrap();

        let config = load(dir.path()).await.unwrap();
        assert_eq!(config.name.as_str(), "lab");
        assert_eq!(config.backend.cluster.as_str(), "lab");
        assert_eq!(config.backend.interior, "simulated");
        assert!(config.backend.workdir.unwrap().ends_with("work"));
        assert_eq!(config.backend.env.get("IMAGE").map(String::as_str), Some("debian"));
        assert_eq!(config.backend.simulation.delay(), Duration::from_millis(5));
        assert_eq!(config.backend.simulation.faults.get("2"), Some(&Action::Start));
        assert_eq!(
            config.backend.options.get("memory"),
            Some(&serde_yaml::Value::from(512))
        );
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "env: [unterminated").unwrap();
        assert!(matches!(load(dir.path()).await, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn missing_directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(load(&missing).await, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "name: \"\"\n").unwrap();
        assert!(matches!(
            load(dir.path()).await,
            Err(ConfigError::InvalidName { .. })
        ));
    }
}
