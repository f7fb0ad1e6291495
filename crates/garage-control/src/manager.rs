//! Registry of clusters.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use garage_core::ClusterName;
use parking_lot::RwLock;

use crate::cluster::Cluster;
use crate::config::{BackendConfig, ConfigLoader, YamlConfigLoader};
use crate::error::{ControlError, Result};
use crate::interior::InteriorRegistry;
use crate::types::ClusterInfo;

/// Owns every cluster, keyed by name.
pub struct ClusterManager {
    clusters: RwLock<HashMap<ClusterName, Arc<Cluster>>>,
    loader: Arc<dyn ConfigLoader>,
    registry: Arc<InteriorRegistry>,
}

impl ClusterManager {
    /// Create a manager loading `cluster.yml` files.
    #[must_use]
    pub fn new(registry: Arc<InteriorRegistry>) -> Self {
        Self::with_loader(registry, Arc::new(YamlConfigLoader::new()))
    }

    /// Create a manager with a custom configuration loader.
    #[must_use]
    pub fn with_loader(registry: Arc<InteriorRegistry>, loader: Arc<dyn ConfigLoader>) -> Self {
        Self {
            clusters: RwLock::new(HashMap::new()),
            loader,
            registry,
        }
    }

    /// The interior registry shared with every cluster.
    #[must_use]
    pub fn registry(&self) -> &Arc<InteriorRegistry> {
        &self.registry
    }

    /// Load the cluster in `dir` and register it.
    ///
    /// A cluster with the same name is reloaded in place, keeping its live
    /// controllers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or names an
    /// unknown interior backend.
    pub async fn add(&self, dir: impl AsRef<Path>) -> Result<Arc<Cluster>> {
        let dir = dir.as_ref();
        let config = self.loader.load(dir).await.map_err(|e| {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to load cluster");
            ControlError::from(e)
        })?;
        self.upsert(config.backend)
    }

    /// Register a cluster that has no directory.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownInterior` if the backend kind is not
    /// registered.
    pub fn register(&self, config: BackendConfig) -> Result<Arc<Cluster>> {
        self.upsert(config)
    }

    /// Reload every cluster that was loaded from a directory.
    ///
    /// All clusters are reloaded even if some fail.
    ///
    /// # Errors
    ///
    /// Returns the first error after every reload has settled.
    pub async fn reload(&self) -> Result<()> {
        let dirs: Vec<PathBuf> = self
            .clusters
            .read()
            .values()
            .filter_map(|cluster| cluster.basedir())
            .collect();
        tracing::info!(clusters = dirs.len(), "Reloading clusters");

        let results = join_all(dirs.iter().map(|dir| self.add(dir))).await;
        results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    /// Info of every cluster, keyed by name.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, ClusterInfo> {
        self.clusters
            .read()
            .values()
            .map(|cluster| (cluster.name().to_string(), cluster.info()))
            .collect()
    }

    /// Look up a cluster by name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidId` for a malformed name and
    /// `ControlError::ClusterNotFound` if none is registered.
    pub fn cluster(&self, name: &str) -> Result<Arc<Cluster>> {
        let name = ClusterName::new(name)?;
        self.clusters
            .read()
            .get(&name)
            .cloned()
            .ok_or(ControlError::ClusterNotFound(name))
    }

    /// Number of registered clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.read().len()
    }

    /// Returns true if no cluster is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.read().is_empty()
    }

    fn upsert(&self, config: BackendConfig) -> Result<Arc<Cluster>> {
        if !self.registry.contains(&config.interior) {
            return Err(ControlError::UnknownInterior(config.interior));
        }

        let mut clusters = self.clusters.write();
        if let Some(cluster) = clusters.get(&config.cluster) {
            cluster.reload(config);
            return Ok(Arc::clone(cluster));
        }

        let name = config.cluster.clone();
        tracing::info!(cluster = %name, interior = %config.interior, "Adding cluster");
        let cluster = Arc::new(Cluster::new(config, Arc::clone(&self.registry)));
        clusters.insert(name, Arc::clone(&cluster));
        Ok(cluster)
    }
}

impl std::fmt::Debug for ClusterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.clusters.read().keys().map(ToString::to_string).collect();
        names.sort_unstable();
        f.debug_struct("ClusterManager")
            .field("clusters", &names)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{recording_registry, Taps, KIND};
    use crate::config::{ClusterConfig, ConfigError, CONFIG_FILE};
    use crate::interior::Capabilities;
    use crate::types::{ActionOptions, NodeState};
    use async_trait::async_trait;
    use garage_core::NodeId;
    use parking_lot::Mutex;

    fn manager() -> (ClusterManager, Taps) {
        let (registry, taps) = recording_registry(Capabilities::ALL, true);
        (ClusterManager::new(Arc::new(registry)), taps)
    }

    fn write_config(dir: &Path, body: &str) {
        std::fs::write(dir.join(CONFIG_FILE), body).unwrap();
    }

    #[tokio::test]
    async fn add_twice_updates_in_place() {
        let (manager, taps) = manager();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "name: lab\ninterior: recording\n");

        let first = manager.add(dir.path()).await.unwrap();
        first
            .node(NodeId::new("1").unwrap())
            .start(ActionOptions::default())
            .await
            .unwrap();

        write_config(dir.path(), "name: lab\ninterior: recording\nworkdir: work\n");
        let second = manager.add(dir.path()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
        assert!(second.info().adapter.workdir.unwrap().ends_with("work"));
        assert_eq!(
            second.adapter().node_status(&NodeId::new("1").unwrap()).state,
            NodeState::Running
        );
        assert_eq!(taps.len(), 1);
    }

    #[tokio::test]
    async fn add_defaults_name_to_directory() {
        let (manager, _) = manager();
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("beta");
        std::fs::create_dir(&dir).unwrap();
        write_config(&dir, "interior: recording\n");

        let cluster = manager.add(&dir).await.unwrap();
        assert_eq!(cluster.name().as_str(), "beta");
        assert!(manager.list().contains_key("beta"));
        assert!(manager.cluster("beta").is_ok());
    }

    #[tokio::test]
    async fn add_rejects_unknown_interior() {
        let (manager, _) = manager();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "interior: hypervisor\n");
        assert!(matches!(
            manager.add(dir.path()).await,
            Err(ControlError::UnknownInterior(_))
        ));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn add_reports_config_errors() {
        let (manager, _) = manager();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "env: [");
        let err = manager.add(dir.path()).await.unwrap_err();
        assert!(matches!(err, ControlError::Config(ConfigError::Parse { .. })));
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn unknown_cluster_is_not_found() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.cluster("ghost"),
            Err(ControlError::ClusterNotFound(_))
        ));
        assert!(matches!(manager.cluster(""), Err(ControlError::InvalidId(_))));
    }

    /// Loader that records which directories were loaded.
    #[derive(Default)]
    struct CountingLoader {
        loaded: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ConfigLoader for CountingLoader {
        async fn load(&self, dir: &Path) -> std::result::Result<ClusterConfig, ConfigError> {
            self.loaded.lock().push(dir.to_path_buf());
            let name = ClusterName::new(dir.file_name().unwrap().to_string_lossy()).unwrap();
            let mut backend = BackendConfig::new(name.clone(), KIND);
            backend.basedir = Some(dir.to_path_buf());
            Ok(ClusterConfig { name, backend })
        }
    }

    #[tokio::test]
    async fn reload_skips_programmatic_clusters() {
        let (registry, _) = recording_registry(Capabilities::ALL, true);
        let loader = Arc::new(CountingLoader::default());
        let manager = ClusterManager::with_loader(Arc::new(registry), loader.clone());

        manager.add("/clusters/alpha").await.unwrap();
        manager
            .register(BackendConfig::new(ClusterName::new("adhoc").unwrap(), KIND))
            .unwrap();
        assert_eq!(manager.len(), 2);

        loader.loaded.lock().clear();
        manager.reload().await.unwrap();

        assert_eq!(
            *loader.loaded.lock(),
            vec![PathBuf::from("/clusters/alpha")]
        );
        assert_eq!(manager.len(), 2);
    }
}
