//! Script-driven interior.
//!
//! Each action runs `<scriptdir>/<action> <node-id>`. Only actions whose
//! script exists are advertised. A zero exit reports the state the action
//! settles to; `key: value` lines on stdout are reported as a status map;
//! a non-zero exit is reported as an error.

use std::path::PathBuf;
use std::process::Stdio;

use garage_core::NodeId;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::config::BackendConfig;
use crate::error::{ControlError, Result};
use crate::interior::{Capabilities, Interior, Monitor};
use crate::lifecycle::Action;
use crate::types::ActionOptions;

/// Registry key of this backend.
pub const KIND: &str = "script";

/// Interior that shells out to per-action scripts.
#[derive(Debug)]
pub struct ScriptInterior {
    node: NodeId,
    scriptdir: PathBuf,
    workdir: Option<PathBuf>,
    env: Vec<(String, String)>,
    capabilities: Capabilities,
    monitor: Monitor,
}

impl ScriptInterior {
    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Interior` if the cluster has no script directory.
    pub fn create(
        node: &NodeId,
        config: &BackendConfig,
        monitor: Monitor,
    ) -> Result<Box<dyn Interior>> {
        Ok(Box::new(Self::new(node, config, monitor)?))
    }

    /// Create an interior for `node`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Interior` if the cluster has no script directory.
    pub fn new(node: &NodeId, config: &BackendConfig, monitor: Monitor) -> Result<Self> {
        let scriptdir = config.scriptdir.clone().ok_or_else(|| ControlError::Interior {
            node: node.clone(),
            message: "no script directory configured".to_string(),
        })?;

        let capabilities = Action::ALL
            .into_iter()
            .filter(|action| scriptdir.join(action.as_str()).is_file())
            .collect();

        let mut env: Vec<(String, String)> = config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.push(("CLUSTER_NAME".into(), config.cluster.to_string()));
        if let Some(base) = &config.basedir {
            env.push(("CLUSTER_BASE".into(), base.display().to_string()));
        }
        if let Some(workdir) = &config.workdir {
            env.push(("CLUSTER_WORKDIR".into(), workdir.display().to_string()));
        }
        env.push(("CLUSTER_SCRIPTS_DIR".into(), scriptdir.display().to_string()));
        env.push(("NODE_ID".into(), node.to_string()));

        tracing::debug!(node = %node, scriptdir = %scriptdir.display(), ?capabilities, "Script interior created");

        Ok(Self {
            node: node.clone(),
            scriptdir,
            workdir: config.workdir.clone(),
            env,
            capabilities,
            monitor,
        })
    }

    fn command(&self, action: Action, opts: &ActionOptions) -> Command {
        let mut cmd = Command::new(self.scriptdir.join(action.as_str()));
        cmd.arg(self.node.as_str())
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        if opts.clean {
            cmd.env("NODE_CLEAN", "1");
        }
        if opts.force {
            cmd.env("NODE_FORCE", "1");
        }
        cmd
    }
}

impl Interior for ScriptInterior {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn invoke(&mut self, action: Action, opts: &ActionOptions) {
        let mut cmd = self.command(action, opts);
        let monitor = self.monitor.clone();
        let node = self.node.clone();

        tokio::spawn(async move {
            tracing::debug!(node = %node, %action, "Running script");
            match cmd.output().await {
                Ok(output) if output.status.success() => {
                    let status = parse_status(&String::from_utf8_lossy(&output.stdout));
                    if action == Action::Status || !status.is_empty() {
                        monitor.status(Value::Object(status));
                    }
                    if let Some(state) = action.settles_to() {
                        monitor.state(state);
                    }
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    monitor.error(format!(
                        "{action} script {}: {}",
                        output.status,
                        stderr.trim()
                    ));
                }
                Err(e) => monitor.error(format!("{action} script failed to run: {e}")),
            }
        });
    }
}

/// Parse `key: value` lines into a map. Lines without a colon or with an
/// empty key are skipped.
#[must_use]
pub fn parse_status(stdout: &str) -> Map<String, Value> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
