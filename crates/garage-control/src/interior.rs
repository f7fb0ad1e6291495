//! The interior contract and the backend registry.
//!
//! An [`Interior`] performs lifecycle actions against a real execution
//! environment. Every capability is optional: a container consults
//! [`Interior::capabilities`] and applies its fallback policy when one is
//! missing. Actions are fire-and-forget; outcomes come back later through
//! the [`Monitor`] handed to the interior at construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use garage_core::NodeId;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::BackendConfig;
use crate::error::{ControlError, Result};
use crate::lifecycle::{Action, InteriorState};
use crate::types::ActionOptions;

/// Backend that performs lifecycle actions for one node.
pub trait Interior: Send + 'static {
    /// Actions this interior implements.
    fn capabilities(&self) -> Capabilities;

    /// Begin an action. Completion is reported through the monitor.
    ///
    /// Only called for actions contained in [`Interior::capabilities`].
    fn invoke(&mut self, action: Action, opts: &ActionOptions);
}

/// Set of actions an interior implements.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);

    /// Every action.
    pub const ALL: Self = Self(0b1_1111);

    const fn bit(action: Action) -> u8 {
        1 << action as u8
    }

    /// Returns a copy including `action`.
    #[must_use]
    pub const fn with(self, action: Action) -> Self {
        Self(self.0 | Self::bit(action))
    }

    /// Returns a copy excluding `action`.
    #[must_use]
    pub const fn without(self, action: Action) -> Self {
        Self(self.0 & !Self::bit(action))
    }

    /// Returns true if `action` is implemented.
    #[must_use]
    pub const fn supports(self, action: Action) -> bool {
        self.0 & Self::bit(action) != 0
    }

    /// Iterate over the implemented actions.
    pub fn iter(self) -> impl Iterator<Item = Action> {
        Action::ALL.into_iter().filter(move |a| self.supports(*a))
    }
}

impl FromIterator<Action> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// An event reported by an interior.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The environment entered a state. Only `offline`, `stopped` and
    /// `running` are recognized.
    State(String),
    /// An opaque status payload.
    Status(Value),
    /// The environment failed.
    Error(String),
}

/// Reporting channel from an interior back to its controller.
#[derive(Debug, Clone)]
pub struct Monitor {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl Monitor {
    /// Create a monitor and the receiving end its owner listens on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an event. Events sent after the owner is gone are dropped.
    pub fn send(&self, event: MonitorEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Dropping interior report for a retired controller");
        }
    }

    /// Report a recognized state.
    pub fn state(&self, state: InteriorState) {
        self.send(MonitorEvent::State(state.as_str().to_string()));
    }

    /// Report a status payload.
    pub fn status(&self, status: Value) {
        self.send(MonitorEvent::Status(status));
    }

    /// Report an error.
    pub fn error(&self, message: impl Into<String>) {
        self.send(MonitorEvent::Error(message.into()));
    }
}

/// Constructor for one interior backend.
pub type InteriorFactory =
    Arc<dyn Fn(&NodeId, &BackendConfig, Monitor) -> Result<Box<dyn Interior>> + Send + Sync>;

/// Explicit map from backend kind to factory.
///
/// Built once at process start and shared into the components that create
/// interiors.
#[derive(Clone, Default)]
pub struct InteriorRegistry {
    factories: HashMap<String, InteriorFactory>,
}

impl InteriorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in `script` and `simulated` backends.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(crate::backend::script::KIND, crate::backend::script::ScriptInterior::create);
        registry.register(
            crate::backend::simulated::KIND,
            crate::backend::simulated::SimulatedInterior::create,
        );
        registry
    }

    /// Register a factory, replacing any previous one for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&NodeId, &BackendConfig, Monitor) -> Result<Box<dyn Interior>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Returns true if a factory is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered backend kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Create an interior for `node` using the backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownInterior` if no factory is registered
    /// for the configured kind, or whatever the factory fails with.
    pub fn create(
        &self,
        node: &NodeId,
        config: &BackendConfig,
        monitor: Monitor,
    ) -> Result<Box<dyn Interior>> {
        let factory = self
            .factories
            .get(&config.interior)
            .ok_or_else(|| ControlError::UnknownInterior(config.interior.clone()))?;
        factory(node, config, monitor)
    }
}

impl fmt::Debug for InteriorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteriorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_core::ClusterName;

    #[test]
    fn capabilities_set_operations() {
        let caps = Capabilities::ALL.without(Action::Load);
        assert!(!caps.supports(Action::Load));
        assert!(caps.supports(Action::Stop));
        assert_eq!(caps.iter().count(), 4);
        assert_eq!(caps.with(Action::Load), Capabilities::ALL);

        let collected: Capabilities = [Action::Start, Action::Stop].into_iter().collect();
        assert!(collected.supports(Action::Start));
        assert!(!collected.supports(Action::Status));
        assert_eq!(format!("{collected:?}"), "{Start, Stop}");
    }

    #[tokio::test]
    async fn monitor_delivers_in_order() {
        let (monitor, mut rx) = Monitor::channel();
        monitor.state(InteriorState::Stopped);
        monitor.error("boom");
        assert_eq!(rx.recv().await, Some(MonitorEvent::State("stopped".into())));
        assert_eq!(rx.recv().await, Some(MonitorEvent::Error("boom".into())));
    }

    #[test]
    fn monitor_send_after_close_is_silent() {
        let (monitor, rx) = Monitor::channel();
        drop(rx);
        monitor.state(InteriorState::Running);
    }

    #[test]
    fn registry_rejects_unknown_kind() {
        let registry = InteriorRegistry::with_builtin();
        assert_eq!(registry.kinds(), vec!["script", "simulated"]);

        let config = BackendConfig::new(ClusterName::new("lab").unwrap(), "hypervisor");
        let (monitor, _rx) = Monitor::channel();
        let err = registry
            .create(&NodeId::new("1").unwrap(), &config, monitor)
            .err()
            .unwrap();
        assert!(matches!(err, ControlError::UnknownInterior(kind) if kind == "hypervisor"));
    }
}
