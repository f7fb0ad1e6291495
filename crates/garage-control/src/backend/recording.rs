//! Recording interior for tests.
//!
//! Counts invocations per action and lets the test drive reports through the
//! interior's monitor. With [`RecordingInterior::settling`] each invocation
//! immediately reports the state the action settles to.

use std::collections::HashMap;
use std::sync::Arc;

use garage_core::NodeId;
use parking_lot::Mutex;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::interior::{Capabilities, Interior, InteriorRegistry, Monitor, MonitorEvent};
use crate::lifecycle::{Action, InteriorState};
use crate::types::ActionOptions;

/// Registry key used by [`recording_registry`].
pub const KIND: &str = "recording";

#[derive(Debug, Default)]
struct TapState {
    calls: Vec<(Action, ActionOptions)>,
    monitor: Option<Monitor>,
}

/// Shared view of a [`RecordingInterior`].
#[derive(Debug, Clone, Default)]
pub struct InteriorTap {
    inner: Arc<Mutex<TapState>>,
}

impl InteriorTap {
    /// Number of times `action` was invoked.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.inner.lock().calls.iter().filter(|(a, _)| *a == action).count()
    }

    /// Total number of invocations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Invocations in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(Action, ActionOptions)> {
        self.inner.lock().calls.clone()
    }

    /// Forget recorded invocations.
    pub fn reset(&self) {
        self.inner.lock().calls.clear();
    }

    /// Send a report through the interior's monitor.
    ///
    /// # Panics
    ///
    /// Panics if the interior was created without a monitor.
    pub fn report(&self, event: MonitorEvent) {
        let monitor = self.inner.lock().monitor.clone();
        monitor.expect("recording interior has no monitor").send(event);
    }

    /// Report a recognized interior state.
    pub fn report_state(&self, state: InteriorState) {
        self.report(MonitorEvent::State(state.as_str().to_string()));
    }
}

/// Interior that records invocations.
#[derive(Debug)]
pub struct RecordingInterior {
    capabilities: Capabilities,
    settle: bool,
    tap: InteriorTap,
}

impl RecordingInterior {
    /// Create an interior with no monitor, for driving a container directly.
    #[must_use]
    pub fn new(capabilities: Capabilities) -> (Self, InteriorTap) {
        let tap = InteriorTap::default();
        (
            Self {
                capabilities,
                settle: false,
                tap: tap.clone(),
            },
            tap,
        )
    }

    /// Create an interior reporting through `monitor`.
    #[must_use]
    pub fn with_monitor(capabilities: Capabilities, monitor: Monitor) -> (Self, InteriorTap) {
        let (interior, tap) = Self::new(capabilities);
        tap.inner.lock().monitor = Some(monitor);
        (interior, tap)
    }

    /// Report the settled state of every action as soon as it is invoked.
    #[must_use]
    pub const fn settling(mut self) -> Self {
        self.settle = true;
        self
    }
}

impl Interior for RecordingInterior {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn invoke(&mut self, action: Action, opts: &ActionOptions) {
        let mut state = self.tap.inner.lock();
        state.calls.push((action, *opts));
        if !self.settle {
            return;
        }
        if let (Some(monitor), Some(settled)) = (&state.monitor, action.settles_to()) {
            monitor.state(settled);
        }
    }
}

/// Taps of every interior created by a [`recording_registry`].
#[derive(Debug, Clone, Default)]
pub struct Taps {
    inner: Arc<Mutex<HashMap<NodeId, InteriorTap>>>,
}

impl Taps {
    /// Tap of the interior created for `node`, if any.
    #[must_use]
    pub fn get(&self, node: &str) -> Option<InteriorTap> {
        self.inner.lock().get(node).cloned()
    }

    /// Number of interiors created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no interior was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Registry with a single `recording` backend, plus access to its taps.
#[must_use]
pub fn recording_registry(capabilities: Capabilities, settle: bool) -> (InteriorRegistry, Taps) {
    let taps = Taps::default();
    let mut registry = InteriorRegistry::new();
    let created = taps.clone();
    registry.register(
        KIND,
        move |node: &NodeId, _config: &BackendConfig, monitor: Monitor| -> Result<Box<dyn Interior>> {
            let (mut interior, tap) = RecordingInterior::with_monitor(capabilities, monitor);
            interior.settle = settle;
            created.inner.lock().insert(node.clone(), tap);
            Ok(Box::new(interior))
        },
    );
    (registry, taps)
}
