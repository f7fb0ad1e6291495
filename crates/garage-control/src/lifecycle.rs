//! Node lifecycle state machine.
//!
//! Every node is backed by a [`Container`] that tracks the lifecycle of its
//! isolated environment and dispatches actions to an [`Interior`].
//!
//! # State Machine
//!
//! ```text
//!              load                start
//!   ┌─────────┐ ──▶ ┌─────────┐ ──▶ ┌─────────┐ ──▶ ┌──────────┐ ──▶ ┌─────────┐
//!   │ Offline │     │ Loading │     │ Stopped │     │ Starting │     │ Running │
//!   └─────────┘     └─────────┘     └─────────┘     └──────────┘     └─────────┘
//!        ▲                           │      ▲             │ stop          │ stop
//!        │          ┌───────────┐    │      │             ▼               │
//!        └───────── │ Unloading │ ◀──┘      │       ┌──────────┐          │
//!                   └───────────┘  unload   └────── │ Stopping │ ◀────────┘
//!                                                   └──────────┘
//! ```
//!
//! Actions (`load`, `unload`, `start`, `stop`, `status`) are dispatched
//! through a per-state [`Policy`] table. Reports from the interior
//! (`offline`, `stopped`, `running`) drive the remaining transitions; the
//! interior is the ground truth, so a report that contradicts the expected
//! sequence overrides it.

use std::fmt;

use garage_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ControlError, Result};
use crate::interior::{Interior, MonitorEvent};
use crate::types::ActionOptions;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Not loaded.
    Offline,
    /// Load requested, in progress.
    Loading,
    /// Unload requested, in progress.
    Unloading,
    /// Loaded and ready, not started.
    Stopped,
    /// Start requested, in progress.
    Starting,
    /// Started and running.
    Running,
    /// Stop requested, in progress.
    Stopping,
}

impl LifecycleState {
    /// All lifecycle states.
    pub const ALL: [Self; 7] = [
        Self::Offline,
        Self::Loading,
        Self::Unloading,
        Self::Stopped,
        Self::Starting,
        Self::Running,
        Self::Stopping,
    ];

    /// Lower-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Loading => "loading",
            Self::Unloading => "unloading",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }

    /// Returns how this state handles the given action.
    #[must_use]
    pub const fn policy(self, action: Action) -> Policy {
        use Action::{Load, Start, Status, Stop, Unload};

        match self {
            Self::Offline => match action {
                Load => Policy::Invoke {
                    fallback: Some(Self::Stopped),
                },
                Unload => Policy::Ignore,
                Start | Stop | Status => Policy::Reject,
            },
            Self::Loading => match action {
                Load => Policy::Ignore,
                Unload => Policy::Invoke {
                    fallback: Some(Self::Offline),
                },
                Start | Stop | Status => Policy::Reject,
            },
            Self::Unloading => match action {
                Unload => Policy::Ignore,
                Load | Start | Stop | Status => Policy::Reject,
            },
            Self::Stopped => match action {
                Load => Policy::Reject,
                Unload => Policy::Invoke {
                    fallback: Some(Self::Offline),
                },
                Start => Policy::Invoke { fallback: None },
                Stop => Policy::Ignore,
                Status => Policy::Query,
            },
            Self::Starting | Self::Running => match action {
                Load | Unload => Policy::Reject,
                Start => Policy::Ignore,
                Stop => Policy::Invoke { fallback: None },
                Status => Policy::Query,
            },
            Self::Stopping => match action {
                Load | Unload | Start => Policy::Reject,
                Stop => Policy::InvokeForced,
                Status => Policy::Query,
            },
        }
    }

    /// Returns the state entered when the interior reports `reported`.
    #[must_use]
    pub const fn on_report(self, reported: InteriorState) -> Self {
        use InteriorState as I;

        match (self, reported) {
            (Self::Loading, I::Offline) => Self::Loading,
            (_, I::Offline) => Self::Offline,
            (Self::Unloading, I::Stopped) => Self::Unloading,
            (Self::Starting, I::Stopped) => Self::Starting,
            (_, I::Stopped) => Self::Stopped,
            (Self::Stopping, I::Running) => Self::Stopping,
            (_, I::Running) => Self::Running,
        }
    }

    /// Returns the state entered once `action` has been handed to the interior.
    ///
    /// `None` means taking the action does not move the state machine.
    #[must_use]
    pub const fn on_action(self, action: Action) -> Option<Self> {
        match (self, action) {
            (Self::Offline, Action::Load) => Some(Self::Loading),
            (Self::Stopped, Action::Start) => Some(Self::Starting),
            (Self::Stopped, Action::Unload) => Some(Self::Unloading),
            (Self::Starting | Self::Running | Self::Stopping, Action::Stop) => Some(Self::Stopping),
            _ => None,
        }
    }

    /// Returns true if the state is fully torn down.
    #[must_use]
    pub const fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action that can be requested from a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Load the interior.
    Load,
    /// Unload the interior.
    Unload,
    /// Start the interior.
    Start,
    /// Stop the interior.
    Stop,
    /// Request a status report from the interior.
    Status,
}

impl Action {
    /// All actions.
    pub const ALL: [Self; 5] = [
        Self::Load,
        Self::Unload,
        Self::Start,
        Self::Stop,
        Self::Status,
    ];

    /// Lower-case name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
        }
    }

    /// The interior state a successful run of this action leads to, if any.
    #[must_use]
    pub const fn settles_to(self) -> Option<InteriorState> {
        match self {
            Self::Load | Self::Stop => Some(InteriorState::Stopped),
            Self::Start => Some(InteriorState::Running),
            Self::Unload => Some(InteriorState::Offline),
            Self::Status => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state reported by the interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteriorState {
    /// The environment is not loaded.
    Offline,
    /// The environment is loaded but not started.
    Stopped,
    /// The environment is running.
    Running,
}

impl InteriorState {
    /// Parse a reported state; anything other than the three known names is `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offline" => Some(Self::Offline),
            "stopped" => Some(Self::Stopped),
            "running" => Some(Self::Running),
            _ => None,
        }
    }

    /// Lower-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for InteriorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a lifecycle state handles a requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Invoke the interior capability. If the interior lacks it, move
    /// straight to `fallback`, or reject when there is none.
    Invoke {
        /// State entered when the capability is absent.
        fallback: Option<LifecycleState>,
    },
    /// Invoke the interior capability only when `force` is requested.
    InvokeForced,
    /// Forward to the interior status capability when present.
    Query,
    /// Accept without effect.
    Ignore,
    /// Fail with `InvalidOperation`.
    Reject,
}

/// A notification produced by a container.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    /// The lifecycle state changed.
    State {
        /// State before the transition.
        from: LifecycleState,
        /// State after the transition.
        to: LifecycleState,
    },
    /// The interior reported a status payload.
    Status(Value),
    /// The interior reported an error.
    Error(String),
}

/// Lifecycle state holder for one node.
///
/// A container owns its interior. Notifications are queued and collected by
/// the owner with [`Container::take_events`] after each call.
pub struct Container {
    id: NodeId,
    state: LifecycleState,
    interior_state: InteriorState,
    recent_status: Option<Value>,
    interior: Box<dyn Interior>,
    events: Vec<ContainerEvent>,
}

impl Container {
    /// Create a container in the `offline` state.
    #[must_use]
    pub fn new(id: NodeId, interior: Box<dyn Interior>) -> Self {
        Self {
            id,
            state: LifecycleState::Offline,
            interior_state: InteriorState::Offline,
            recent_status: None,
            interior,
            events: Vec::new(),
        }
    }

    /// Identifier of the node this container tracks.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Last state reported by the interior.
    #[must_use]
    pub const fn interior_state(&self) -> InteriorState {
        self.interior_state
    }

    /// Last status payload reported by the interior.
    #[must_use]
    pub const fn recent_status(&self) -> Option<&Value> {
        self.recent_status.as_ref()
    }

    /// Request the interior to load.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if loading is not permitted
    /// in the current state.
    pub fn load(&mut self, opts: &ActionOptions) -> Result<()> {
        self.perform(Action::Load, opts)
    }

    /// Request the interior to unload.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if unloading is not permitted.
    pub fn unload(&mut self, opts: &ActionOptions) -> Result<()> {
        self.perform(Action::Unload, opts)
    }

    /// Request the interior to start.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if starting is not permitted
    /// or the interior cannot start.
    pub fn start(&mut self, opts: &ActionOptions) -> Result<()> {
        self.perform(Action::Start, opts)
    }

    /// Request the interior to stop.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if stopping is not permitted
    /// or the interior cannot stop.
    pub fn stop(&mut self, opts: &ActionOptions) -> Result<()> {
        self.perform(Action::Stop, opts)
    }

    /// Request a status report from the interior.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if the interior is not loaded.
    pub fn status(&mut self, opts: &ActionOptions) -> Result<()> {
        self.perform(Action::Status, opts)
    }

    /// Dispatch an action according to the current state's policy.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOperation` if the action is rejected;
    /// the state is left unchanged.
    pub fn perform(&mut self, action: Action, opts: &ActionOptions) -> Result<()> {
        match self.state.policy(action) {
            Policy::Ignore => Ok(()),
            Policy::Reject => Err(self.invalid(action, opts)),
            Policy::Query => {
                if self.interior.capabilities().supports(Action::Status) {
                    self.interior.invoke(Action::Status, opts);
                }
                Ok(())
            }
            Policy::InvokeForced if !opts.force => Ok(()),
            Policy::InvokeForced => self.invoke(action, opts, None),
            Policy::Invoke { fallback } => self.invoke(action, opts, fallback),
        }
    }

    /// Apply an event reported by the interior monitor.
    pub fn report(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::State(raw) => match InteriorState::parse(&raw) {
                Some(reported) => {
                    self.interior_state = reported;
                    self.transit(self.state.on_report(reported));
                }
                None => {
                    tracing::debug!(node = %self.id, reported = %raw, "Ignoring unrecognized interior state");
                }
            },
            MonitorEvent::Status(status) => {
                self.recent_status = Some(status.clone());
                self.events.push(ContainerEvent::Status(status));
            }
            MonitorEvent::Error(message) => {
                self.events.push(ContainerEvent::Error(message));
            }
        }
    }

    /// Take the notifications queued since the last call.
    pub fn take_events(&mut self) -> Vec<ContainerEvent> {
        std::mem::take(&mut self.events)
    }

    fn invoke(
        &mut self,
        action: Action,
        opts: &ActionOptions,
        fallback: Option<LifecycleState>,
    ) -> Result<()> {
        if self.interior.capabilities().supports(action) {
            if let Some(next) = self.state.on_action(action) {
                self.transit(next);
            }
            self.interior.invoke(action, opts);
            Ok(())
        } else if let Some(next) = fallback {
            self.transit(next);
            Ok(())
        } else {
            Err(self.invalid(action, opts))
        }
    }

    fn transit(&mut self, next: LifecycleState) {
        if next == self.state {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        tracing::debug!(node = %self.id, from = %from, to = %next, "Lifecycle transition");
        self.events.push(ContainerEvent::State { from, to: next });
    }

    fn invalid(&self, action: Action, opts: &ActionOptions) -> ControlError {
        ControlError::InvalidOperation {
            node: self.id.clone(),
            action,
            options: *opts,
            state: self.state,
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("interior_state", &self.interior_state)
            .finish_non_exhaustive()
    }
}
