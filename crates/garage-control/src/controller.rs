//! Start/stop sequencing over a container.
//!
//! A controller turns the multi-step lifecycle into two verbs. It runs as a
//! tokio task that exclusively owns its [`Container`]; requests arrive on a
//! command channel and interior reports on the monitor channel, and the task
//! handles one message at a time.
//!
//! Each request carries a completion. Only one completion is pending at a
//! time: a newer request supersedes the older one, which fails with
//! `Overrun`. The pending completion is driven by an expectation table that
//! maps each state notification to the next step.
//!
//! Stopping is optimistic: once the controller decides to unload, the
//! caller is completed and the unload finishes in the background.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use garage_core::NodeId;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::config::BackendConfig;
use crate::error::{ControlError, Result};
use crate::interior::{Interior, InteriorRegistry, Monitor, MonitorEvent};
use crate::lifecycle::{Action, Container, ContainerEvent, LifecycleState};
use crate::types::{ActionOptions, NodeStatus};

/// What to do when the container enters an expected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Keep waiting.
    Wait,
    /// Complete the pending request successfully.
    Complete,
    /// Continue the start sequence with `start`.
    Start,
    /// Continue the stop sequence with `stop`.
    Stop,
    /// Complete, then unload in the background.
    Unload,
}

type Expectations = &'static [(LifecycleState, Step)];

const NOTHING: Expectations = &[];
const START_FROM_OFFLINE: Expectations = &[
    (LifecycleState::Loading, Step::Wait),
    (LifecycleState::Stopped, Step::Start),
    (LifecycleState::Running, Step::Complete),
];
const START_FROM_STOPPED: Expectations = &[
    (LifecycleState::Starting, Step::Wait),
    (LifecycleState::Running, Step::Complete),
];
const STOP_FROM_STARTING: Expectations = &[
    (LifecycleState::Running, Step::Stop),
    (LifecycleState::Stopping, Step::Wait),
    (LifecycleState::Stopped, Step::Unload),
];
const STOP_FROM_RUNNING: Expectations = &[
    (LifecycleState::Stopping, Step::Wait),
    (LifecycleState::Stopped, Step::Unload),
];

type Reply = oneshot::Sender<Result<()>>;

enum Command {
    Start { opts: ActionOptions, reply: Reply },
    Stop { opts: ActionOptions, reply: Reply },
}

/// Point-in-time view of a controller, readable without messaging it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Last status reported by the interior.
    pub status: Option<Value>,
    /// Whether a request is waiting for completion.
    pub pending: bool,
}

/// Handle to a running controller.
///
/// Cloning shares the controller. The task exits once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    node: NodeId,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: Arc<RwLock<Snapshot>>,
    // Commands sent but not yet handled by the task.
    in_flight: Arc<AtomicUsize>,
}

/// An interior created for a node whose controller has not been spawned.
///
/// Dropping it discards the interior without invoking it.
pub struct Prepared {
    node: NodeId,
    interior: Box<dyn Interior>,
    reports: mpsc::UnboundedReceiver<MonitorEvent>,
}

impl std::fmt::Debug for Prepared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prepared").field("node", &self.node).finish_non_exhaustive()
    }
}

impl ControllerHandle {
    /// Create the interior for `node` and spawn its controller.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the interior cannot be created.
    pub fn spawn(node: NodeId, registry: &InteriorRegistry, config: &BackendConfig) -> Result<Self> {
        Ok(Self::launch(Self::prepare(node, registry, config)?))
    }

    /// Create the interior for `node` without spawning anything.
    ///
    /// Backends may touch the filesystem here, so callers keep this outside
    /// any lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the interior cannot be created.
    pub fn prepare(
        node: NodeId,
        registry: &InteriorRegistry,
        config: &BackendConfig,
    ) -> Result<Prepared> {
        let (monitor, reports) = Monitor::channel();
        let interior = registry.create(&node, config, monitor)?;
        tracing::debug!(node = %node, interior = %config.interior, "Interior created");
        Ok(Prepared {
            node,
            interior,
            reports,
        })
    }

    /// Spawn the controller task for a prepared interior.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(prepared: Prepared) -> Self {
        let Prepared {
            node,
            interior,
            reports,
        } = prepared;
        let container = Container::new(node.clone(), interior);

        let snapshot = Arc::new(RwLock::new(Snapshot {
            state: container.state(),
            status: None,
            pending: false,
        }));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let (commands, rx) = mpsc::unbounded_channel();

        let controller = Controller {
            container,
            callback: None,
            expects: NOTHING,
            opts: ActionOptions::default(),
            snapshot: Arc::clone(&snapshot),
            in_flight: Arc::clone(&in_flight),
        };
        tokio::spawn(controller.run(rx, reports));

        tracing::debug!(node = %node, "Controller spawned");
        Self {
            node,
            commands,
            snapshot,
            in_flight,
        }
    }

    /// Node this controller drives.
    #[must_use]
    pub const fn node(&self) -> &NodeId {
        &self.node
    }

    /// Bring the node to `running`.
    pub fn start(&self, opts: ActionOptions) -> Pending {
        self.request(|reply| Command::Start { opts, reply })
    }

    /// Bring the node down and unload it.
    pub fn stop(&self, opts: ActionOptions) -> Pending {
        self.request(|reply| Command::Stop { opts, reply })
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Current state and status in API form.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        let snapshot = self.snapshot.read();
        NodeStatus {
            state: snapshot.state.into(),
            status: snapshot.status.clone(),
        }
    }

    /// Returns true if the node is fully torn down, nothing is pending and
    /// no request is queued.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return false;
        }
        let snapshot = self.snapshot.read();
        snapshot.state.is_offline() && !snapshot.pending
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Pending {
        let (reply, rx) = oneshot::channel();
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.commands.send(command(reply)).is_err() {
            // The reply is dropped with the command; the caller sees an internal error.
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        Pending {
            node: self.node.clone(),
            rx,
        }
    }
}

/// Completion of a start or stop request.
#[derive(Debug)]
#[must_use = "a request is only observed by awaiting its completion"]
pub struct Pending {
    node: NodeId,
    rx: oneshot::Receiver<Result<()>>,
}

impl Future for Pending {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.rx).poll(cx);
        polled.map(|received| {
            received.unwrap_or_else(|_| {
                Err(ControlError::Internal(format!(
                    "controller for node {} exited",
                    self.node
                )))
            })
        })
    }
}

struct Controller {
    container: Container,
    callback: Option<Reply>,
    expects: Expectations,
    opts: ActionOptions,
    snapshot: Arc<RwLock<Snapshot>>,
    in_flight: Arc<AtomicUsize>,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<MonitorEvent>,
    ) {
        loop {
            let handled_command = tokio::select! {
                biased;

                Some(event) = reports.recv() => {
                    self.container.report(event);
                    false
                }
                command = commands.recv() => match command {
                    Some(Command::Start { opts, reply }) => {
                        self.start(opts, reply);
                        true
                    }
                    Some(Command::Stop { opts, reply }) => {
                        self.stop(opts, reply);
                        true
                    }
                    None => break,
                },
            };
            self.pump();
            self.publish();
            if handled_command {
                // Released only after the snapshot shows the request as pending.
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
        }
        tracing::debug!(node = %self.container.id(), state = %self.container.state(), "Controller retired");
    }

    fn start(&mut self, opts: ActionOptions, reply: Reply) {
        let state = self.container.state();
        tracing::info!(node = %self.container.id(), %state, "Start requested");
        self.set_callback(reply, opts);

        match state {
            LifecycleState::Offline => {
                self.expects = START_FROM_OFFLINE;
                self.act(Action::Load);
            }
            LifecycleState::Stopped => self.begin_start(),
            LifecycleState::Running => self.complete(Ok(())),
            // Already in flight; the table may have been cleared by a failed request.
            LifecycleState::Loading => self.expects = START_FROM_OFFLINE,
            LifecycleState::Starting => self.expects = START_FROM_STOPPED,
            LifecycleState::Unloading | LifecycleState::Stopping => {
                let node = self.container.id().clone();
                self.complete(Err(ControlError::InvalidState { node, state }));
            }
        }
    }

    fn stop(&mut self, opts: ActionOptions, reply: Reply) {
        let state = self.container.state();
        tracing::info!(node = %self.container.id(), %state, "Stop requested");
        self.set_callback(reply, opts);

        match state {
            LifecycleState::Offline | LifecycleState::Unloading => self.complete(Ok(())),
            LifecycleState::Stopped => self.unload(),
            LifecycleState::Stopping => self.expects = STOP_FROM_RUNNING,
            LifecycleState::Running => self.begin_stop(),
            LifecycleState::Starting => {
                self.expects = STOP_FROM_STARTING;
                self.act(Action::Stop);
            }
            LifecycleState::Loading => {
                self.act(Action::Unload);
                self.complete(Ok(()));
            }
        }
    }

    fn begin_start(&mut self) {
        self.expects = START_FROM_STOPPED;
        self.act(Action::Start);
    }

    fn begin_stop(&mut self) {
        self.expects = STOP_FROM_RUNNING;
        self.act(Action::Stop);
    }

    fn unload(&mut self) {
        self.complete(Ok(()));
        self.act(Action::Unload);
    }

    fn act(&mut self, action: Action) {
        let opts = self.opts;
        if let Err(e) = self.container.perform(action, &opts) {
            if self.callback.is_some() {
                self.complete(Err(e));
            } else {
                tracing::warn!(node = %self.container.id(), error = %e, "Action rejected");
            }
        }
    }

    /// Handle container notifications until none are left.
    fn pump(&mut self) {
        loop {
            let events = self.container.take_events();
            if events.is_empty() {
                return;
            }
            for event in events {
                self.on_event(event);
            }
        }
    }

    fn on_event(&mut self, event: ContainerEvent) {
        let node = self.container.id().clone();
        match event {
            ContainerEvent::State { from, to } => {
                let step = self
                    .expects
                    .iter()
                    .find(|(state, _)| *state == to)
                    .map(|(_, step)| *step);
                match step {
                    Some(step) => {
                        tracing::debug!(node = %node, %from, %to, ?step, "Expected state");
                        self.advance(step);
                    }
                    None => {
                        tracing::debug!(node = %node, %from, %to, "Unexpected state");
                        self.complete(Err(ControlError::InvalidState { node, state: to }));
                    }
                }
            }
            ContainerEvent::Status(_) => {
                tracing::trace!(node = %node, "Status reported");
            }
            ContainerEvent::Error(message) => {
                tracing::error!(node = %node, error = %message, "Interior error");
                self.complete(Err(ControlError::Interior { node, message }));
            }
        }
    }

    fn advance(&mut self, step: Step) {
        match step {
            Step::Wait => {}
            Step::Complete => self.complete(Ok(())),
            Step::Start => self.begin_start(),
            Step::Stop => self.begin_stop(),
            Step::Unload => self.unload(),
        }
    }

    fn set_callback(&mut self, reply: Reply, opts: ActionOptions) {
        if let Some(old) = self.callback.replace(reply) {
            let node = self.container.id().clone();
            tracing::warn!(node = %node, "Pending request superseded");
            let _ = old.send(Err(ControlError::Overrun(node)));
        }
        self.opts = opts;
    }

    fn complete(&mut self, result: Result<()>) {
        self.expects = NOTHING;
        if let Some(reply) = self.callback.take() {
            // The caller may have stopped waiting.
            let _ = reply.send(result);
        }
    }

    fn publish(&self) {
        let mut snapshot = self.snapshot.write();
        snapshot.state = self.container.state();
        snapshot.status = self.container.recent_status().cloned();
        snapshot.pending = self.callback.is_some();
    }
}
