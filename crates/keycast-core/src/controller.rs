//! Capture session state machine.
//!
//! `SessionController` starts and stops capture sessions against a
//! [`CaptureBackend`], owns the per-session buffer, activity timer and
//! subscription registry, and publishes a [`Snapshot`] on every state change.
//!
//! Status flows `Idle -> Starting -> Active -> Stopping -> Idle`. Start and
//! stop requests that arrive while a transition is in flight are rejected or
//! coalesced, never queued. Event callbacks consult the current status and
//! session epoch, so deliveries that race with teardown are dropped.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::backend::{topics, CaptureBackend, Handler};
use crate::buffer::{EventBuffer, DEFAULT_CAPACITY};
use crate::error::{KeycastError, KeycastResult};
use crate::event::{now_millis, EventKind, InputEvent};
use crate::recording::{CapturedSession, TimelineRecorder};
use crate::registry::SubscriptionRegistry;
use crate::timer::{ActivityTimer, Countdown, DEFAULT_HIDE_AFTER};

/// Registry name of the per-session `input-event` subscription.
pub const EVENT_SUBSCRIPTION: &str = "input-events";

/// Default limit for a single backend command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle status of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Active => "active",
            SessionStatus::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// What the controller does with a session's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Live overlay: keep the last few qualifying events for display.
    Overlay,
    /// Overlay plus a full timeline of every event, labelled with a task name.
    Recording,
}

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub mode: CaptureMode,
    /// Number of events kept for display.
    pub capacity: usize,
    /// Inactivity period after which the overlay hides.
    pub hide_after: Duration,
    /// Limit for each backend command; `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// Event kind that is buffered and restarts the activity timer.
    pub qualifying_kind: EventKind,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Overlay,
            capacity: DEFAULT_CAPACITY,
            hide_after: DEFAULT_HIDE_AFTER,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            qualifying_kind: EventKind::KeyPress,
        }
    }
}

impl ControllerConfig {
    /// Defaults for the recording variant.
    pub fn recording() -> Self {
        Self {
            mode: CaptureMode::Recording,
            ..Self::default()
        }
    }
}

/// Point-in-time view of the controller for presenters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub status: SessionStatus,
    pub label: Option<String>,
    /// Buffered qualifying events, oldest first.
    pub events: Vec<InputEvent>,
    pub visible: bool,
    /// Events accumulated by the active recording (0 in overlay mode).
    pub recorded: usize,
}

impl Snapshot {
    fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            label: None,
            events: Vec::new(),
            visible: false,
            recorded: 0,
        }
    }
}

struct SessionState {
    status: SessionStatus,
    /// Incremented on every start; callbacks carry the epoch they were made for.
    epoch: u64,
    label: Option<String>,
    buffer: EventBuffer,
    timer: ActivityTimer,
    subscriptions: SubscriptionRegistry,
    recorder: Option<TimelineRecorder>,
    last_recording: Option<CapturedSession>,
    last_timestamp: Option<u64>,
}

impl SessionState {
    fn new(config: &ControllerConfig, runtime: &Handle) -> Self {
        Self {
            status: SessionStatus::Idle,
            epoch: 0,
            label: None,
            buffer: EventBuffer::new(config.capacity),
            timer: ActivityTimer::new(config.hide_after, runtime.clone()),
            subscriptions: SubscriptionRegistry::new(),
            recorder: None,
            last_recording: None,
            last_timestamp: None,
        }
    }

    /// Replace per-session resources with fresh ones.
    fn reset(&mut self, config: &ControllerConfig, runtime: &Handle) {
        self.buffer = EventBuffer::new(config.capacity);
        self.timer = ActivityTimer::new(config.hide_after, runtime.clone());
        self.subscriptions = SubscriptionRegistry::new();
        self.recorder = None;
        self.last_timestamp = None;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            label: self.label.clone(),
            events: self.buffer.snapshot(),
            visible: self.timer.is_active(),
            recorded: self.recorder.as_ref().map_or(0, TimelineRecorder::len),
        }
    }
}

struct Inner {
    config: ControllerConfig,
    backend: Arc<dyn CaptureBackend>,
    runtime: Handle,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Snapshot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.status != SessionStatus::Idle {
            warn!(
                session = state.epoch,
                status = %state.status,
                "controller dropped mid-session, releasing local resources"
            );
        }
    }
}

/// Cheaply cloneable handle to one capture session controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create an idle controller.
    ///
    /// Must be called from within a Tokio runtime; timer countdowns are
    /// spawned on it.
    pub fn new(backend: Arc<dyn CaptureBackend>, config: ControllerConfig) -> Self {
        let runtime = Handle::current();
        let state = SessionState::new(&config, &runtime);
        let (snapshots, _) = watch::channel(Snapshot::idle());
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                runtime,
                state: Mutex::new(state),
                snapshots,
            }),
        }
    }

    /// A handle that does not keep the controller alive.
    pub fn downgrade(&self) -> WeakSessionController {
        WeakSessionController {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshots.send_replace(state.snapshot());
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> CaptureMode {
        self.inner.config.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Current snapshot (pull).
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Receiver updated on every state change (push).
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshots.subscribe()
    }

    /// The recording finalized by the most recent stop, if any.
    pub fn last_recording(&self) -> Option<CapturedSession> {
        self.lock().last_recording.clone()
    }

    /// Begin a capture session.
    ///
    /// Recording sessions require a non-blank `label`. Fails with
    /// `InvalidState` unless the controller is idle.
    pub async fn start(&self, label: Option<&str>) -> KeycastResult<()> {
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        let mode = self.inner.config.mode;
        if mode == CaptureMode::Recording && label.is_none() {
            return Err(KeycastError::InvalidArgument(
                "recording sessions need a non-empty task name".into(),
            ));
        }

        let epoch = {
            let mut state = self.lock();
            if state.status != SessionStatus::Idle {
                return Err(KeycastError::InvalidState(format!(
                    "cannot start a session while {}",
                    state.status
                )));
            }
            state.reset(&self.inner.config, &self.inner.runtime);
            state.epoch += 1;
            state.status = SessionStatus::Starting;
            state.label = label.clone();
            self.publish(&state);
            state.epoch
        };
        debug!(session = epoch, label = ?label, "beginning capture");
        let guard = TransitionGuard::new(self, epoch, SessionStatus::Starting);

        let backend = self.inner.backend.clone();
        if let Err(e) = self
            .run_command("begin_capture", backend.begin_capture(label.as_deref()))
            .await
        {
            warn!(session = epoch, error = %e, "begin_capture failed, staying idle");
            self.return_to_idle();
            guard.disarm();
            return Err(e);
        }

        let subscription = match backend.listen(topics::INPUT_EVENT, self.event_handler(epoch)) {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(session = epoch, error = %e, "event subscription failed, ending capture");
                if let Err(end_err) = self.run_command("end_capture", backend.end_capture()).await {
                    warn!(session = epoch, error = %end_err, "end_capture after failed subscription");
                }
                self.return_to_idle();
                guard.disarm();
                return Err(match e {
                    KeycastError::SubscriptionFailed(_) => e,
                    other => KeycastError::SubscriptionFailed(other.to_string()),
                });
            }
        };

        let mut state = self.lock();
        state.subscriptions.register(EVENT_SUBSCRIPTION, subscription);
        if mode == CaptureMode::Recording {
            let task = label.clone().unwrap_or_default();
            state.recorder = Some(TimelineRecorder::new(task, now_millis()));
        }
        state.status = SessionStatus::Active;
        self.publish(&state);
        guard.disarm();
        info!(session = epoch, label = ?label, ?mode, "capture session active");
        Ok(())
    }

    /// End the active session.
    ///
    /// A no-op when idle or already stopping. Subscriptions, timer and buffer
    /// are torn down before the backend is asked to end capture, and the
    /// controller returns to idle whatever the backend answers. Returns the
    /// finalized recording in recording mode.
    pub async fn stop(&self) -> KeycastResult<Option<CapturedSession>> {
        let (epoch, mut subscriptions, recording) = {
            let mut state = self.lock();
            match state.status {
                SessionStatus::Idle | SessionStatus::Stopping => {
                    debug!(status = %state.status, "stop ignored, no active session");
                    return Ok(None);
                }
                SessionStatus::Starting => {
                    return Err(KeycastError::InvalidState(
                        "cannot stop a session that is still starting".into(),
                    ));
                }
                SessionStatus::Active => {}
            }
            state.status = SessionStatus::Stopping;
            state.timer.cancel();
            state.buffer.clear();
            let subscriptions = std::mem::take(&mut state.subscriptions);
            let recording = state.recorder.take().map(|r| r.finish(now_millis()));
            if recording.is_some() {
                state.last_recording = recording.clone();
            }
            self.publish(&state);
            (state.epoch, subscriptions, recording)
        };

        let released = subscriptions.release_all();
        debug!(session = epoch, released, "session subscriptions released");

        let guard = TransitionGuard::new(self, epoch, SessionStatus::Stopping);
        let backend = self.inner.backend.clone();
        let result = self.run_command("end_capture", backend.end_capture()).await;
        self.return_to_idle();
        guard.disarm();

        match result {
            Ok(()) => {
                info!(
                    session = epoch,
                    recorded = recording.as_ref().map(CapturedSession::len),
                    "capture session stopped"
                );
                Ok(recording)
            }
            Err(e) => {
                warn!(session = epoch, error = %e, "end_capture failed after local teardown");
                Err(e)
            }
        }
    }

    /// Stop requested by the backend itself (tray menu, signal, hotkey).
    pub async fn on_backend_stop_signal(&self) -> KeycastResult<Option<CapturedSession>> {
        info!("backend requested stop");
        self.stop().await
    }

    /// Stop any active session before the application exits.
    ///
    /// A session that is still starting is given up to `command_timeout` to
    /// settle before it is stopped.
    pub async fn shutdown(&self) -> KeycastResult<Option<CapturedSession>> {
        if self.status() == SessionStatus::Starting {
            info!("shutdown waiting for a starting session to settle");
            let mut snapshots = self.subscribe();
            let settle = snapshots.wait_for(|s| s.status != SessionStatus::Starting);
            let settled = match self.inner.config.command_timeout {
                Some(limit) => tokio::time::timeout(limit, settle)
                    .await
                    .is_ok_and(|r| r.is_ok()),
                None => settle.await.is_ok(),
            };
            if !settled {
                warn!("shutdown while a session is still starting");
            }
        }
        self.stop().await
    }

    async fn run_command<F>(&self, command: &'static str, fut: F) -> KeycastResult<()>
    where
        F: Future<Output = KeycastResult<()>>,
    {
        let result = match self.inner.config.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(KeycastError::BackendCommandFailed(format!(
                    "{command} timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        };
        result.map_err(|e| match e {
            KeycastError::BackendCommandFailed(_) => e,
            other => KeycastError::BackendCommandFailed(format!("{command}: {other}")),
        })
    }

    fn return_to_idle(&self) {
        let mut state = self.lock();
        state.status = SessionStatus::Idle;
        state.label = None;
        self.publish(&state);
    }

    fn event_handler(&self, epoch: u64) -> Handler {
        let controller = self.downgrade();
        Arc::new(move |payload: &serde_json::Value| {
            if let Some(controller) = controller.upgrade() {
                controller.on_event(epoch, payload);
            }
        })
    }

    /// Handle one `input-event` payload for session `epoch`.
    pub(crate) fn on_event(&self, epoch: u64, payload: &serde_json::Value) {
        let event = match InputEvent::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(session = epoch, error = %e, "dropping malformed input event");
                return;
            }
        };

        let mut state = self.lock();
        if state.status != SessionStatus::Active || state.epoch != epoch {
            trace!(session = epoch, status = %state.status, "ignoring event outside the active session");
            return;
        }
        if state.last_timestamp.is_some_and(|last| event.timestamp < last) {
            debug!(session = epoch, timestamp = event.timestamp, "event timestamp went backwards");
        }
        state.last_timestamp = Some(event.timestamp);

        let qualifies = event.kind == self.inner.config.qualifying_kind;
        let recorded = match state.recorder.as_mut() {
            Some(recorder) => {
                recorder.record(event.clone());
                true
            }
            None => false,
        };

        if qualifies {
            state.buffer.push(event);
            let controller = self.downgrade();
            state.timer.mark_active(move |ticket| {
                if let Some(controller) = controller.upgrade() {
                    controller.on_timer_expired(ticket);
                }
            });
        }
        if qualifies || recorded {
            self.publish(&state);
        }
    }

    fn on_timer_expired(&self, ticket: Countdown) {
        let mut state = self.lock();
        if state.timer.expire(ticket) {
            debug!(session = state.epoch, "overlay hidden after inactivity");
            self.publish(&state);
        }
    }
}

/// Non-owning counterpart of [`SessionController`].
#[derive(Clone)]
pub struct WeakSessionController {
    inner: Weak<Inner>,
}

impl WeakSessionController {
    pub fn upgrade(&self) -> Option<SessionController> {
        self.inner.upgrade().map(|inner| SessionController { inner })
    }
}

/// Returns the controller to idle when a `start` or `stop` future is
/// dropped before its backend command completes.
struct TransitionGuard<'a> {
    controller: &'a SessionController,
    epoch: u64,
    during: SessionStatus,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(controller: &'a SessionController, epoch: u64, during: SessionStatus) -> Self {
        Self {
            controller,
            epoch,
            during,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.controller.lock();
        if state.epoch != self.epoch || state.status != self.during {
            return;
        }
        match self.during {
            SessionStatus::Starting => warn!(
                session = self.epoch,
                "start abandoned mid-command, backend capture may have begun"
            ),
            _ => warn!(session = self.epoch, "stop abandoned mid-command"),
        }
        state.status = SessionStatus::Idle;
        state.label = None;
        self.controller.publish(&state);
    }
}
