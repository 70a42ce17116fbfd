//! Terminal capture backend.
//!
//! A blocking crossterm reader turns terminal key and mouse events into
//! `input-event` payloads while capture is on, and turns the control
//! hotkeys into start/stop requests on the backend bus. Quit and resize go
//! straight to the UI loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use keycast_core::{
    now_millis, topics, BoxFuture, CaptureBackend, EventBus, Handler, InputEvent, KeycastError,
    KeycastResult, Position, Subscription,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::Hotkeys;
use crate::keys::{is_interrupt, key_label, modifier_labels};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Requests for the UI loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Quit,
    Resize(u16, u16),
}

/// Capture backend fed by the terminal's input stream.
#[derive(Default)]
pub struct TerminalBackend {
    bus: Arc<EventBus>,
    capturing: Arc<AtomicBool>,
}

impl TerminalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a control request (e.g. from a signal) on `topic`.
    pub fn request(&self, topic: &str) -> usize {
        self.bus.emit(topic, &serde_json::Value::Null)
    }

    /// Start reading terminal events on a blocking thread.
    pub fn spawn_reader(
        &self,
        hotkeys: Hotkeys,
        mouse: bool,
        ui: mpsc::Sender<UiEvent>,
    ) -> InputReader {
        let router = Router {
            bus: self.bus.clone(),
            capturing: self.capturing.clone(),
            hotkeys,
            mouse,
            ui,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = tokio::task::spawn_blocking(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("terminal poll error: {e}");
                        break;
                    }
                }
                match event::read() {
                    Ok(ev) => router.route(&ev),
                    Err(e) => {
                        warn!("terminal read error: {e}");
                        break;
                    }
                }
            }
            debug!("terminal reader exited");
        });
        InputReader { stop, handle }
    }
}

impl CaptureBackend for TerminalBackend {
    fn begin_capture<'a>(&'a self, label: Option<&'a str>) -> BoxFuture<'a, KeycastResult<()>> {
        Box::pin(async move {
            if self.capturing.swap(true, Ordering::SeqCst) {
                return Err(KeycastError::BackendCommandFailed(
                    "terminal capture is already running".into(),
                ));
            }
            info!(?label, "terminal capture started");
            Ok(())
        })
    }

    fn end_capture(&self) -> BoxFuture<'_, KeycastResult<()>> {
        Box::pin(async move {
            if !self.capturing.swap(false, Ordering::SeqCst) {
                return Err(KeycastError::BackendCommandFailed(
                    "terminal capture is not running".into(),
                ));
            }
            info!("terminal capture stopped");
            Ok(())
        })
    }

    fn listen(&self, topic: &str, handler: Handler) -> KeycastResult<Subscription> {
        Ok(self.bus.listen(topic, handler))
    }
}

/// Handle to the blocking reader thread.
pub struct InputReader {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl InputReader {
    /// Ask the reader to exit and wait for it (at most one poll interval).
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.handle.await {
            warn!("terminal reader task failed: {e}");
        }
    }
}

struct Router {
    bus: Arc<EventBus>,
    capturing: Arc<AtomicBool>,
    hotkeys: Hotkeys,
    mouse: bool,
    ui: mpsc::Sender<UiEvent>,
}

enum Control {
    Quit,
    Start,
    Stop,
}

impl Router {
    fn route(&self, ev: &Event) {
        match ev {
            Event::Key(key) if self.handle_control(key) => return,
            Event::Resize(cols, rows) => {
                self.send_ui(UiEvent::Resize(*cols, *rows));
                return;
            }
            _ => {}
        }

        if !self.capturing.load(Ordering::SeqCst) {
            return;
        }
        if let Some(input) = translate(ev, self.mouse, now_millis()) {
            trace!(kind = input.kind.as_str(), "input event");
            self.bus.emit(topics::INPUT_EVENT, &input.to_payload());
        }
    }

    /// Act on a control chord. Returns `false` for ordinary keys.
    fn handle_control(&self, key: &KeyEvent) -> bool {
        let mut chord = *key;
        chord.kind = KeyEventKind::Press;
        let control = if is_interrupt(&chord) || self.hotkeys.quit.matches(&chord) {
            Control::Quit
        } else if self.hotkeys.start.matches(&chord) {
            Control::Start
        } else if self.hotkeys.stop.matches(&chord) {
            Control::Stop
        } else {
            return false;
        };
        // Releases of control chords are swallowed along with the presses.
        if key.kind == KeyEventKind::Release {
            return true;
        }
        match control {
            Control::Quit => self.send_ui(UiEvent::Quit),
            Control::Start => {
                debug!("start hotkey");
                self.bus.emit(topics::CAPTURE_START_REQUESTED, &serde_json::Value::Null);
            }
            Control::Stop => {
                debug!("stop hotkey");
                self.bus.emit(topics::CAPTURE_STOP_REQUESTED, &serde_json::Value::Null);
            }
        }
        true
    }

    fn send_ui(&self, event: UiEvent) {
        if let Err(e) = self.ui.try_send(event) {
            debug!("ui channel unavailable: {e}");
        }
    }
}

/// Convert a terminal event into an input event, if it is one the overlay shows.
pub fn translate(ev: &Event, mouse: bool, timestamp: u64) -> Option<InputEvent> {
    match ev {
        Event::Key(key) => {
            let label = key_label(&key.code)?;
            let modifiers = modifier_labels(key.modifiers);
            Some(match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    InputEvent::key_press(label, modifiers, timestamp)
                }
                KeyEventKind::Release => InputEvent::key_release(label, modifiers, timestamp),
            })
        }
        Event::Mouse(m) if mouse => {
            let x = f64::from(m.column);
            let y = f64::from(m.row);
            let event = match m.kind {
                MouseEventKind::Down(button) => {
                    InputEvent::mouse_press(button_name(button), Some(Position { x, y }), timestamp)
                }
                MouseEventKind::Up(button) => InputEvent::mouse_release(
                    button_name(button),
                    Some(Position { x, y }),
                    timestamp,
                ),
                MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                    InputEvent::mouse_move(x, y, timestamp)
                }
                MouseEventKind::ScrollDown
                | MouseEventKind::ScrollUp
                | MouseEventKind::ScrollLeft
                | MouseEventKind::ScrollRight => InputEvent::wheel(x, y, timestamp),
            };
            Some(event.with_modifiers(modifier_labels(m.modifiers)))
        }
        _ => None,
    }
}

fn button_name(button: MouseButton) -> &'static str {
    match button {
        MouseButton::Left => "left",
        MouseButton::Right => "right",
        MouseButton::Middle => "middle",
    }
}
