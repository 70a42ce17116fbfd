//! Abstract capture backend.
//!
//! A backend owns the raw input capture: it honours begin/end commands and
//! pushes payloads on named topics to listeners. Both the terminal backend
//! and the test mock implement this trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::KeycastResult;
use crate::registry::Subscription;

/// Boxed `Send` future returned by backend commands.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback invoked with each payload published on a topic.
pub type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Source of input capture and backend-originated signals.
pub trait CaptureBackend: Send + Sync + 'static {
    /// Start raw input capture. `label` names the task for recording sessions.
    fn begin_capture<'a>(&'a self, label: Option<&'a str>) -> BoxFuture<'a, KeycastResult<()>>;

    /// Stop raw input capture.
    fn end_capture(&self) -> BoxFuture<'_, KeycastResult<()>>;

    /// Register `handler` for payloads on `topic`.
    ///
    /// Delivery stops once the returned subscription is released, though a
    /// callback already in flight may still complete.
    fn listen(&self, topic: &str, handler: Handler) -> KeycastResult<Subscription>;
}

/// Well-known backend topics.
pub mod topics {
    /// Payload: an `InputEvent`.
    pub const INPUT_EVENT: &str = "input-event";
    /// No payload: something outside the controller asks for a session to start.
    pub const CAPTURE_START_REQUESTED: &str = "capture-start-requested";
    /// No payload: something outside the controller asks for the session to stop.
    pub const CAPTURE_STOP_REQUESTED: &str = "capture-stop-requested";
}
