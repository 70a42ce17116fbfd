//! keycast-core: session and live event-stream controller for the keycast overlay.
//!
//! A [`SessionController`] starts and stops capture sessions against a
//! [`CaptureBackend`], keeps a bounded buffer of recent input events while a
//! session is active, derives a transient visibility flag from an
//! [`ActivityTimer`], and releases every subscription exactly once however the
//! session ends. [`ExternalSignalBridge`] relays backend-originated start/stop
//! requests into the controller.

pub mod backend;
pub mod bridge;
pub mod buffer;
pub mod bus;
pub mod controller;
pub mod error;
pub mod event;
pub mod mock;
pub mod recording;
pub mod registry;
pub mod timer;

// Re-export commonly used items at crate root.
pub use backend::{topics, BoxFuture, CaptureBackend, Handler};
pub use bridge::ExternalSignalBridge;
pub use buffer::EventBuffer;
pub use bus::EventBus;
pub use controller::{
    CaptureMode, ControllerConfig, SessionController, SessionStatus, Snapshot, WeakSessionController,
};
pub use error::{KeycastError, KeycastResult};
pub use event::{now_millis, EventKind, InputEvent, Position};
pub use recording::{CapturedSession, TimelineRecorder};
pub use registry::{Subscription, SubscriptionRegistry};
pub use timer::{ActivityTimer, Countdown};
