//! Relays backend-originated start/stop requests into a controller.
//!
//! The bridge lives for the whole application, independent of any one
//! session. Overlay controllers listen for both requests; recording
//! controllers only for stop, since a recording needs a task name the
//! backend cannot supply.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::backend::{topics, CaptureBackend, Handler};
use crate::controller::{CaptureMode, SessionController};
use crate::error::{KeycastError, KeycastResult};
use crate::registry::SubscriptionRegistry;

pub struct ExternalSignalBridge {
    subscriptions: Mutex<SubscriptionRegistry>,
}

impl ExternalSignalBridge {
    /// Subscribe to the backend's request topics on behalf of `controller`.
    ///
    /// Must be called from within a Tokio runtime. If any subscription
    /// fails, those already made are released before the error is returned.
    pub fn attach(
        controller: &SessionController,
        backend: &dyn CaptureBackend,
    ) -> KeycastResult<Self> {
        let runtime = Handle::current();
        let mut subscriptions = SubscriptionRegistry::new();

        if controller.mode() == CaptureMode::Overlay {
            let start = backend
                .listen(topics::CAPTURE_START_REQUESTED, start_handler(controller, &runtime))
                .map_err(subscription_error)?;
            subscriptions.register(topics::CAPTURE_START_REQUESTED, start);
        }

        // On error `subscriptions` drops here and releases the start handle.
        let stop = backend
            .listen(topics::CAPTURE_STOP_REQUESTED, stop_handler(controller, &runtime))
            .map_err(subscription_error)?;
        subscriptions.register(topics::CAPTURE_STOP_REQUESTED, stop);

        debug!(
            mode = ?controller.mode(),
            topics = subscriptions.len(),
            "external signal bridge attached"
        );
        Ok(Self {
            subscriptions: Mutex::new(subscriptions),
        })
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release the bridge's subscriptions. Safe to call more than once.
    pub fn shutdown(&self) -> usize {
        let released = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release_all();
        if released > 0 {
            debug!(released, "external signal bridge detached");
        }
        released
    }
}

impl Drop for ExternalSignalBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn subscription_error(e: KeycastError) -> KeycastError {
    match e {
        KeycastError::SubscriptionFailed(_) => e,
        other => KeycastError::SubscriptionFailed(other.to_string()),
    }
}

fn start_handler(controller: &SessionController, runtime: &Handle) -> Handler {
    let controller = controller.downgrade();
    let runtime = runtime.clone();
    Arc::new(move |_: &serde_json::Value| {
        let Some(controller) = controller.upgrade() else {
            return;
        };
        runtime.spawn(async move {
            info!("backend requested start");
            match controller.start(None).await {
                Ok(()) => {}
                Err(KeycastError::InvalidState(reason)) => debug!(%reason, "start request ignored"),
                Err(e) => warn!(error = %e, "start request failed"),
            }
        });
    })
}

fn stop_handler(controller: &SessionController, runtime: &Handle) -> Handler {
    let controller = controller.downgrade();
    let runtime = runtime.clone();
    Arc::new(move |_: &serde_json::Value| {
        let Some(controller) = controller.upgrade() else {
            return;
        };
        runtime.spawn(async move {
            match controller.on_backend_stop_signal().await {
                Ok(_) => {}
                Err(KeycastError::InvalidState(reason)) => debug!(%reason, "stop request ignored"),
                Err(e) => warn!(error = %e, "stop request failed"),
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, SessionStatus};
    use crate::event::InputEvent;
    use crate::mock::MockBackend;
    use serde_json::json;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn start_and_stop_requests_drive_overlay() {
        let backend = Arc::new(MockBackend::new());
        let controller = SessionController::new(backend.clone(), ControllerConfig::default());
        let bridge = ExternalSignalBridge::attach(&controller, backend.as_ref()).unwrap();
        assert_eq!(bridge.len(), 2);

        backend.emit(topics::CAPTURE_START_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(controller.status(), SessionStatus::Active);
        assert_eq!(backend.labels(), vec![None]);

        backend.emit_event(&InputEvent::key_press("a", vec![], 1));
        assert_eq!(controller.snapshot().events.len(), 1);

        backend.emit(topics::CAPTURE_STOP_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert_eq!(backend.end_calls(), 1);
        assert_eq!(backend.released(topics::INPUT_EVENT), 1);
    }

    #[tokio::test]
    async fn repeated_requests_are_coalesced() {
        let backend = Arc::new(MockBackend::new());
        let controller = SessionController::new(backend.clone(), ControllerConfig::default());
        let _bridge = ExternalSignalBridge::attach(&controller, backend.as_ref()).unwrap();

        backend.emit(topics::CAPTURE_START_REQUESTED, &json!(null));
        backend.emit(topics::CAPTURE_START_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(backend.begin_calls(), 1);

        backend.emit(topics::CAPTURE_STOP_REQUESTED, &json!(null));
        backend.emit(topics::CAPTURE_STOP_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(backend.end_calls(), 1);
    }

    #[tokio::test]
    async fn recording_bridge_ignores_start_requests() {
        let backend = Arc::new(MockBackend::new());
        let controller = SessionController::new(backend.clone(), ControllerConfig::recording());
        let bridge = ExternalSignalBridge::attach(&controller, backend.as_ref()).unwrap();
        assert_eq!(bridge.len(), 1);
        assert_eq!(backend.subscriber_count(topics::CAPTURE_START_REQUESTED), 0);

        backend.emit(topics::CAPTURE_START_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(backend.begin_calls(), 0);

        controller.start(Some("write report")).await.unwrap();
        backend.emit_event(&InputEvent::key_press("x", vec![], 5));
        backend.emit(topics::CAPTURE_STOP_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert_eq!(controller.last_recording().map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn shutdown_releases_once() {
        let backend = Arc::new(MockBackend::new());
        let controller = SessionController::new(backend.clone(), ControllerConfig::default());
        let bridge = ExternalSignalBridge::attach(&controller, backend.as_ref()).unwrap();

        assert_eq!(bridge.shutdown(), 2);
        assert_eq!(bridge.shutdown(), 0);
        drop(bridge);
        assert_eq!(backend.released(topics::CAPTURE_START_REQUESTED), 1);
        assert_eq!(backend.released(topics::CAPTURE_STOP_REQUESTED), 1);

        backend.emit(topics::CAPTURE_START_REQUESTED, &json!(null));
        settle().await;
        assert_eq!(backend.begin_calls(), 0);
    }

    #[tokio::test]
    async fn failed_attach_releases_partial_subscriptions() {
        let backend =
            Arc::new(MockBackend::new().with_listen_failure(topics::CAPTURE_STOP_REQUESTED));
        let controller = SessionController::new(backend.clone(), ControllerConfig::default());

        let err = ExternalSignalBridge::attach(&controller, backend.as_ref())
            .err()
            .unwrap();
        assert!(matches!(err, KeycastError::SubscriptionFailed(_)));
        assert_eq!(backend.released(topics::CAPTURE_START_REQUESTED), 1);
        assert_eq!(backend.subscriber_count(topics::CAPTURE_START_REQUESTED), 0);
    }
}
