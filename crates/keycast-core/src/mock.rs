//! Scriptable in-process backend for tests.
//!
//! Counts commands and subscription releases, can be told to fail or delay
//! commands, and can replay payloads to handlers that were already released
//! to simulate callbacks still in flight after teardown.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::backend::{topics, BoxFuture, CaptureBackend, Handler};
use crate::bus::EventBus;
use crate::error::{KeycastError, KeycastResult};
use crate::event::InputEvent;
use crate::registry::Subscription;

#[derive(Debug, Default)]
struct Script {
    begin_failure: Option<String>,
    end_failure: Option<String>,
    begin_delay: Option<Duration>,
    end_delay: Option<Duration>,
    listen_failures: HashSet<String>,
}

/// A mock capture backend.
#[derive(Default)]
pub struct MockBackend {
    bus: Arc<EventBus>,
    capturing: AtomicBool,
    begin_calls: AtomicUsize,
    end_calls: AtomicUsize,
    labels: Mutex<Vec<Option<String>>>,
    released: Arc<Mutex<HashMap<String, usize>>>,
    history: Mutex<Vec<(String, Handler)>>,
    script: Mutex<Script>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_begin_failure(self, message: impl Into<String>) -> Self {
        self.fail_begin(Some(message.into()));
        self
    }

    pub fn with_end_failure(self, message: impl Into<String>) -> Self {
        self.fail_end(Some(message.into()));
        self
    }

    pub fn with_begin_delay(self, delay: Duration) -> Self {
        lock(&self.script).begin_delay = Some(delay);
        self
    }

    pub fn with_end_delay(self, delay: Duration) -> Self {
        lock(&self.script).end_delay = Some(delay);
        self
    }

    pub fn with_listen_failure(self, topic: &str) -> Self {
        lock(&self.script).listen_failures.insert(topic.to_string());
        self
    }

    /// Change the scripted `begin_capture` failure mid-test.
    pub fn fail_begin(&self, message: Option<String>) {
        lock(&self.script).begin_failure = message;
    }

    /// Change the scripted `end_capture` failure mid-test.
    pub fn fail_end(&self, message: Option<String>) {
        lock(&self.script).end_failure = message;
    }

    /// Publish a payload to the live subscribers of `topic`.
    pub fn emit(&self, topic: &str, payload: &serde_json::Value) -> usize {
        self.bus.emit(topic, payload)
    }

    /// Publish an input event on the `input-event` topic.
    pub fn emit_event(&self, event: &InputEvent) -> usize {
        self.bus.emit(topics::INPUT_EVENT, &event.to_payload())
    }

    /// Invoke every handler ever registered for `topic`, released or not.
    pub fn deliver_to_all(&self, topic: &str, payload: &serde_json::Value) -> usize {
        let handlers: Vec<Handler> = lock(&self.history)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn labels(&self) -> Vec<Option<String>> {
        lock(&self.labels).clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Number of released subscriptions on `topic`.
    pub fn released(&self, topic: &str) -> usize {
        lock(&self.released).get(topic).copied().unwrap_or(0)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.bus.subscriber_count(topic)
    }
}

impl CaptureBackend for MockBackend {
    fn begin_capture<'a>(&'a self, label: Option<&'a str>) -> BoxFuture<'a, KeycastResult<()>> {
        Box::pin(async move {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.labels).push(label.map(str::to_string));
            let (delay, failure) = {
                let script = lock(&self.script);
                (script.begin_delay, script.begin_failure.clone())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = failure {
                return Err(KeycastError::BackendCommandFailed(message));
            }
            self.capturing.store(true, Ordering::SeqCst);
            debug!(?label, "mock capture started");
            Ok(())
        })
    }

    fn end_capture(&self) -> BoxFuture<'_, KeycastResult<()>> {
        Box::pin(async move {
            self.end_calls.fetch_add(1, Ordering::SeqCst);
            let (delay, failure) = {
                let script = lock(&self.script);
                (script.end_delay, script.end_failure.clone())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.capturing.store(false, Ordering::SeqCst);
            if let Some(message) = failure {
                return Err(KeycastError::BackendCommandFailed(message));
            }
            debug!("mock capture ended");
            Ok(())
        })
    }

    fn listen(&self, topic: &str, handler: Handler) -> KeycastResult<Subscription> {
        if lock(&self.script).listen_failures.contains(topic) {
            return Err(KeycastError::SubscriptionFailed(format!(
                "mock refused subscription to {topic}"
            )));
        }
        lock(&self.history).push((topic.to_string(), handler.clone()));
        let inner = self.bus.listen(topic, handler);
        let released = self.released.clone();
        let topic = topic.to_string();
        Ok(Subscription::new(move || {
            inner.release();
            *lock(&released).entry(topic).or_default() += 1;
        }))
    }
}
