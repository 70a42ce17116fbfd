//! In-process topic bus.
//!
//! Backends use it to fan payloads out to listeners. Handlers are invoked
//! outside the bus lock, so a handler may unsubscribe (itself or others)
//! without deadlocking; a handler unsubscribed while an emit is underway may
//! still see that one payload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use crate::backend::Handler;
use crate::registry::Subscription;

/// Identifier returned by [`EventBus::subscribe`].
pub type SubscriptionId = u64;

#[derive(Default)]
struct BusInner {
    subscriptions: HashMap<String, Vec<(SubscriptionId, Handler)>>,
    next_sub_id: SubscriptionId,
    emitted: u64,
}

/// A simple in-process event bus.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to a topic. Returns a subscription ID for unsubscribing.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_sub_id += 1;
        let id = inner.next_sub_id;
        inner
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        trace!(topic, id, "bus subscription added");
        id
    }

    /// Unsubscribe by subscription ID. Returns true if found.
    pub fn unsubscribe(&self, sub_id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        for subs in inner.subscriptions.values_mut() {
            let before = subs.len();
            subs.retain(|(id, _)| *id != sub_id);
            if subs.len() < before {
                trace!(id = sub_id, "bus subscription removed");
                return true;
            }
        }
        false
    }

    /// Subscribe and wrap the registration in a [`Subscription`] that
    /// unsubscribes on release.
    pub fn listen(self: &Arc<Self>, topic: &str, handler: Handler) -> Subscription {
        let id = self.subscribe(topic, handler);
        let bus: Weak<EventBus> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(bus) = bus.upgrade() {
                bus.unsubscribe(id);
            }
        })
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, topic: &str, payload: &serde_json::Value) -> usize {
        let handlers: Vec<Handler> = {
            let mut inner = self.lock();
            inner.emitted += 1;
            inner
                .subscriptions
                .get(topic)
                .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Count subscriptions for a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .subscriptions
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Total number of emits, delivered or not.
    pub fn emitted(&self) -> u64 {
        self.lock().emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter_handler(counter: &Arc<AtomicU32>) -> Handler {
        let counter = counter.clone();
        Arc::new(move |_: &serde_json::Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn emit_reaches_topic_subscribers_only() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        bus.subscribe("test", counter_handler(&counter));

        assert_eq!(bus.emit("test", &json!(1)), 1);
        assert_eq!(bus.emit("test", &json!(2)), 1);
        assert_eq!(bus.emit("other", &json!(3)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(bus.emitted(), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        let id = bus.subscribe("test", counter_handler(&counter));

        bus.emit("test", &json!(null));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit("test", &json!(null));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listen_handle_unsubscribes_on_release() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicU32::new(0));
        let sub = bus.listen("test", counter_handler(&counter));
        assert_eq!(bus.subscriber_count("test"), 1);

        assert!(sub.release());
        assert_eq!(bus.subscriber_count("test"), 0);
        bus.emit("test", &json!(null));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_unsubscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let handler: Handler = {
            let bus = Arc::downgrade(&bus);
            let slot = slot.clone();
            Arc::new(move |_: &serde_json::Value| {
                if let (Some(bus), Some(id)) = (bus.upgrade(), *slot.lock().unwrap()) {
                    bus.unsubscribe(id);
                }
            })
        };
        let id = bus.subscribe("once", handler);
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bus.emit("once", &json!(null)), 1);
        assert_eq!(bus.subscriber_count("once"), 0);
    }
}
