//! Named subscription handles with exactly-once release.
//!
//! Every live registration with an event source is represented by a
//! [`Subscription`]. Owners keep them in a [`SubscriptionRegistry`] so teardown
//! is one call that cannot partially forget a handle.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// An opaque release capability for one live registration.
///
/// Released at most once: explicitly via [`Subscription::release`], or on drop.
pub struct Subscription {
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Run the release function. Returns `false` if it panicked.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    fn release_inner(&mut self) -> bool {
        match self.release.take() {
            Some(release) => panic::catch_unwind(AssertUnwindSafe(release)).is_ok(),
            None => true,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.release_inner() {
            error!("subscription release panicked during drop");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Tracks named subscriptions and releases them exactly once.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handles: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription` under `name`, releasing any handle already there.
    pub fn register(&mut self, name: impl Into<String>, subscription: Subscription) {
        let name = name.into();
        if let Some(previous) = self.handles.insert(name.clone(), subscription) {
            debug!(name = %name, "replacing live subscription");
            if !previous.release() {
                error!(name = %name, "release of replaced subscription panicked");
            }
        }
    }

    /// Release a single handle. Returns `false` if nothing was registered under `name`.
    pub fn release(&mut self, name: &str) -> bool {
        match self.handles.remove(name) {
            Some(subscription) => {
                if !subscription.release() {
                    error!(name, "subscription release panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Release every handle and empty the registry.
    ///
    /// Each release is isolated: a panicking one is logged and the rest still
    /// run. Returns the number of handles released.
    pub fn release_all(&mut self) -> usize {
        let count = self.handles.len();
        for (name, subscription) in self.handles.drain() {
            if !subscription.release() {
                error!(name = %name, "subscription release panicked");
            }
        }
        if count > 0 {
            debug!(count, "released subscriptions");
        }
        count
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicU32>) -> Subscription {
        let counter = counter.clone();
        Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn release_all_runs_each_release_once() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.register("a", counting(&a));
        registry.register("b", counting(&b));

        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.release_all(), 0);
        assert!(registry.is_empty());
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_releases_previous_handle() {
        let old = Arc::new(AtomicU32::new(0));
        let new = Arc::new(AtomicU32::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.register("events", counting(&old));
        registry.register("events", counting(&new));

        assert_eq!(old.load(Ordering::SeqCst), 1);
        assert_eq!(new.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);

        registry.release_all();
        assert_eq!(old.load(Ordering::SeqCst), 1);
        assert_eq!(new.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_release_does_not_block_others() {
        let survivor = Arc::new(AtomicU32::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.register("bad", Subscription::new(|| panic!("release failed")));
        registry.register("good", counting(&survivor));

        assert_eq!(registry.release_all(), 2);
        assert_eq!(survivor.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_by_name() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.register("x", counting(&counter));
        assert!(registry.contains("x"));
        assert!(registry.release("x"));
        assert!(!registry.release("x"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_remaining() {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let mut registry = SubscriptionRegistry::new();
            registry.register("x", counting(&counter));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_subscription_releases() {
        let counter = Arc::new(AtomicU32::new(0));
        drop(counting(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_release_reports_panic() {
        assert!(!Subscription::new(|| panic!("boom")).release());
        assert!(Subscription::new(|| {}).release());
    }
}
