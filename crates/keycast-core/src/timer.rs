//! Restartable single-shot activity timer.
//!
//! Drives the overlay's visibility flag: every qualifying event restarts a
//! countdown, and the flag drops once the countdown elapses undisturbed.
//! The countdown runs as a Tokio task; when it elapses the task hands a
//! [`Countdown`] ticket back to the owner, which confirms it with
//! [`ActivityTimer::expire`] under its own lock. A ticket is only honoured
//! if no restart or cancel happened since it was issued.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default inactivity period before the overlay hides.
pub const DEFAULT_HIDE_AFTER: Duration = Duration::from_millis(5000);

/// Ticket identifying one countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown(u64);

#[derive(Debug)]
pub struct ActivityTimer {
    timeout: Duration,
    runtime: Handle,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl ActivityTimer {
    /// Create an idle timer whose countdowns run on `runtime`.
    pub fn new(timeout: Duration, runtime: Handle) -> Self {
        Self {
            timeout,
            runtime,
            generation: 0,
            pending: None,
        }
    }

    /// (Re)start the countdown. A pending countdown is cancelled, not extended.
    ///
    /// `on_expire` runs on the runtime once the countdown elapses and should
    /// pass the ticket back to [`ActivityTimer::expire`].
    pub fn mark_active<F>(&mut self, on_expire: F)
    where
        F: FnOnce(Countdown) + Send + 'static,
    {
        self.abort_pending();
        self.generation += 1;
        let ticket = Countdown(self.generation);
        let timeout = self.timeout;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            on_expire(ticket);
        }));
        trace!(generation = self.generation, "activity countdown started");
    }

    /// Confirm an elapsed countdown.
    ///
    /// Returns `true` exactly once for the current countdown; stale tickets
    /// (superseded by `mark_active` or `cancel`) return `false`.
    pub fn expire(&mut self, ticket: Countdown) -> bool {
        if self.pending.is_some() && ticket.0 == self.generation {
            self.pending = None;
            trace!(generation = self.generation, "activity countdown expired");
            true
        } else {
            false
        }
    }

    /// Stop any pending countdown and suppress its notification. Idempotent.
    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            self.abort_pending();
            self.generation += 1;
        }
    }

    /// Whether a countdown is pending (the visibility flag).
    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for ActivityTimer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
