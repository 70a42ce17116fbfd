//! Fixed-capacity buffer of the most recent input events.
//!
//! Holds the last N events in arrival order so the overlay can show a short
//! trail of recent keystrokes without keeping unbounded history.

use std::collections::VecDeque;

use crate::event::InputEvent;

/// Default number of events kept for display.
pub const DEFAULT_CAPACITY: usize = 10;

/// A bounded FIFO of input events.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<InputEvent>,
    capacity: usize,
    /// Total events ever pushed (including evicted ones).
    total_pushed: u64,
}

impl EventBuffer {
    /// Create a new buffer holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append an event, evicting the oldest ones once over capacity.
    pub fn push(&mut self, event: InputEvent) {
        self.total_pushed += 1;
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Copy of the buffered events, oldest first.
    pub fn snapshot(&self) -> Vec<InputEvent> {
        self.events.iter().cloned().collect()
    }

    /// Most recently pushed event still held.
    pub fn latest(&self) -> Option<&InputEvent> {
        self.events.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.total_pushed = 0;
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
