//! Task recording: the full event timeline of a labelled session.
//!
//! While a recording session is active every event is appended to a
//! [`TimelineRecorder`]; stopping the session finalizes it into an immutable
//! [`CapturedSession`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::event::{EventKind, InputEvent};

/// Accumulates the events of one recording session.
#[derive(Debug, Clone)]
pub struct TimelineRecorder {
    label: String,
    started_at: u64,
    events: Vec<InputEvent>,
}

impl TimelineRecorder {
    pub fn new(label: impl Into<String>, started_at: u64) -> Self {
        Self {
            label: label.into(),
            started_at,
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Freeze the timeline.
    pub fn finish(self, ended_at: u64) -> CapturedSession {
        CapturedSession {
            label: self.label,
            started_at: self.started_at,
            ended_at: ended_at.max(self.started_at),
            events: self.events,
        }
    }
}

/// A finalized recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedSession {
    /// Task name the session was started with.
    pub label: String,
    /// Epoch milliseconds when the session became active.
    pub started_at: u64,
    /// Epoch milliseconds when the session was stopped.
    pub ended_at: u64,
    /// Every event delivered during the session, in arrival order.
    pub events: Vec<InputEvent>,
}

impl CapturedSession {
    pub fn duration_ms(&self) -> u64 {
        self.ended_at.saturating_sub(self.started_at)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Event counts keyed by wire name, omitting kinds that never occurred.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Keys pressed, in order, with their modifiers (e.g. `Ctrl+c`).
    pub fn keystrokes(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::KeyPress)
            .filter_map(|e| {
                let key = e.key.as_deref()?;
                if e.modifiers.is_empty() {
                    Some(key.to_string())
                } else {
                    Some(format!("{}+{}", e.modifiers.join("+"), key))
                }
            })
            .collect()
    }
}
