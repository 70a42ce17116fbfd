//! Input event records delivered by a capture backend.
//!
//! Payloads travel as JSON values on the `input-event` topic and are decoded
//! and validated here before the controller touches them.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{KeycastError, KeycastResult};

/// The kind of input action an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    KeyPress,
    KeyRelease,
    MousePress,
    MouseRelease,
    MouseMove,
    Wheel,
}

impl EventKind {
    pub fn is_key(self) -> bool {
        matches!(self, EventKind::KeyPress | EventKind::KeyRelease)
    }

    pub fn is_button(self) -> bool {
        matches!(self, EventKind::MousePress | EventKind::MouseRelease)
    }

    pub fn requires_position(self) -> bool {
        matches!(self, EventKind::MouseMove | EventKind::Wheel)
    }

    /// Wire name (same spelling as the serialized form).
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::KeyPress => "key_press",
            EventKind::KeyRelease => "key_release",
            EventKind::MousePress => "mouse_press",
            EventKind::MouseRelease => "mouse_release",
            EventKind::MouseMove => "mouse_move",
            EventKind::Wheel => "wheel",
        }
    }
}

/// Pointer position reported with mouse events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One observed input action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(alias = "event_type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Held modifiers, in display order.
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Milliseconds since the UNIX epoch, assigned by the backend.
    pub timestamp: u64,
}

impl InputEvent {
    pub fn key_press(key: impl Into<String>, modifiers: Vec<String>, timestamp: u64) -> Self {
        Self::keyed(EventKind::KeyPress, key.into(), modifiers, timestamp)
    }

    pub fn key_release(key: impl Into<String>, modifiers: Vec<String>, timestamp: u64) -> Self {
        Self::keyed(EventKind::KeyRelease, key.into(), modifiers, timestamp)
    }

    pub fn mouse_press(button: impl Into<String>, position: Option<Position>, timestamp: u64) -> Self {
        Self::buttoned(EventKind::MousePress, button.into(), position, timestamp)
    }

    pub fn mouse_release(
        button: impl Into<String>,
        position: Option<Position>,
        timestamp: u64,
    ) -> Self {
        Self::buttoned(EventKind::MouseRelease, button.into(), position, timestamp)
    }

    pub fn mouse_move(x: f64, y: f64, timestamp: u64) -> Self {
        Self::positioned(EventKind::MouseMove, x, y, timestamp)
    }

    pub fn wheel(x: f64, y: f64, timestamp: u64) -> Self {
        Self::positioned(EventKind::Wheel, x, y, timestamp)
    }

    /// Attach held modifiers (builder style).
    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    fn keyed(kind: EventKind, key: String, modifiers: Vec<String>, timestamp: u64) -> Self {
        Self {
            kind,
            key: Some(key),
            button: None,
            position: None,
            modifiers,
            timestamp,
        }
    }

    fn buttoned(kind: EventKind, button: String, position: Option<Position>, timestamp: u64) -> Self {
        Self {
            kind,
            key: None,
            button: Some(button),
            position,
            modifiers: Vec::new(),
            timestamp,
        }
    }

    fn positioned(kind: EventKind, x: f64, y: f64, timestamp: u64) -> Self {
        Self {
            kind,
            key: None,
            button: None,
            position: Some(Position { x, y }),
            modifiers: Vec::new(),
            timestamp,
        }
    }

    /// Check the field-presence rules for this event's kind.
    pub fn validate(&self) -> KeycastResult<()> {
        if self.kind.is_key() != self.key.is_some() {
            return Err(KeycastError::MalformedEvent(format!(
                "{} event must {}carry a key",
                self.kind.as_str(),
                if self.kind.is_key() { "" } else { "not " }
            )));
        }
        if self.kind.is_button() != self.button.is_some() {
            return Err(KeycastError::MalformedEvent(format!(
                "{} event must {}carry a button",
                self.kind.as_str(),
                if self.kind.is_button() { "" } else { "not " }
            )));
        }
        if self.kind.requires_position() && self.position.is_none() {
            return Err(KeycastError::MalformedEvent(format!(
                "{} event requires a position",
                self.kind.as_str()
            )));
        }
        Ok(())
    }

    /// Decode and validate an `input-event` payload.
    pub fn from_payload(payload: &serde_json::Value) -> KeycastResult<Self> {
        let event = InputEvent::deserialize(payload)?;
        event.validate()?;
        Ok(event)
    }

    /// Encode this event as an `input-event` payload.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_press_payload_decodes() {
        let payload = json!({
            "kind": "key_press",
            "key": "a",
            "modifiers": ["Ctrl", "Shift"],
            "timestamp": 100
        });
        let event = InputEvent::from_payload(&payload).unwrap();
        assert_eq!(event.kind, EventKind::KeyPress);
        assert_eq!(event.key.as_deref(), Some("a"));
        assert_eq!(event.modifiers, vec!["Ctrl", "Shift"]);
        assert_eq!(event.timestamp, 100);
    }

    #[test]
    fn accepts_event_type_field_name() {
        let payload = json!({
            "event_type": "key_release",
            "key": "⏎",
            "modifiers": [],
            "timestamp": 7
        });
        let event = InputEvent::from_payload(&payload).unwrap();
        assert_eq!(event.kind, EventKind::KeyRelease);
    }

    #[test]
    fn modifiers_default_to_empty() {
        let payload = json!({"kind": "wheel", "position": {"x": 1.0, "y": 2.0}, "timestamp": 1});
        let event = InputEvent::from_payload(&payload).unwrap();
        assert!(event.modifiers.is_empty());
        assert_eq!(event.position, Some(Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn key_event_without_key_is_malformed() {
        let payload = json!({"kind": "key_press", "timestamp": 1});
        assert!(matches!(
            InputEvent::from_payload(&payload),
            Err(KeycastError::MalformedEvent(_))
        ));
    }

    #[test]
    fn mouse_move_without_position_is_malformed() {
        let payload = json!({"kind": "mouse_move", "timestamp": 1});
        assert!(InputEvent::from_payload(&payload).is_err());
    }

    #[test]
    fn button_on_key_event_is_malformed() {
        let mut event = InputEvent::key_press("a", vec![], 1);
        event.button = Some("left".into());
        assert!(event.validate().is_err());
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let payload = json!({"kind": "touch", "timestamp": 1});
        assert!(matches!(
            InputEvent::from_payload(&payload),
            Err(KeycastError::MalformedEvent(_))
        ));
    }

    #[test]
    fn payload_round_trip_omits_absent_fields() {
        let event = InputEvent::mouse_press("left", None, 42);
        let payload = event.to_payload();
        assert!(payload.get("key").is_none());
        assert_eq!(payload["kind"], "mouse_press");
        assert_eq!(InputEvent::from_payload(&payload).unwrap(), event);
    }

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
