//! Wire frame.
//!
//! Every message on the socket is one JSON text frame:
//!
//! ```json
//! { "event": "7-ticket", "args": [ { "id": 42 } ] }
//! ```
//!
//! Arguments are opaque to this crate and are forwarded untouched.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

use super::EventName;

// ============================================================================
// Frame
// ============================================================================

/// A single named event with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name.
    pub event: String,

    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Frame {
    /// Creates a frame for an event.
    #[inline]
    #[must_use]
    pub fn new(event: &EventName, args: Vec<Value>) -> Self {
        Self {
            event: event.as_str().to_string(),
            args,
        }
    }

    /// Returns the typed event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> EventName {
        EventName::from(self.event.as_str())
    }

    /// Serializes the frame to JSON text.
    pub fn encode(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Parses a frame from JSON text.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a frame object
    /// - [`Error::Protocol`] if the event name is empty
    pub fn decode(text: &str) -> Result<Self> {
        let frame: Self = from_str(text)?;
        if frame.event.is_empty() {
            return Err(Error::protocol("Frame without event name"));
        }
        Ok(frame)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_encode_shape() {
        let frame = Frame::new(&EventName::Heartbeat, vec![json!({ "t": 1 })]);
        let text = frame.encode().expect("encode");
        let value: Value = from_str(&text).expect("valid json");
        assert_eq!(value, json!({ "event": "heartbeat", "args": [{ "t": 1 }] }));
    }

    #[test]
    fn test_decode_without_args() {
        let frame = Frame::decode(r#"{"event":"ready"}"#).expect("decode");
        assert_eq!(frame.name(), EventName::Ready);
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_decode_rejects_empty_event() {
        let err = Frame::decode(r#"{"event":"","args":[]}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Frame::decode("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
