//! Event value delivered to callbacks and listeners

use serde::{Deserialize, Serialize};

/// Event type synthesized once per attempt when the first chunk arrives
pub const OPEN: &str = "open";
/// Default event type when the wire omits an `event:` field
pub const MESSAGE: &str = "message";
/// Event type synthesized when an attempt fails
pub const ERROR: &str = "error";

/// A single dispatched event
///
/// `id` is the last event id known at dispatch time (possibly empty).
/// `data` holds the joined `data:` lines of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: String,
}

impl Event {
    /// Create an event from its parts
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// The synthetic `open` event for an attempt
    pub fn open(last_event_id: impl Into<String>) -> Self {
        Self::new(last_event_id, OPEN, "")
    }

    /// The synthetic `error` event for a failed attempt
    pub fn error(last_event_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(last_event_id, ERROR, data)
    }

    pub fn is_open(&self) -> bool {
        self.event_type == OPEN
    }

    pub fn is_error(&self) -> bool {
        self.event_type == ERROR
    }
}
