//! SSE (Server-Sent Events) parser
//!
//! Incrementally parses the `text/event-stream` wire format. Bytes may be fed
//! in arbitrary chunks; an unterminated trailing line stays buffered until the
//! next call.

use std::borrow::Cow;
use std::time::Duration;

use tracing::{debug, trace};

use crate::event::{Event, MESSAGE};

/// Lower bound applied to a `retry:` hint, in milliseconds
pub const MIN_RETRY_MS: u64 = 100;
/// Upper bound applied to a `retry:` hint, in milliseconds
pub const MAX_RETRY_MS: u64 = 60_000;

/// SSE parser state
#[derive(Debug, Default)]
pub struct SseParser {
    /// Buffer for incomplete lines
    buffer: Vec<u8>,
    /// Current event data being accumulated
    data_buffer: String,
    /// Current event type (empty means `message`)
    event_type: String,
    /// Last event ID, kept across events and attempts
    last_id: String,
    /// Most recent `retry:` hint, already clamped
    retry: Option<Duration>,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser that starts from a known last event id
    pub fn with_last_event_id(last_id: impl Into<String>) -> Self {
        Self {
            last_id: last_id.into(),
            ..Self::default()
        }
    }

    /// Feed bytes into the parser and extract any complete events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();

        if bytes.is_empty() {
            return events;
        }

        self.buffer.extend_from_slice(bytes);

        // Lines are borrowed from the buffer; consumed bytes are drained once
        let buffer = std::mem::take(&mut self.buffer);
        let mut start = 0;
        while let Some(offset) = buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = &buffer[start..end];
            start = end + 1;

            // Handle \r\n line endings
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        self.buffer = buffer;
        self.buffer.drain(..start);

        events
    }

    /// Last event id seen on the stream (or seeded at construction)
    pub fn last_event_id(&self) -> &str {
        &self.last_id
    }

    /// Most recent clamped `retry:` hint, if the server sent one
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Drop buffered bytes and the in-progress event.
    ///
    /// The last event id and retry hint survive.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.data_buffer.clear();
        self.event_type.clear();
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Event> {
        // Empty line signals end of event
        if line.is_empty() {
            return self.dispatch_event();
        }

        let line: Cow<'_, str> = String::from_utf8_lossy(line);

        let Some(colon_pos) = line.find(':') else {
            trace!("SSE line without colon ignored");
            return None;
        };

        let field = &line[..colon_pos];
        let value = &line[colon_pos + 1..];
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "data" => {
                // Multiple data lines are joined with newlines
                if !self.data_buffer.is_empty() {
                    self.data_buffer.push('\n');
                }
                self.data_buffer.push_str(value);
            }
            "event" => {
                self.event_type.clear();
                self.event_type.push_str(value);
            }
            "id" => {
                self.last_id.clear();
                self.last_id.push_str(value);
            }
            "retry" => match value.trim().parse::<i64>() {
                Ok(ms) => {
                    let clamped = ms.clamp(MIN_RETRY_MS as i64, MAX_RETRY_MS as i64) as u64;
                    trace!("SSE retry: {}ms", clamped);
                    self.retry = Some(Duration::from_millis(clamped));
                }
                Err(_) => debug!("Invalid retry value: {}", value),
            },
            "" => trace!("SSE keepalive/comment"),
            _ => trace!("SSE unknown field: {}", field),
        }

        None
    }

    /// Dispatch the accumulated event
    fn dispatch_event(&mut self) -> Option<Event> {
        // An event without data is not dispatched
        if self.data_buffer.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data_buffer);
        let event_type = match std::mem::take(&mut self.event_type) {
            t if t.is_empty() => MESSAGE.to_string(),
            t => t,
        };

        Some(Event {
            id: self.last_id.clone(),
            event_type,
            data,
        })
    }
}
