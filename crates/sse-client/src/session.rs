//! One streaming attempt against the event source URL

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::EventSourceOptions;
use crate::dispatcher::Dispatcher;
use crate::event::Event;
use crate::parser::SseParser;
use crate::state::LifecycleFlags;
use crate::transport::{Flow, TransferOutcome, TransferRequest, TransferSink, Transport};

/// Result of one attempt, as seen by the reconnection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptResult {
    /// Stream ended normally or was cancelled by shutdown
    Clean,
    /// Anything else
    Failed,
}

/// Build the request headers for an attempt.
///
/// Fixed SSE headers come first, then `Last-Event-ID` when known, then the
/// caller's headers. Nothing is deduplicated.
pub fn request_headers<'a>(
    last_event_id: &str,
    extra: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), "text/event-stream".to_string()),
        ("Cache-Control".to_string(), "no-cache".to_string()),
        ("Connection".to_string(), "keep-alive".to_string()),
    ];

    if !last_event_id.is_empty() {
        headers.push(("Last-Event-ID".to_string(), last_event_id.to_string()));
    }

    headers.extend(extra.into_iter().map(|(k, v)| (k.clone(), v.clone())));
    headers
}

/// Drives streaming attempts and owns the per-attempt parser state
pub(crate) struct ConnectionSession {
    url: String,
    options: EventSourceOptions,
    transport: Arc<dyn Transport>,
    flags: Arc<LifecycleFlags>,
    dispatcher: Arc<Dispatcher>,
    parser: Mutex<SseParser>,
    open_sent: AtomicBool,
}

impl ConnectionSession {
    pub fn new(
        url: String,
        options: EventSourceOptions,
        transport: Arc<dyn Transport>,
        flags: Arc<LifecycleFlags>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let parser = SseParser::with_last_event_id(options.last_event_id.clone().unwrap_or_default());
        Self {
            url,
            options,
            transport,
            flags,
            dispatcher,
            parser: Mutex::new(parser),
            open_sent: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &EventSourceOptions {
        &self.options
    }

    pub fn last_event_id(&self) -> String {
        self.parser.lock().last_event_id().to_string()
    }

    /// Clamped `retry:` hint from the server, if any
    pub fn retry_hint(&self) -> Option<Duration> {
        self.parser.lock().retry()
    }

    /// Fresh framing state for a new attempt; the last event id is kept
    pub fn reset(&self) {
        self.open_sent.store(false, Ordering::SeqCst);
        self.parser.lock().reset();
    }

    /// Drop buffered bytes on close
    pub fn clear_buffers(&self) {
        self.parser.lock().reset();
    }

    pub fn build_request(&self) -> TransferRequest {
        TransferRequest {
            url: self.url.clone(),
            headers: request_headers(&self.last_event_id(), &self.options.headers),
            max_redirects: self.options.transport.max_redirects,
            with_credentials: self.options.with_credentials,
            raw: self.options.raw,
        }
    }

    /// Run one transfer to completion
    pub fn attempt(&self) -> AttemptResult {
        let request = self.build_request();
        debug!("Connecting to event stream: {}", request.url);

        let outcome = self
            .transport
            .perform(&request, &mut SessionSink { session: self });

        match outcome {
            TransferOutcome::Completed { status } => {
                debug!("Event stream ended ({})", status);
                AttemptResult::Clean
            }
            TransferOutcome::Aborted => {
                debug!("Event stream aborted by shutdown");
                AttemptResult::Clean
            }
            TransferOutcome::Failed { status, error } => {
                warn!("Connection error: {}", error);
                let data = match status {
                    Some(code) => {
                        warn!("HTTP response code: {}", code);
                        code.to_string()
                    }
                    None => String::new(),
                };
                self.dispatcher
                    .dispatch(&Event::error(self.last_event_id(), data));
                AttemptResult::Failed
            }
        }
    }

    fn on_chunk(&self, chunk: &[u8]) -> Flow {
        if !self.flags.is_active() {
            return Flow::Abort;
        }

        if self
            .open_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.dispatcher.dispatch(&Event::open(self.last_event_id()));
        }

        let events = self.parser.lock().feed(chunk);
        for event in &events {
            if !self.flags.is_active() {
                break;
            }
            self.dispatcher.dispatch(event);
        }

        if self.flags.is_active() {
            Flow::Continue
        } else {
            Flow::Abort
        }
    }
}

struct SessionSink<'a> {
    session: &'a ConnectionSession,
}

impl TransferSink for SessionSink<'_> {
    fn on_data(&mut self, chunk: &[u8]) -> Flow {
        self.session.on_chunk(chunk)
    }

    fn on_progress(&mut self) -> Flow {
        if self.session.flags.is_active() {
            Flow::Continue
        } else {
            Flow::Abort
        }
    }
}
