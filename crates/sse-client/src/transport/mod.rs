//! Transport layer for streaming HTTP transfers
//!
//! The connection session only needs a blocking call that streams response
//! bytes into a sink and polls the sink periodically so a shutdown can abort
//! the transfer from inside. This module provides:
//! - [`HttpTransport`], the reqwest-backed implementation
//! - [`mock::ScriptedTransport`], a replaying transport for tests
//!
//! # Example
//!
//! ```ignore
//! use sse_client::transport::{HttpTransport, Transport, TransferRequest};
//!
//! let transport = HttpTransport::new(&Default::default());
//! let outcome = transport.perform(&request, &mut sink);
//! ```

pub mod error;
mod http;
pub mod mock;

pub use error::TransportError;
pub use http::HttpTransport;

/// One streaming transfer as built by the connection session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Target URL
    pub url: String,
    /// Request headers in the order they are sent
    pub headers: Vec<(String, String)>,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Credentials flag from the caller's options
    pub with_credentials: bool,
    /// Raw-mode flag from the caller's options
    pub raw: bool,
}

impl TransferRequest {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Whether a transfer should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

/// Receiver of transfer callbacks
pub trait TransferSink {
    /// Called for every chunk of the response body.
    ///
    /// A zero-length chunk is delivered once the response headers have been
    /// accepted.
    fn on_data(&mut self, chunk: &[u8]) -> Flow;

    /// Periodic checkpoint while the transfer is in flight
    fn on_progress(&mut self) -> Flow;
}

/// How a transfer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The body ended normally
    Completed { status: u16 },
    /// A sink callback returned [`Flow::Abort`]
    Aborted,
    /// The transfer failed; `status` is set when a response was received
    Failed {
        status: Option<u16>,
        error: TransportError,
    },
}

/// A blocking streaming transport
///
/// `perform` returns only when the transfer ends: natural EOF, failure, or an
/// abort requested by the sink.
pub trait Transport: Send + Sync {
    fn perform(&self, request: &TransferRequest, sink: &mut dyn TransferSink) -> TransferOutcome;
}
