//! Error types for SSE client operations

use thiserror::Error;

/// Result type alias for SSE client operations
pub type Result<T> = std::result::Result<T, SseClientError>;

/// Errors surfaced across the public API.
///
/// Failures inside the background connection loop never appear here; they are
/// reported through `error` events instead.
#[derive(Error, Debug)]
pub enum SseClientError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// URL scheme other than http or https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The background connection thread could not be started
    #[error("Failed to spawn connection thread: {0}")]
    Spawn(#[source] std::io::Error),
}
