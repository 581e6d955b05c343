//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Body read failed: {0}")]
    Body(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Scripted failure: {0}")]
    Scripted(String),
}
