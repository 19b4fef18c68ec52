//! Transport errors.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Request never completed (connect, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by service")]
    RateLimited,

    /// Response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Client settings cannot be turned into a request.
    #[error("invalid client settings: {0}")]
    InvalidSettings(String),

    /// Transport refused the call (closed, injected fault).
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}
