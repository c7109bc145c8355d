//! Transmission client errors.

use thiserror::Error;

/// Errors from the Transmission RPC client.
#[derive(Error, Debug)]
pub enum TransmissionError {
    /// Transport-level failure (connect, DNS, timeout).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Handshake or header contract violated.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed or unexpected JSON shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The daemon answered with a non-success result string.
    #[error("Daemon error: {0}")]
    Daemon(String),

    /// Response body read failed mid-stream. Not retried.
    #[error("IO error: {0}")]
    Io(String),

    /// All attempts within the shared deadline failed.
    #[error("retries exhausted after {attempts} attempt(s): {errors}")]
    RetryExhausted {
        /// Number of attempts made before giving up.
        attempts: usize,
        /// Concatenated per-attempt failures, for diagnostics.
        errors: String,
    },
}

impl TransmissionError {
    /// Whether the client retries this failure transparently.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
