//! Error types shared by all transport implementations.

use std::io;
use thiserror::Error;

/// Errors produced by transport implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectionFailed {
        /// The address we tried to connect to.
        addr: String,
        /// Why the connection could not be established.
        reason: String,
    },

    /// The connection was closed by the peer or locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The address could not be understood by this transport.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A message exceeded the configured size limit.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge {
        /// Size of the offending message.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// An operation did not complete in time.
    #[error("Transport operation timed out: {0}")]
    Timeout(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Build a `ConnectionFailed` error.
    pub fn connection_failed(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `Timeout` error.
    pub fn timeout(context: impl Into<String>) -> Self {
        Self::Timeout(context.into())
    }
}
