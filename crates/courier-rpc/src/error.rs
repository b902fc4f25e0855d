//! Error types for the RPC framework.

use crate::protocol::message::{self, ErrorInfo};
use courier_transport::TransportError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-related errors.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Protocol-level errors.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Codec errors during serialization/deserialization.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The remote side reported a failure for this call.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Handler registration errors.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The pool is at capacity and the saturation policy is `Reject`.
    #[error("Connection pool saturated")]
    Saturated,

    /// Transport-level failure other than a clean close.
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionClosed => Self::Connection(ConnectionError::Closed),
            other => Self::Transport(other),
        }
    }
}

/// Connection-specific errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    #[error("Failed to connect to {addr}: {source}")]
    ConnectFailed {
        /// The address we tried to connect to.
        addr: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed unexpectedly")]
    Closed,

    /// A response arrived for a different request than the one in flight.
    ///
    /// The connection cannot be resynchronized and is dropped.
    #[error("Connection desynchronized: expected response for {expected}, got {actual}")]
    Desynchronized {
        /// Request id the caller is waiting on.
        expected: Uuid,
        /// Request id the response carried.
        actual: Uuid,
    },
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Invalid frame received.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Checksum mismatch.
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Unexpected frame type.
    #[error("Unexpected frame type: expected {expected}, got {actual}")]
    UnexpectedFrameType {
        /// Expected frame type.
        expected: String,
        /// Actual frame type received.
        actual: String,
    },
}

/// Codec-related errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("Failed to serialize: {0}")]
    SerializationFailed(String),

    /// Deserialization failed.
    #[error("Failed to deserialize: {0}")]
    DeserializationFailed(String),
}

/// Handler errors produced on the server side of a dispatch.
///
/// These never cross the dispatch boundary as errors; the dispatcher
/// converts them into error response frames.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler registered under the requested name.
    #[error("No handler registered for function: {0}")]
    NotFound(String),

    /// The request payload could not be decoded into the handler's
    /// parameter type.
    #[error("Invalid request payload: {0}")]
    BadRequest(String),

    /// The handler returned an error.
    #[error("Handler error: {0}")]
    Internal(String),

    /// The handler panicked.
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A handler is already registered under this name.
    #[error("Duplicate handler name: {0}")]
    Duplicate(String),
}

/// Category of a remote failure, mapped from the wire error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorCode {
    /// The function name was not present in the server registry.
    FunctionNotFound,
    /// The server could not decode the request payload.
    BadRequest,
    /// The handler failed (returned an error or panicked).
    Handler,
    /// Unrecognized error code.
    Unknown,
}

impl std::fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FunctionNotFound => write!(f, "function not found"),
            Self::BadRequest => write!(f, "bad request"),
            Self::Handler => write!(f, "handler failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A failure reported by the server in a response envelope.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Failure category.
    pub code: RemoteErrorCode,
    /// Human-readable message from the server.
    pub message: String,
}

impl RemoteError {
    /// Whether this error means the called function does not exist.
    pub fn is_function_not_found(&self) -> bool {
        self.code == RemoteErrorCode::FunctionNotFound
    }
}

impl From<ErrorInfo> for RemoteError {
    fn from(info: ErrorInfo) -> Self {
        let code = match info.code.as_str() {
            message::code::NOT_FOUND => RemoteErrorCode::FunctionNotFound,
            message::code::BAD_REQUEST => RemoteErrorCode::BadRequest,
            message::code::INTERNAL => RemoteErrorCode::Handler,
            _ => RemoteErrorCode::Unknown,
        };
        Self {
            code,
            message: info.message,
        }
    }
}
