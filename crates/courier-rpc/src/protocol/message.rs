//! Request and response envelopes.
//!
//! Envelopes travel as frame payloads, bincode-encoded. The request id is
//! carried even though request/response ordering on one connection is
//! strict — it lets the client detect a desynchronized connection instead
//! of silently returning the wrong response.

use crate::error::HandlerError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire error codes carried in [`ErrorInfo::code`].
pub mod code {
    /// The function name was not present in the registry.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// The request payload did not decode into the handler's parameter type.
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    /// The handler returned an error or panicked.
    pub const INTERNAL: &str = "INTERNAL";
}

/// One RPC request on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique call id, used for correlation checks.
    pub id: Uuid,
    /// Name of the function to invoke.
    pub method: String,
    /// CBOR-encoded argument payload.
    pub payload: Vec<u8>,
}

/// One RPC response on the wire, mirroring its request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Call id of the request this response answers.
    pub request_id: Uuid,
    /// CBOR-encoded result payload (empty on error).
    pub payload: Vec<u8>,
    /// Set when the call failed on the server side.
    pub error: Option<ErrorInfo>,
}

/// Error information for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code for categorization.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    pub details: Option<serde_json::Value>,
}

impl From<&HandlerError> for ErrorInfo {
    fn from(err: &HandlerError) -> Self {
        let code = match err {
            HandlerError::NotFound(_) => code::NOT_FOUND,
            HandlerError::BadRequest(_) => code::BAD_REQUEST,
            HandlerError::Internal(_) | HandlerError::Panicked(_) => code::INTERNAL,
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}
