//! Protocol layer for the RPC framework.
//!
//! This module contains the wire-level definitions:
//! - Frames and their binary encoding
//! - The CBOR payload codec
//! - Request/response envelopes

pub mod codec;
pub mod framing;
pub mod message;

pub use framing::{Frame, FrameType};
pub use message::{ErrorInfo, RequestEnvelope, ResponseEnvelope};
