//! CBOR payload codec.
//!
//! CBOR round-trips arbitrary scalars, ordered sequences and key-unique
//! mappings, which is exactly the payload contract of the call surface.

use crate::error::{CodecError, Result};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// Encode a value into CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let mut vec = Vec::new();
    ciborium::ser::into_writer(value, &mut vec)
        .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
    Ok(Bytes::from(vec))
}

/// Decode CBOR bytes into a value.
///
/// # Errors
///
/// Returns an error if the data is truncated, malformed, or does not match
/// the target type.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::de::from_reader(data)
        .map_err(|e| CodecError::DeserializationFailed(e.to_string()))
        .map_err(Into::into)
}
