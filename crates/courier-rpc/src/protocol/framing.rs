//! Frame layout for the wire protocol.
//!
//! A frame is one self-contained unit of wire data: a 1-byte frame type, a
//! 4-byte CRC32 checksum (0 when absent), then the payload. Message
//! boundaries are the transport's responsibility — stream transports
//! length-prefix each message, message transports deliver atomically — so
//! frames carry no length field of their own.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Frame header size (1 byte type + 4 bytes checksum).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Type of frame being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Request frame.
    Request = 0x01,
    /// Response frame.
    Response = 0x02,
    /// Error response frame.
    Error = 0x03,
    /// Heartbeat frame.
    Heartbeat = 0x04,
    /// Close frame.
    Close = 0x05,
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(Self::Request),
            0x02 => Ok(Self::Response),
            0x03 => Ok(Self::Error),
            0x04 => Ok(Self::Heartbeat),
            0x05 => Ok(Self::Close),
            _ => Err(ProtocolError::InvalidFrame(format!(
                "Unknown frame type: {value:#x}"
            ))),
        }
    }
}

/// A frame in the wire protocol.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Type of this frame.
    pub frame_type: FrameType,
    /// Frame payload.
    pub payload: Bytes,
    /// Optional checksum for integrity.
    pub checksum: Option<u32>,
}

impl Frame {
    /// Create a new frame with a checksum over the payload.
    pub fn new(frame_type: FrameType, payload: Bytes) -> Self {
        let checksum = Some(crc32fast::hash(&payload));
        Self {
            frame_type,
            payload,
            checksum,
        }
    }

    /// Create a frame without checksum.
    pub const fn new_unchecked(frame_type: FrameType, payload: Bytes) -> Self {
        Self {
            frame_type,
            payload,
            checksum: None,
        }
    }

    /// Verify the checksum if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the checksum does not match the payload.
    pub fn verify_checksum(&self) -> Result<()> {
        if let Some(expected) = self.checksum {
            let actual = crc32fast::hash(&self.payload);
            if expected != actual {
                return Err(ProtocolError::ChecksumMismatch { expected, actual }.into());
            }
        }
        Ok(())
    }

    /// Encode this frame into one wire message.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_u8(self.frame_type as u8);
        buf.put_u32(self.checksum.unwrap_or(0));
        buf.put(self.payload.clone());
        buf.freeze()
    }

    /// Decode a frame from one wire message.
    ///
    /// # Errors
    ///
    /// Returns an error on truncated input, an unknown frame type, or a
    /// checksum mismatch.
    pub fn from_bytes(mut data: Bytes) -> Result<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::InvalidFrame(format!(
                "Truncated frame: {} bytes, header needs {}",
                data.len(),
                FRAME_HEADER_SIZE
            ))
            .into());
        }

        let frame_type = FrameType::try_from(data.get_u8())?;
        let checksum = data.get_u32();

        let frame = Self {
            frame_type,
            payload: data,
            checksum: if checksum != 0 { Some(checksum) } else { None },
        };

        frame.verify_checksum()?;

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(FrameType::Request, Bytes::from("Hello, World!"));

        let encoded = frame.to_bytes();
        let decoded = Frame::from_bytes(encoded).unwrap();

        assert_eq!(decoded.frame_type, frame.frame_type);
        assert_eq!(decoded.payload, frame.payload);
        assert_eq!(decoded.checksum, frame.checksum);
    }

    #[test]
    fn test_truncated_frame() {
        let result = Frame::from_bytes(Bytes::from_static(&[0x01, 0x00]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_frame_type() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x7F);
        buf.put_u32(0);
        buf.put_slice(b"payload");

        let result = Frame::from_bytes(buf.freeze());
        assert!(result.is_err());
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut buf = BytesMut::new();
        buf.put_u8(FrameType::Request as u8);
        buf.put_u32(12345); // wrong checksum
        buf.put_slice(b"Hello, World!");

        let result = Frame::from_bytes(buf.freeze());
        assert!(result.is_err());
    }

    #[test]
    fn test_unchecked_frame_skips_verification() {
        let frame = Frame::new_unchecked(FrameType::Heartbeat, Bytes::from("ping"));
        let decoded = Frame::from_bytes(frame.to_bytes()).unwrap();
        assert_eq!(decoded.frame_type, FrameType::Heartbeat);
        assert_eq!(decoded.payload, Bytes::from("ping"));
        assert_eq!(decoded.checksum, None);
    }
}
