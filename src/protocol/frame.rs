//! Frame and header types.
//!
//! # Layout
//!
//! ```text
//! 0      4        5             6                       7          8
//! ┌──────┬────────┬─────────────┬───────────────────────┬──────────┬─────────┐
//! │ uid  │ length │ function id │ seq<<4 | resp_exp<<3  │ err<<6   │ payload │
//! │ u32  │ u8     │ u8          │ u8                    │ u8       │ 0..=72  │
//! └──────┴────────┴─────────────┴───────────────────────┴──────────┴─────────┘
//! ```
//!
//! `length` counts the whole frame including the header. Scalars are little
//! endian.

// ============================================================================
// Imports
// ============================================================================

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, ErrorCode, Result};
use crate::identifiers::Uid;

// ============================================================================
// Constants
// ============================================================================

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = 72;

/// Largest complete frame.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Sequence number used by event and fire-and-forget frames.
pub const EVENT_SEQUENCE: u8 = 0;

/// Highest sequence number (4-bit field).
pub const MAX_SEQUENCE: u8 = 15;

// ============================================================================
// Header
// ============================================================================

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw uid field. Zero only appears in broadcasts.
    pub uid: u32,
    /// Total frame length including header.
    pub length: u8,
    /// Function or event id.
    pub function_id: u8,
    /// Sequence number, `0..=15`.
    pub sequence: u8,
    /// Whether the sender waits for a reply.
    pub response_expected: bool,
    /// Error code (responses only).
    pub error_code: ErrorCode,
}

impl Header {
    /// Returns the payload length announced by the header.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::from(self.length).saturating_sub(HEADER_SIZE)
    }

    /// Returns `true` if this is an unsolicited event frame.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.sequence == EVENT_SEQUENCE
    }

    /// Writes the header into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.uid);
        dst.put_u8(self.length);
        dst.put_u8(self.function_id);
        dst.put_u8((self.sequence << 4) | (u8::from(self.response_expected) << 3));
        dst.put_u8(self.error_code.bits() << 6);
    }

    /// Reads a header from the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if fewer than eight bytes are available or
    /// the announced length is outside `8..=80`.
    pub fn decode(mut src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(Error::protocol(format!(
                "Header needs {HEADER_SIZE} bytes, got {}",
                src.len()
            )));
        }

        let uid = src.get_u32_le();
        let length = src.get_u8();
        let function_id = src.get_u8();
        let sequence_options = src.get_u8();
        let flags = src.get_u8();

        if !(HEADER_SIZE..=MAX_FRAME_SIZE).contains(&usize::from(length)) {
            return Err(Error::protocol(format!("Invalid frame length {length}")));
        }

        Ok(Self {
            uid,
            length,
            function_id,
            sequence: sequence_options >> 4,
            response_expected: sequence_options & 0b1000 != 0,
            error_code: ErrorCode::from_bits(flags >> 6),
        })
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One request, response or event on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: Header,
    /// Function specific payload.
    pub payload: Bytes,
}

impl Frame {
    /// Creates an outbound frame for `uid`.
    ///
    /// The sequence number is left at zero; the connection assigns one when
    /// the frame is sent as a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn new(uid: Uid, function_id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        Self::with_raw_uid(uid.as_u32(), function_id, payload)
    }

    /// Creates a frame addressed to a raw uid value (0 = broadcast).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn with_raw_uid(uid: u32, function_id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::invalid_argument(format!(
                "Payload of {} bytes exceeds {MAX_PAYLOAD_SIZE}",
                payload.len()
            )));
        }

        Ok(Self {
            header: Header {
                uid,
                length: (HEADER_SIZE + payload.len()) as u8,
                function_id,
                sequence: EVENT_SEQUENCE,
                response_expected: false,
                error_code: ErrorCode::Ok,
            },
            payload,
        })
    }

    /// Returns the device identity, or `None` for broadcasts.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> Option<Uid> {
        Uid::new(self.header.uid)
    }

    /// Returns the function or event id.
    #[inline]
    #[must_use]
    pub fn function_id(&self) -> u8 {
        self.header.function_id
    }

    /// Returns the sequence number.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Builds the reply to this frame with the same uid, function and
    /// sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the payload is too large.
    pub fn reply(&self, error_code: ErrorCode, payload: impl Into<Bytes>) -> Result<Self> {
        let mut reply = Self::with_raw_uid(self.header.uid, self.header.function_id, payload)?;
        reply.header.sequence = self.header.sequence;
        reply.header.response_expected = self.header.response_expected;
        reply.header.error_code = error_code;
        Ok(reply)
    }
}

// ============================================================================
// Tests
// ============================================================================
