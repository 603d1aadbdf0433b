//! Helpers for reading and writing function payloads.
//!
//! Payload scalars are little endian. Fixed-size character fields are
//! ISO-8859-1, padded with NUL bytes.

// ============================================================================
// Imports
// ============================================================================

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

// ============================================================================
// PayloadReader
// ============================================================================

/// Bounds-checked reader over a response or event payload.
#[derive(Debug)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    /// Wraps a payload.
    #[inline]
    #[must_use]
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Returns the number of unread bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::protocol(format!(
                "Payload truncated: need {n} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    /// Reads a `u8`.
    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a `bool` encoded as one byte.
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    /// Reads a little endian `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Reads a little endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Reads `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        Ok(self.buf.split_to(n))
    }

    /// Reads a fixed-size NUL padded character field.
    pub fn string(&mut self, n: usize) -> Result<String> {
        let raw = self.bytes(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(latin1_decode(&raw[..end]))
    }
}

// ============================================================================
// PayloadWriter
// ============================================================================

/// Builder for request payloads.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    /// Creates an empty payload.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `u8`.
    #[must_use]
    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Appends a `bool` as one byte.
    #[must_use]
    pub fn bool(self, value: bool) -> Self {
        self.u8(u8::from(value))
    }

    /// Appends a little endian `u16`.
    #[must_use]
    pub fn u16(mut self, value: u16) -> Self {
        self.buf.put_u16_le(value);
        self
    }

    /// Appends a little endian `u32`.
    #[must_use]
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Appends `data` zero-padded (or truncated) to exactly `width` bytes.
    #[must_use]
    pub fn padded(mut self, data: &[u8], width: usize) -> Self {
        let used = data.len().min(width);
        self.buf.put_slice(&data[..used]);
        self.buf.put_bytes(0, width - used);
        self
    }

    /// Finishes the payload.
    #[inline]
    #[must_use]
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

// ============================================================================
// ISO-8859-1
// ============================================================================

/// Encodes text as one byte per character.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for characters above U+00FF.
pub fn latin1_encode(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|ch| {
            u8::try_from(u32::from(ch)).map_err(|_| {
                Error::invalid_argument(format!(
                    "Character {ch:?} cannot be sent as a single byte"
                ))
            })
        })
        .collect()
}

/// Decodes bytes as one character per byte.
#[must_use]
pub fn latin1_decode(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

// ============================================================================
// Tests
// ============================================================================
