//! Chunked write and read.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{PayloadWriter, latin1_decode, latin1_encode};

use super::Rs232V2;
use super::core::function;
use super::stream::{CHUNK_SIZE, ChunkAssembler, ChunkOutcome};
use super::types::ReadChunk;

// ============================================================================
// Rs232V2 - Low Level
// ============================================================================

impl Rs232V2 {
    /// Sends one chunk of a message.
    ///
    /// `chunk` holds at most 60 bytes and is zero padded on the wire. Returns
    /// how many bytes the bricklet accepted into its send buffer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an oversized chunk, otherwise connection
    /// and device errors.
    pub async fn write_low_level(
        &self,
        message_length: u16,
        chunk_offset: u16,
        chunk: &[u8],
    ) -> Result<u8> {
        if chunk.len() > CHUNK_SIZE {
            return Err(Error::invalid_argument(format!(
                "Chunk of {} bytes exceeds {CHUNK_SIZE}",
                chunk.len()
            )));
        }

        let payload = PayloadWriter::new()
            .u16(message_length)
            .u16(chunk_offset)
            .padded(chunk, CHUNK_SIZE)
            .finish();

        let mut reply = self.device.request(function::WRITE_LOW_LEVEL, payload).await?;
        reply.u8()
    }

    /// Reads one chunk of at most `length` buffered bytes.
    ///
    /// # Errors
    ///
    /// Connection, device and protocol errors.
    pub async fn read_low_level(&self, length: u16) -> Result<ReadChunk> {
        let payload = PayloadWriter::new().u16(length).finish();
        let mut reply = self.device.request(function::READ_LOW_LEVEL, payload).await?;
        ReadChunk::decode(&mut reply)
    }
}

// ============================================================================
// Rs232V2 - High Level
// ============================================================================

impl Rs232V2 {
    /// Writes text, one byte per character.
    ///
    /// Returns the number of characters the bricklet accepted, which is less
    /// than `text.len()` when its send buffer is full.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] before any I/O if a character is above
    /// U+00FF.
    pub async fn write(&self, text: &str) -> Result<usize> {
        let bytes = latin1_encode(text)?;
        self.write_bytes(&bytes).await
    }

    /// Writes raw bytes in 60 byte chunks.
    ///
    /// Stops at the first chunk the bricklet does not take completely.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for more than 65535 bytes.
    pub async fn write_bytes(&self, data: &[u8]) -> Result<usize> {
        let message_length = u16::try_from(data.len()).map_err(|_| {
            Error::invalid_argument(format!("Message of {} bytes is too long", data.len()))
        })?;

        debug!(uid = %self.uid(), len = data.len(), "Writing message");

        if data.is_empty() {
            self.write_low_level(0, 0, &[]).await?;
            return Ok(0);
        }

        let mut written = 0usize;
        for (index, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            // At most 1093 chunks for a u16 length, so the offset fits.
            let offset = u16::try_from(index * CHUNK_SIZE).unwrap_or(u16::MAX);
            let accepted = usize::from(self.write_low_level(message_length, offset, chunk).await?);

            trace!(offset, accepted, "Chunk written");
            written += accepted;

            if accepted < chunk.len() {
                break;
            }
        }

        Ok(written)
    }

    /// Reads up to `length` buffered bytes as text.
    ///
    /// Returns an empty string when nothing is buffered. Does not wait for
    /// data to arrive.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the chunks do not line up.
    pub async fn read(&self, length: u16) -> Result<String> {
        let data = self.read_bytes(length).await?;
        Ok(latin1_decode(&data))
    }

    /// Reads up to `length` buffered bytes.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the chunks do not line up.
    pub async fn read_bytes(&self, length: u16) -> Result<Vec<u8>> {
        let mut assembler = ChunkAssembler::new();

        loop {
            let chunk = self.read_low_level(length).await?;

            match assembler.push(chunk.message_length, chunk.chunk_offset, &chunk.chunk_data) {
                ChunkOutcome::Complete(data) => {
                    debug!(uid = %self.uid(), len = data.len(), "Read message");
                    return Ok(data);
                }
                ChunkOutcome::Pending => {}
                ChunkOutcome::OutOfSync {
                    expected_offset,
                    chunk_offset,
                } => {
                    return Err(Error::protocol(format!(
                        "Read stream out of sync: expected offset {expected_offset}, got {chunk_offset}"
                    )));
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
