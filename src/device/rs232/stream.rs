//! Reassembly of messages split across fixed-size chunks.
//!
//! Both the read event and `read_low_level` replies carry the total message
//! length, the offset of this chunk and a 60 byte data field. Only the first
//! `message_length - chunk_offset` bytes of the last chunk are meaningful.

use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

/// Data bytes carried by one chunk.
pub const CHUNK_SIZE: usize = 60;

// ============================================================================
// ChunkOutcome
// ============================================================================

/// Result of feeding one chunk to a [`ChunkAssembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A full message is available.
    Complete(Vec<u8>),
    /// More chunks are needed.
    Pending,
    /// The chunk did not continue the current message. Partial data was
    /// discarded.
    OutOfSync {
        /// Offset the assembler was waiting for.
        expected_offset: u16,
        /// Offset that arrived.
        chunk_offset: u16,
    },
}

// ============================================================================
// ChunkAssembler
// ============================================================================

/// Collects chunks of one message at a time.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    message_length: u16,
    data: Vec<u8>,
    in_progress: bool,
}

impl ChunkAssembler {
    /// Creates an idle assembler.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a message is partially received.
    #[inline]
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Drops any partial message.
    pub fn reset(&mut self) {
        self.message_length = 0;
        self.data.clear();
        self.in_progress = false;
    }

    /// Feeds one chunk.
    pub fn push(&mut self, message_length: u16, chunk_offset: u16, chunk: &[u8]) -> ChunkOutcome {
        let expected_offset = if self.in_progress {
            u16::try_from(self.data.len()).unwrap_or(u16::MAX)
        } else {
            0
        };

        let continues = chunk_offset == expected_offset
            && (!self.in_progress || message_length == self.message_length);

        if !continues {
            trace!(
                expected_offset,
                chunk_offset, message_length, "Chunk out of sync"
            );
            self.reset();
            return ChunkOutcome::OutOfSync {
                expected_offset,
                chunk_offset,
            };
        }

        if !self.in_progress {
            self.message_length = message_length;
            self.data.reserve(usize::from(message_length));
            self.in_progress = true;
        }

        let missing = usize::from(message_length) - self.data.len();
        let take = missing.min(CHUNK_SIZE).min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);

        if self.data.len() < usize::from(message_length) {
            return ChunkOutcome::Pending;
        }

        let message = std::mem::take(&mut self.data);
        self.reset();
        ChunkOutcome::Complete(message)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &[u8]) -> [u8; CHUNK_SIZE] {
        let mut out = [0u8; CHUNK_SIZE];
        out[..data.len()].copy_from_slice(data);
        out
    }

    #[test]
    fn test_single_chunk_message() {
        let mut assembler = ChunkAssembler::new();
        let outcome = assembler.push(4, 0, &chunk(b"test"));
        assert_eq!(outcome, ChunkOutcome::Complete(b"test".to_vec()));
        assert!(!assembler.in_progress());
    }

    #[test]
    fn test_empty_message() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(
            assembler.push(0, 0, &chunk(b"")),
            ChunkOutcome::Complete(Vec::new())
        );
    }

    #[test]
    fn test_multi_chunk_message() {
        let text: Vec<u8> = (0..130u8).collect();
        let mut assembler = ChunkAssembler::new();

        assert_eq!(assembler.push(130, 0, &text[0..60]), ChunkOutcome::Pending);
        assert!(assembler.in_progress());
        assert_eq!(assembler.push(130, 60, &text[60..120]), ChunkOutcome::Pending);
        assert_eq!(
            assembler.push(130, 120, &chunk(&text[120..130])),
            ChunkOutcome::Complete(text.clone())
        );
    }

    #[test]
    fn test_gap_resets_assembler() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.push(100, 0, &[1; 60]), ChunkOutcome::Pending);

        assert_eq!(
            assembler.push(100, 120, &[2; 60]),
            ChunkOutcome::OutOfSync {
                expected_offset: 60,
                chunk_offset: 120,
            }
        );
        assert!(!assembler.in_progress());

        // Next message starts cleanly.
        assert_eq!(
            assembler.push(2, 0, &chunk(b"ok")),
            ChunkOutcome::Complete(b"ok".to_vec())
        );
    }

    #[test]
    fn test_mid_message_start_is_out_of_sync() {
        let mut assembler = ChunkAssembler::new();
        assert!(matches!(
            assembler.push(100, 60, &[0; 60]),
            ChunkOutcome::OutOfSync { expected_offset: 0, .. }
        ));
    }

    #[test]
    fn test_length_change_is_out_of_sync() {
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.push(100, 0, &[0; 60]), ChunkOutcome::Pending);
        assert!(matches!(
            assembler.push(90, 60, &[0; 60]),
            ChunkOutcome::OutOfSync { .. }
        ));
    }
}
