//! Wire protocol spoken with brickd.
//!
//! Every message is a binary [`Frame`]: an eight byte header followed by a
//! function specific payload of at most 72 bytes.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Sequence | Purpose |
//! |--------------|-----------|----------|---------|
//! | Request | Local → Daemon | `1..=15` | Function call awaiting a reply |
//! | Fire-and-forget | Local → Daemon | `0` | Function call without reply |
//! | Response | Daemon → Local | request's | Reply, may carry an error code |
//! | Event | Daemon → Local | `0` | Device notification (callback) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | `tokio_util` codec over a byte stream |
//! | `frame` | Header and frame types |
//! | `payload` | Payload reader/writer and text encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Stream codec.
pub mod codec;

/// Header and frame types.
pub mod frame;

/// Payload encoding helpers.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::FrameCodec;
pub use frame::{
    EVENT_SEQUENCE, Frame, HEADER_SIZE, Header, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MAX_SEQUENCE,
};
pub use payload::{PayloadReader, PayloadWriter, latin1_decode, latin1_encode};
