//! Device proxies.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Device`] | Untyped handle: uid, response-expected table, identity |
//! | [`Rs232V2`] | RS232 Bricklet 2.0 |
//!
//! Proxies hold a non-owning reference to their [`IpConnection`]. They can
//! be created before connecting and stop working once every connection
//! handle is dropped.
//!
//! [`IpConnection`]: crate::IpConnection

// ============================================================================
// Submodules
// ============================================================================

mod core;

/// RS232 Bricklet 2.0.
pub mod rs232;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{Device, FUNCTION_GET_IDENTITY, Identity, ResponseExpected};
pub use rs232::Rs232V2;
