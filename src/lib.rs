//! TFP client - Async client for the Tinkerforge brick daemon protocol.
//!
//! This library talks to bricks and bricklets through a brick daemon
//! (brickd) over TCP, using the binary Tinkerforge Protocol.
//!
//! # Architecture
//!
//! The client follows a request/response model with pushed events:
//!
//! - **Transport**: one [`IpConnection`] owns the socket and a receive loop
//! - **Dispatch**: events are routed by (uid, function id) to listeners
//! - **Devices**: typed proxies such as [`Rs232V2`] encode calls into frames
//!
//! Key design principles:
//!
//! - Responses are matched by a 4-bit sequence number, at most 15 in flight
//! - Every request carries a timeout, and disconnect fails all of them
//! - Listeners run on a blocking worker, never on the receive loop
//! - Proxies do not keep the connection alive
//!
//! # Quick Start
//!
//! ```no_run
//! use tfp_client::{IpConnection, Result, Rs232V2};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ipcon = IpConnection::new();
//!     let rs232 = Rs232V2::new("XYZ", &ipcon)?;
//!
//!     ipcon.connect("localhost:4223").await?;
//!
//!     // Print every message the bricklet receives
//!     rs232.register_read_callback(|message| println!("Message: {message:?}"))?;
//!     rs232.enable_read_callback().await?;
//!
//!     // With RX and TX bridged, this comes back through the callback
//!     rs232.write("test").await?;
//!
//!     ipcon.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`device`] | Device proxies: [`Device`], [`Rs232V2`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Device identity ([`Uid`]) |
//! | [`protocol`] | Frame layout and codec |
//! | [`transport`] | Connection, receive loop, event dispatch |

// ============================================================================
// Modules
// ============================================================================

/// Device proxies.
///
/// - [`Device`] - Untyped handle shared by all proxies
/// - [`Rs232V2`] - RS232 Bricklet 2.0
pub mod device;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Device identity tokens.
pub mod identifiers;

/// Binary frame layout, codec and payload helpers.
pub mod protocol;

/// TCP transport layer.
///
/// Connection management, pending requests and event dispatch.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Device types
pub use device::rs232::{
    BufferConfig, BufferStatus, Configuration, FlowControl, Parity, ReadChunk, Rs232Error,
    StopBits, WordLength,
};
pub use device::{Device, Identity, ResponseExpected, Rs232V2};

// Error types
pub use error::{Error, ErrorCode, Result};

// Identifier types
pub use identifiers::Uid;

// Protocol types
pub use protocol::{Frame, FrameCodec};

// Transport types
pub use transport::{
    ConnectionOptions, ConnectionState, DispatchRegistry, ErrorSink, IpConnection,
    IpConnectionBuilder, Listener, TracingErrorSink,
};
