//! TCP transport layer.
//!
//! This module handles communication between the client and the brick
//! daemon over one TCP socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  IpConnection    │            TCP               │  brickd         │
//! │                  │◄────────────────────────────►│                 │
//! │  receive loop    │        localhost:4223        │  bricks and     │
//! │  → PendingTable  │                              │  bricklets      │
//! │  → Dispatch      │                              │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `IpConnection::new` or `IpConnection::builder` - Create, not connected
//! 2. `IpConnection::connect` - Open the socket and spawn the receive loop
//! 3. `IpConnection::send_request` - Send frames, await matched responses
//! 4. `DispatchRegistry` - Route events to registered listeners
//! 5. `IpConnection::disconnect` - Fail pending requests, close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket, receive loop and pending requests |
//! | `dispatch` | Event listener registry |
//! | `options` | Timeouts |
//! | `builder` | Connection builder |

// ============================================================================
// Submodules
// ============================================================================

/// Connection builder.
pub mod builder;

/// TCP connection and receive loop.
pub mod connection;

/// Event listener registry.
pub mod dispatch;

/// Connection timing options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::IpConnectionBuilder;
pub use connection::{ConnectionState, IpConnection};
pub use dispatch::{DispatchRegistry, ErrorSink, Listener, TracingErrorSink};
pub use options::{ConnectionOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
