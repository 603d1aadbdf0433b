//! Error types for the brickd client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tfp_client::{Result, Rs232V2};
//!
//! async fn example(rs232: &Rs232V2) -> Result<()> {
//!     rs232.enable_read_callback().await?;
//!     rs232.write("test").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Request | [`Error::RequestTimeout`], [`Error::InvalidArgument`], [`Error::Device`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidIdentity`] |
//! | Listener | [`Error::Callback`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::Uid;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorCode
// ============================================================================

/// Error code carried in bits 6-7 of a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Request was handled.
    Ok,
    /// A request parameter was out of range.
    InvalidParameter,
    /// The device does not implement the function.
    FunctionNotSupported,
    /// Reserved code.
    Unknown,
}

impl ErrorCode {
    /// Decodes the two-bit code.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Ok,
            1 => Self::InvalidParameter,
            2 => Self::FunctionNotSupported,
            _ => Self::Unknown,
        }
    }

    /// Returns the two-bit wire value.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::InvalidParameter => 1,
            Self::FunctionNotSupported => 2,
            Self::Unknown => 3,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::InvalidParameter => "invalid parameter",
            Self::FunctionNotSupported => "function not supported",
            Self::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established.
    ///
    /// Returned when the daemon is unreachable or the connection is
    /// already in use.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connect attempt exceeded its deadline.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation attempted or interrupted while disconnected.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// No matching response arrived before the deadline.
    #[error("Request {function_id} to {uid} (seq {sequence}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Target device.
        uid: Uid,
        /// Function that was called.
        function_id: u8,
        /// Sequence number of the request.
        sequence: u8,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Invalid argument for a typed request.
    ///
    /// Returned before any I/O happens.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Device answered with a non-zero error code.
    #[error("Device {uid} rejected function {function_id}: {code}")]
    Device {
        /// Device that answered.
        uid: Uid,
        /// Function that was called.
        function_id: u8,
        /// Error code from the response header.
        code: ErrorCode,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed device identity token.
    #[error("Invalid identity '{identity}': {reason}")]
    InvalidIdentity {
        /// The rejected token.
        identity: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Listener Errors
    // ========================================================================
    /// A registered listener failed.
    ///
    /// Reported to the connection's error sink, never returned to callers.
    #[error("Listener for event {function_id} on {uid} failed: {message}")]
    Callback {
        /// Device the event came from.
        uid: Uid,
        /// Event id.
        function_id: u8,
        /// Failure description or panic message.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(uid: Uid, function_id: u8, sequence: u8, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            uid,
            function_id,
            sequence,
            timeout_ms,
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a device error.
    #[inline]
    pub fn device(uid: Uid, function_id: u8, code: ErrorCode) -> Self {
        Self::Device {
            uid,
            function_id,
            code,
        }
    }

    /// Creates an invalid identity error.
    #[inline]
    pub fn invalid_identity(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            identity: identity.into(),
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a listener failure.
    #[inline]
    pub fn callback(uid: Uid, function_id: u8, message: impl Into<String>) -> Self {
        Self::Callback {
            uid,
            function_id,
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionTimeout { .. } | Self::ConnectionClosed
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry without reconnecting.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
