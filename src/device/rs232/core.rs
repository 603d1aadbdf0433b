//! RS232 Bricklet 2.0 handle and function table.

use std::fmt;

use crate::device::{Device, Identity, ResponseExpected};
use crate::error::Result;
use crate::identifiers::Uid;
use crate::transport::IpConnection;

// ============================================================================
// Constants
// ============================================================================

/// Device type identifier reported by `get_identity`.
pub const DEVICE_IDENTIFIER: u16 = 2108;

/// Human readable device name.
pub const DEVICE_DISPLAY_NAME: &str = "RS232 Bricklet 2.0";

/// Function ids understood by the bricklet firmware.
pub mod function {
    /// Write one chunk.
    pub const WRITE_LOW_LEVEL: u8 = 1;
    /// Read one chunk.
    pub const READ_LOW_LEVEL: u8 = 2;
    /// Turn the read event on.
    pub const ENABLE_READ_CALLBACK: u8 = 3;
    /// Turn the read event off.
    pub const DISABLE_READ_CALLBACK: u8 = 4;
    /// Query the read event state.
    pub const IS_READ_CALLBACK_ENABLED: u8 = 5;
    /// Set line parameters.
    pub const SET_CONFIGURATION: u8 = 6;
    /// Get line parameters.
    pub const GET_CONFIGURATION: u8 = 7;
    /// Hold the TX line low.
    pub const SET_BREAK_CONDITION: u8 = 8;
    /// Split buffer memory.
    pub const SET_BUFFER_CONFIG: u8 = 9;
    /// Get buffer split.
    pub const GET_BUFFER_CONFIG: u8 = 10;
    /// Get buffer fill levels.
    pub const GET_BUFFER_STATUS: u8 = 11;
    /// Event: one chunk of received data.
    pub const CALLBACK_READ_LOW_LEVEL: u8 = 12;
    /// Event: line error.
    pub const CALLBACK_ERROR: u8 = 13;
}

const FUNCTIONS: &[(u8, ResponseExpected)] = &[
    (function::WRITE_LOW_LEVEL, ResponseExpected::AlwaysTrue),
    (function::READ_LOW_LEVEL, ResponseExpected::AlwaysTrue),
    (function::ENABLE_READ_CALLBACK, ResponseExpected::False),
    (function::DISABLE_READ_CALLBACK, ResponseExpected::False),
    (function::IS_READ_CALLBACK_ENABLED, ResponseExpected::AlwaysTrue),
    (function::SET_CONFIGURATION, ResponseExpected::False),
    (function::GET_CONFIGURATION, ResponseExpected::AlwaysTrue),
    (function::SET_BREAK_CONDITION, ResponseExpected::False),
    (function::SET_BUFFER_CONFIG, ResponseExpected::False),
    (function::GET_BUFFER_CONFIG, ResponseExpected::AlwaysTrue),
    (function::GET_BUFFER_STATUS, ResponseExpected::AlwaysTrue),
];

// ============================================================================
// Rs232V2
// ============================================================================

/// Typed proxy for an RS232 Bricklet 2.0.
///
/// Cloning is cheap and clones share the response-expected table.
#[derive(Clone)]
pub struct Rs232V2 {
    pub(super) device: Device,
}

impl fmt::Debug for Rs232V2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rs232V2").field(&self.device).finish()
    }
}

impl Rs232V2 {
    /// Creates a proxy for the bricklet with identity `uid`.
    ///
    /// The connection does not need to be connected yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`](crate::Error::InvalidIdentity) for a
    /// malformed `uid`.
    pub fn new(uid: &str, ipcon: &IpConnection) -> Result<Self> {
        Ok(Self {
            device: Device::with_functions(uid, ipcon, FUNCTIONS)?,
        })
    }

    /// Returns the bricklet identity.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.device.uid()
    }

    /// Returns the untyped device handle.
    #[inline]
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// See [`Device::response_expected`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for
    /// an unknown function.
    pub fn response_expected(&self, function_id: u8) -> Result<bool> {
        self.device.response_expected(function_id)
    }

    /// See [`Device::set_response_expected`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for
    /// an unknown function or a getter.
    pub fn set_response_expected(&self, function_id: u8, expected: bool) -> Result<()> {
        self.device.set_response_expected(function_id, expected)
    }

    /// See [`Device::set_response_expected_all`].
    pub fn set_response_expected_all(&self, expected: bool) {
        self.device.set_response_expected_all(expected);
    }

    /// Reads the identity record.
    ///
    /// # Errors
    ///
    /// Connection and protocol errors.
    pub async fn get_identity(&self) -> Result<Identity> {
        self.device.get_identity().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_table() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        for getter in [1, 2, 5, 7, 10, 11, 255] {
            assert!(rs232.response_expected(getter).expect("getter"), "{getter}");
            assert!(rs232.set_response_expected(getter, false).is_err());
        }
        for setter in [3, 4, 6, 8, 9] {
            assert!(!rs232.response_expected(setter).expect("setter"), "{setter}");
        }

        // Events are not callable.
        assert!(rs232.response_expected(function::CALLBACK_READ_LOW_LEVEL).is_err());
        assert!(rs232.response_expected(function::CALLBACK_ERROR).is_err());
    }

    #[test]
    fn test_clones_share_response_expected() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");
        let clone = rs232.clone();

        rs232
            .set_response_expected(function::SET_CONFIGURATION, true)
            .expect("setter");
        assert!(clone.response_expected(function::SET_CONFIGURATION).expect("setter"));
    }

    #[test]
    fn test_bad_uid() {
        let ipcon = IpConnection::new();
        assert!(Rs232V2::new("", &ipcon).is_err());
        assert_eq!(Rs232V2::new("XYZ", &ipcon).expect("proxy").uid().to_string(), "XYZ");
    }
}
