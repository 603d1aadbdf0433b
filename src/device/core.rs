//! Core device handle shared by all typed proxies.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::Uid;
use crate::protocol::{Frame, PayloadReader};
use crate::transport::connection::ConnectionInner;
use crate::transport::{IpConnection, Listener};

// ============================================================================
// Constants
// ============================================================================

/// Function id of `get_identity`, implemented by every device.
pub const FUNCTION_GET_IDENTITY: u8 = 255;

// ============================================================================
// Types
// ============================================================================

/// Whether a function call waits for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseExpected {
    /// Not a function of this device.
    Invalid,
    /// Getter: always answered.
    AlwaysTrue,
    /// Setter, acknowledged.
    True,
    /// Setter, fire-and-forget.
    False,
}

/// Identity record returned by [`Device::get_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Uid of the device itself.
    pub uid: String,
    /// Uid of the brick the device is attached to.
    pub connected_uid: String,
    /// Port position on the parent (`'a'`..`'h'`, `'0'`..`'8'`).
    pub position: char,
    /// Hardware version (major, minor, revision).
    pub hardware_version: [u8; 3],
    /// Firmware version (major, minor, revision).
    pub firmware_version: [u8; 3],
    /// Device type identifier.
    pub device_identifier: u16,
}

impl Identity {
    fn decode(mut reader: PayloadReader) -> Result<Self> {
        let uid = reader.string(8)?;
        let connected_uid = reader.string(8)?;
        let position = char::from(reader.u8()?);
        let hardware_version = [reader.u8()?, reader.u8()?, reader.u8()?];
        let firmware_version = [reader.u8()?, reader.u8()?, reader.u8()?];
        let device_identifier = reader.u16()?;

        Ok(Self {
            uid,
            connected_uid,
            position,
            hardware_version,
            firmware_version,
            device_identifier,
        })
    }
}

/// Internal shared state for a device handle.
struct DeviceInner {
    uid: Uid,
    connection: Weak<ConnectionInner>,
    response_expected: Mutex<[ResponseExpected; 256]>,
}

// ============================================================================
// Device
// ============================================================================

/// Handle to one device reachable through an [`IpConnection`].
///
/// The handle holds no socket and does not keep the connection alive. It can
/// be created before the connection is connected; requests fail with
/// [`Error::ConnectionClosed`] until it is.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("uid", &self.inner.uid)
            .field("attached", &(self.inner.connection.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Creates a handle for `uid` with only `get_identity` known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `uid` is not a valid token.
    pub fn new(uid: &str, ipcon: &IpConnection) -> Result<Self> {
        Self::with_functions(uid, ipcon, &[])
    }

    /// Creates a handle with a function table.
    ///
    /// `functions` lists `(function id, response expected)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `uid` is not a valid token.
    pub fn with_functions(
        uid: &str,
        ipcon: &IpConnection,
        functions: &[(u8, ResponseExpected)],
    ) -> Result<Self> {
        let uid = Uid::parse(uid)?;

        let mut table = [ResponseExpected::Invalid; 256];
        table[usize::from(FUNCTION_GET_IDENTITY)] = ResponseExpected::AlwaysTrue;
        for &(function_id, expected) in functions {
            table[usize::from(function_id)] = expected;
        }

        debug!(%uid, "Device handle created");

        Ok(Self {
            inner: Arc::new(DeviceInner {
                uid,
                connection: ipcon.downgrade(),
                response_expected: Mutex::new(table),
            }),
        })
    }

    /// Returns the device identity.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.inner.uid
    }
}

// ============================================================================
// Device - Response Expected
// ============================================================================

impl Device {
    /// Returns whether calls to `function_id` wait for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown function.
    pub fn response_expected(&self, function_id: u8) -> Result<bool> {
        match self.inner.response_expected.lock()[usize::from(function_id)] {
            ResponseExpected::AlwaysTrue | ResponseExpected::True => Ok(true),
            ResponseExpected::False => Ok(false),
            ResponseExpected::Invalid => Err(Error::invalid_argument(format!(
                "Unknown function id {function_id}"
            ))),
        }
    }

    /// Makes a setter wait for an acknowledgement (or stop waiting).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown function or a getter,
    /// which is always answered.
    pub fn set_response_expected(&self, function_id: u8, expected: bool) -> Result<()> {
        let mut table = self.inner.response_expected.lock();
        let slot = &mut table[usize::from(function_id)];

        match *slot {
            ResponseExpected::Invalid => Err(Error::invalid_argument(format!(
                "Unknown function id {function_id}"
            ))),
            ResponseExpected::AlwaysTrue => Err(Error::invalid_argument(format!(
                "Function {function_id} always responds"
            ))),
            ResponseExpected::True | ResponseExpected::False => {
                *slot = if expected {
                    ResponseExpected::True
                } else {
                    ResponseExpected::False
                };
                Ok(())
            }
        }
    }

    /// Applies [`set_response_expected`](Self::set_response_expected) to every
    /// setter.
    pub fn set_response_expected_all(&self, expected: bool) {
        let flag = if expected {
            ResponseExpected::True
        } else {
            ResponseExpected::False
        };

        for slot in self.inner.response_expected.lock().iter_mut() {
            if matches!(*slot, ResponseExpected::True | ResponseExpected::False) {
                *slot = flag;
            }
        }
    }
}

// ============================================================================
// Device - Requests
// ============================================================================

impl Device {
    /// Reads the identity record.
    ///
    /// # Errors
    ///
    /// Connection errors, or [`Error::Protocol`] for a truncated reply.
    pub async fn get_identity(&self) -> Result<Identity> {
        let reply = self.request(FUNCTION_GET_IDENTITY, Bytes::new()).await?;
        Identity::decode(reply)
    }

    /// Calls a function and returns a reader over the reply payload.
    pub(crate) async fn request(&self, function_id: u8, payload: Bytes) -> Result<PayloadReader> {
        let frame = Frame::new(self.inner.uid, function_id, payload)?;
        let response = self.connection()?.send_request(frame).await?;
        Ok(PayloadReader::new(response.payload))
    }

    /// Calls a setter, waiting only if its response-expected flag is set.
    pub(crate) async fn set(&self, function_id: u8, payload: Bytes) -> Result<()> {
        let frame = Frame::new(self.inner.uid, function_id, payload)?;
        let connection = self.connection()?;

        if self.response_expected(function_id)? {
            connection.send_request(frame).await.map(|_| ())
        } else {
            connection.send_fire_and_forget(frame)
        }
    }

    /// Registers a raw listener for one of this device's events.
    pub(crate) fn register_listener(&self, event_id: u8, listener: Listener) -> Result<()> {
        self.connection()?
            .registry()
            .register(self.inner.uid, event_id, listener);
        Ok(())
    }

    /// Removes the listener for an event.
    pub(crate) fn unregister_listener(&self, event_id: u8) -> Result<bool> {
        Ok(self
            .connection()?
            .registry()
            .unregister(self.inner.uid, event_id))
    }

    /// Upgrades the weak connection reference.
    fn connection(&self) -> Result<IpConnection> {
        self.inner
            .connection
            .upgrade()
            .map(IpConnection::from_inner)
            .ok_or(Error::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================
