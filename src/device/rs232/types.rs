//! Value types for the RS232 Bricklet 2.0.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{PayloadReader, PayloadWriter};

use super::stream::CHUNK_SIZE;

// ============================================================================
// Constants
// ============================================================================

/// Lowest supported baudrate.
pub const BAUDRATE_MIN: u32 = 100;

/// Highest supported baudrate.
pub const BAUDRATE_MAX: u32 = 2_000_000;

/// Total buffer memory shared by send and receive buffers.
pub const BUFFER_TOTAL_SIZE: u16 = 10_240;

/// Smallest allowed size of either buffer.
pub const BUFFER_MIN_SIZE: u16 = 1024;

// ============================================================================
// Enumerations
// ============================================================================

/// Generates a `u8` backed enum with checked decoding.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Returns the wire value.
            #[inline]
            #[must_use]
            pub const fn to_u8(self) -> u8 {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $(v if v == $value => Ok(Self::$variant),)+
                    other => Err(Error::protocol(format!(
                        concat!("Invalid ", stringify!($name), " value {}"),
                        other
                    ))),
                }
            }
        }
    };
}

wire_enum! {
    /// Parity bit mode.
    Parity {
        /// No parity bit.
        None = 0,
        /// Odd parity.
        Odd = 1,
        /// Even parity.
        Even = 2,
        /// Parity bit always 1.
        Forced1 = 3,
        /// Parity bit always 0.
        Forced0 = 4,
    }
}

wire_enum! {
    /// Number of stop bits.
    StopBits {
        /// One stop bit.
        One = 1,
        /// Two stop bits.
        Two = 2,
    }
}

wire_enum! {
    /// Data bits per character.
    WordLength {
        /// 5 bits.
        Five = 5,
        /// 6 bits.
        Six = 6,
        /// 7 bits.
        Seven = 7,
        /// 8 bits.
        Eight = 8,
    }
}

wire_enum! {
    /// Flow control mode.
    FlowControl {
        /// No flow control.
        Off = 0,
        /// XON/XOFF.
        Software = 1,
        /// RTS/CTS.
        Hardware = 2,
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Serial line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Baudrate in bit/s, `100..=2_000_000`.
    pub baudrate: u32,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits.
    pub stopbits: StopBits,
    /// Word length.
    pub wordlength: WordLength,
    /// Flow control.
    pub flowcontrol: FlowControl,
}

impl Default for Configuration {
    /// 115200 baud, 8N1, no flow control.
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            parity: Parity::None,
            stopbits: StopBits::One,
            wordlength: WordLength::Eight,
            flowcontrol: FlowControl::Off,
        }
    }
}

impl Configuration {
    /// Checks the baudrate range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the baudrate is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(BAUDRATE_MIN..=BAUDRATE_MAX).contains(&self.baudrate) {
            return Err(Error::invalid_argument(format!(
                "Baudrate {} outside {BAUDRATE_MIN}..={BAUDRATE_MAX}",
                self.baudrate
            )));
        }
        Ok(())
    }

    pub(crate) fn encode(&self) -> Bytes {
        PayloadWriter::new()
            .u32(self.baudrate)
            .u8(self.parity.to_u8())
            .u8(self.stopbits.to_u8())
            .u8(self.wordlength.to_u8())
            .u8(self.flowcontrol.to_u8())
            .finish()
    }

    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            baudrate: reader.u32()?,
            parity: Parity::try_from(reader.u8()?)?,
            stopbits: StopBits::try_from(reader.u8()?)?,
            wordlength: WordLength::try_from(reader.u8()?)?,
            flowcontrol: FlowControl::try_from(reader.u8()?)?,
        })
    }
}

// ============================================================================
// Buffers
// ============================================================================

/// Split of the 10 KiB buffer memory between send and receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Send buffer size in bytes.
    pub send_buffer_size: u16,
    /// Receive buffer size in bytes.
    pub receive_buffer_size: u16,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: BUFFER_TOTAL_SIZE / 2,
            receive_buffer_size: BUFFER_TOTAL_SIZE / 2,
        }
    }
}

impl BufferConfig {
    /// Checks minimum sizes and the shared total.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either buffer is below 1024 bytes
    /// or both together exceed 10240 bytes.
    pub fn validate(&self) -> Result<()> {
        if self.send_buffer_size < BUFFER_MIN_SIZE || self.receive_buffer_size < BUFFER_MIN_SIZE {
            return Err(Error::invalid_argument(format!(
                "Buffer sizes must be at least {BUFFER_MIN_SIZE} bytes"
            )));
        }

        let total = u32::from(self.send_buffer_size) + u32::from(self.receive_buffer_size);
        if total > u32::from(BUFFER_TOTAL_SIZE) {
            return Err(Error::invalid_argument(format!(
                "Buffer sizes add up to {total}, maximum is {BUFFER_TOTAL_SIZE}"
            )));
        }
        Ok(())
    }

    pub(crate) fn encode(&self) -> Bytes {
        PayloadWriter::new()
            .u16(self.send_buffer_size)
            .u16(self.receive_buffer_size)
            .finish()
    }

    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            send_buffer_size: reader.u16()?,
            receive_buffer_size: reader.u16()?,
        })
    }
}

/// Current buffer fill levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStatus {
    /// Bytes waiting to be sent.
    pub send_buffer_used: u16,
    /// Bytes received but not yet read.
    pub receive_buffer_used: u16,
}

impl BufferStatus {
    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            send_buffer_used: reader.u16()?,
            receive_buffer_used: reader.u16()?,
        })
    }
}

// ============================================================================
// ReadChunk
// ============================================================================

/// One chunk of a longer message, as sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    /// Total length of the message this chunk belongs to.
    pub message_length: u16,
    /// Position of this chunk within the message.
    pub chunk_offset: u16,
    /// Raw chunk field. Bytes past the message end are padding.
    pub chunk_data: Bytes,
}

impl ReadChunk {
    pub(crate) fn decode(reader: &mut PayloadReader) -> Result<Self> {
        Ok(Self {
            message_length: reader.u16()?,
            chunk_offset: reader.u16()?,
            chunk_data: reader.bytes(CHUNK_SIZE)?,
        })
    }
}

// ============================================================================
// Rs232Error
// ============================================================================

/// Line error reported by the error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rs232Error {
    /// Receive buffer overrun, data was lost.
    Overrun,
    /// Parity check failed.
    Parity,
    /// Framing error (missing stop bit).
    Framing,
    /// Code not known to this client.
    Unknown(u8),
}

impl From<u8> for Rs232Error {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Overrun,
            1 => Self::Parity,
            2 => Self::Framing,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Rs232Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overrun => f.write_str("overrun"),
            Self::Parity => f.write_str("parity error"),
            Self::Framing => f.write_str("framing error"),
            Self::Unknown(code) => write!(f, "unknown error {code}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
