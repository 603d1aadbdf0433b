//! Line configuration, buffers and read event control.

use bytes::Bytes;
use tracing::debug;

use crate::error::Result;
use crate::protocol::PayloadWriter;

use super::Rs232V2;
use super::core::function;
use super::types::{BufferConfig, BufferStatus, Configuration};

// ============================================================================
// Rs232V2 - Read Event
// ============================================================================

impl Rs232V2 {
    /// Makes the bricklet push received data as read events.
    ///
    /// While enabled, [`read`](Self::read) returns nothing.
    pub async fn enable_read_callback(&self) -> Result<()> {
        debug!(uid = %self.uid(), "Enabling read callback");
        self.device
            .set(function::ENABLE_READ_CALLBACK, Bytes::new())
            .await
    }

    /// Stops read events. Data is buffered for [`read`](Self::read) again.
    pub async fn disable_read_callback(&self) -> Result<()> {
        debug!(uid = %self.uid(), "Disabling read callback");
        self.device
            .set(function::DISABLE_READ_CALLBACK, Bytes::new())
            .await
    }

    /// Returns whether read events are enabled.
    pub async fn is_read_callback_enabled(&self) -> Result<bool> {
        let mut reply = self
            .device
            .request(function::IS_READ_CALLBACK_ENABLED, Bytes::new())
            .await?;
        reply.bool()
    }
}

// ============================================================================
// Rs232V2 - Configuration
// ============================================================================

impl Rs232V2 {
    /// Sets the line parameters.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) before any
    /// I/O for a baudrate outside `100..=2_000_000`.
    pub async fn set_configuration(&self, configuration: Configuration) -> Result<()> {
        configuration.validate()?;
        debug!(uid = %self.uid(), ?configuration, "Setting configuration");

        self.device
            .set(function::SET_CONFIGURATION, configuration.encode())
            .await
    }

    /// Returns the line parameters.
    pub async fn get_configuration(&self) -> Result<Configuration> {
        let mut reply = self
            .device
            .request(function::GET_CONFIGURATION, Bytes::new())
            .await?;
        Configuration::decode(&mut reply)
    }

    /// Holds TX low for `break_time` milliseconds.
    pub async fn set_break_condition(&self, break_time: u16) -> Result<()> {
        let payload = PayloadWriter::new().u16(break_time).finish();
        self.device
            .set(function::SET_BREAK_CONDITION, payload)
            .await
    }
}

// ============================================================================
// Rs232V2 - Buffers
// ============================================================================

impl Rs232V2 {
    /// Splits the buffer memory between send and receive.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) before any
    /// I/O for an invalid split.
    pub async fn set_buffer_config(&self, config: BufferConfig) -> Result<()> {
        config.validate()?;
        debug!(uid = %self.uid(), ?config, "Setting buffer config");

        self.device
            .set(function::SET_BUFFER_CONFIG, config.encode())
            .await
    }

    /// Returns the buffer split.
    pub async fn get_buffer_config(&self) -> Result<BufferConfig> {
        let mut reply = self
            .device
            .request(function::GET_BUFFER_CONFIG, Bytes::new())
            .await?;
        BufferConfig::decode(&mut reply)
    }

    /// Returns the buffer fill levels.
    pub async fn get_buffer_status(&self) -> Result<BufferStatus> {
        let mut reply = self
            .device
            .request(function::GET_BUFFER_STATUS, Bytes::new())
            .await?;
        BufferStatus::decode(&mut reply)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::transport::IpConnection;

    #[tokio::test]
    async fn test_invalid_values_rejected_before_io() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        let configuration = Configuration {
            baudrate: 50,
            ..Configuration::default()
        };
        assert!(matches!(
            rs232.set_configuration(configuration).await,
            Err(Error::InvalidArgument { .. })
        ));

        let buffers = BufferConfig {
            send_buffer_size: 512,
            receive_buffer_size: 512,
        };
        assert!(matches!(
            rs232.set_buffer_config(buffers).await,
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_valid_values_reach_transport() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        assert!(matches!(
            rs232.set_configuration(Configuration::default()).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            rs232.enable_read_callback().await,
            Err(Error::ConnectionClosed)
        ));
    }
}
