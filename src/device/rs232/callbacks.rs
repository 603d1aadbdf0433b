//! Read and error event listeners.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{PayloadReader, latin1_decode};

use super::Rs232V2;
use super::core::function;
use super::stream::{ChunkAssembler, ChunkOutcome};
use super::types::{ReadChunk, Rs232Error};

// ============================================================================
// Rs232V2 - Callbacks
// ============================================================================

impl Rs232V2 {
    /// Registers `callback` for received messages.
    ///
    /// Read events arrive in chunks. They are joined here and `callback` runs
    /// once per complete message. Nothing arrives until
    /// [`enable_read_callback`](Self::enable_read_callback) is called.
    /// Replaces any earlier read callback.
    ///
    /// A chunk that does not continue the current message drops the partial
    /// message and is reported to the connection's error sink.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the connection was dropped.
    pub fn register_read_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let assembler = Mutex::new(ChunkAssembler::new());

        let listener = move |payload: Bytes| -> Result<()> {
            let chunk = ReadChunk::decode(&mut PayloadReader::new(payload))?;

            let outcome = assembler.lock().push(
                chunk.message_length,
                chunk.chunk_offset,
                &chunk.chunk_data,
            );

            match outcome {
                ChunkOutcome::Complete(data) => {
                    callback(latin1_decode(&data));
                    Ok(())
                }
                ChunkOutcome::Pending => Ok(()),
                ChunkOutcome::OutOfSync {
                    expected_offset,
                    chunk_offset,
                } => Err(Error::protocol(format!(
                    "Read event out of sync: expected offset {expected_offset}, got {chunk_offset}"
                ))),
            }
        };

        debug!(uid = %self.uid(), "Read callback registered");
        self.device
            .register_listener(function::CALLBACK_READ_LOW_LEVEL, Arc::new(listener))
    }

    /// Removes the read callback. Returns whether one was registered.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the connection was dropped.
    pub fn unregister_read_callback(&self) -> Result<bool> {
        self.device
            .unregister_listener(function::CALLBACK_READ_LOW_LEVEL)
    }

    /// Registers `callback` for line errors. Replaces any earlier one.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the connection was dropped.
    pub fn register_error_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Rs232Error) + Send + Sync + 'static,
    {
        let listener = move |payload: Bytes| -> Result<()> {
            let code = PayloadReader::new(payload).u8()?;
            callback(Rs232Error::from(code));
            Ok(())
        };

        debug!(uid = %self.uid(), "Error callback registered");
        self.device
            .register_listener(function::CALLBACK_ERROR, Arc::new(listener))
    }

    /// Removes the error callback. Returns whether one was registered.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the connection was dropped.
    pub fn unregister_error_callback(&self) -> Result<bool> {
        self.device.unregister_listener(function::CALLBACK_ERROR)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::protocol::{Frame, PayloadWriter};
    use crate::transport::IpConnection;

    fn read_event(rs232: &Rs232V2, length: u16, offset: u16, data: &[u8]) -> Frame {
        let payload = PayloadWriter::new()
            .u16(length)
            .u16(offset)
            .padded(data, 60)
            .finish();
        Frame::new(rs232.uid(), function::CALLBACK_READ_LOW_LEVEL, payload).expect("frame")
    }

    #[test]
    fn test_read_callback_joins_chunks() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        rs232
            .register_read_callback(move |message| sink.lock().push(message))
            .expect("register");

        let text: String = "0123456789".repeat(7);
        let bytes = text.as_bytes();

        assert!(ipcon.registry().dispatch(read_event(&rs232, 70, 0, &bytes[..60])));
        assert!(received.lock().is_empty());
        assert!(ipcon.registry().dispatch(read_event(&rs232, 70, 60, &bytes[60..])));

        assert_eq!(*received.lock(), vec![text]);
    }

    #[test]
    fn test_read_callback_out_of_sync_goes_to_sink() {
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let ipcon = IpConnection::builder()
            .error_sink(move |error: Error| {
                assert!(matches!(error, Error::Callback { function_id: 12, .. }));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("build");
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        rs232
            .register_read_callback(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .expect("register");

        ipcon.registry().dispatch(read_event(&rs232, 70, 60, b"late"));
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        // Recovers on the next message start.
        ipcon.registry().dispatch(read_event(&rs232, 2, 0, b"hi"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_callback() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        rs232
            .register_error_callback(move |error| *slot.lock() = Some(error))
            .expect("register");

        let frame = Frame::new(rs232.uid(), function::CALLBACK_ERROR, vec![1u8]).expect("frame");
        ipcon.registry().dispatch(frame);
        assert_eq!(*seen.lock(), Some(Rs232Error::Parity));

        assert!(rs232.unregister_error_callback().expect("unregister"));
        assert!(!rs232.unregister_error_callback().expect("unregister"));
    }

    #[test]
    fn test_unregister_read_callback() {
        let ipcon = IpConnection::new();
        let rs232 = Rs232V2::new("XYZ", &ipcon).expect("proxy");

        rs232.register_read_callback(|_| {}).expect("register");
        assert!(rs232.unregister_read_callback().expect("unregister"));
        assert!(!ipcon.registry().dispatch(read_event(&rs232, 1, 0, b"x")));
    }
}
