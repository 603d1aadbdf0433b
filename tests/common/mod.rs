//! In-process stand-in for brickd with one RS232 Bricklet 2.0 attached.
//!
//! The bricklet has RX bridged to TX: written bytes come back either as read
//! events (when enabled) or through `read_low_level`.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Once;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tfp_client::protocol::{PayloadReader, PayloadWriter};
use tfp_client::{ErrorCode, Frame, FrameCodec, Uid};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Uid of the simulated bricklet.
pub const UID: &str = "XYZ";

const CHUNK: usize = 60;

// ============================================================================
// Logging
// ============================================================================

static LOGGING: Once = Once::new();

/// Installs a test subscriber once per binary, filtered by `RUST_LOG`.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// FakeBrickd
// ============================================================================

/// Starts the daemon on an ephemeral port. Each accepted connection gets a
/// fresh bricklet.
pub async fn spawn() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });

    addr
}

async fn serve(stream: TcpStream) {
    let uid = Uid::parse(UID).expect("uid").as_u32();
    let mut framed = Framed::new(stream, FrameCodec);
    let mut bricklet = Bricklet::default();

    while let Some(Ok(request)) = framed.next().await {
        // Other devices are not attached.
        if request.header.uid != uid {
            continue;
        }

        for frame in bricklet.handle(&request) {
            if framed.send(frame).await.is_err() {
                return;
            }
        }
    }
}

// ============================================================================
// Bricklet
// ============================================================================

struct Bricklet {
    read_callback_enabled: bool,
    configuration: Bytes,
    buffer_config: (u16, u16),
    incoming: Vec<u8>,
    received: Vec<u8>,
    reading: Option<(Vec<u8>, usize)>,
}

impl Default for Bricklet {
    fn default() -> Self {
        Self {
            read_callback_enabled: false,
            configuration: PayloadWriter::new()
                .u32(115_200)
                .u8(0)
                .u8(1)
                .u8(8)
                .u8(0)
                .finish(),
            buffer_config: (5120, 5120),
            incoming: Vec::new(),
            received: Vec::new(),
            reading: None,
        }
    }
}

impl Bricklet {
    /// Returns the frames to send back for `request`.
    fn handle(&mut self, request: &Frame) -> Vec<Frame> {
        let mut reader = PayloadReader::new(request.payload.clone());
        let mut out = Vec::new();
        let mut events = Vec::new();

        let reply = match request.function_id() {
            1 => {
                let message_length = usize::from(reader.u16().expect("length"));
                let offset = usize::from(reader.u16().expect("offset"));
                let chunk = reader.bytes(CHUNK).expect("chunk");

                if offset == 0 {
                    self.incoming.clear();
                }
                let take = message_length.saturating_sub(offset).min(CHUNK);
                self.incoming.extend_from_slice(&chunk[..take]);

                if self.incoming.len() >= message_length {
                    let message = std::mem::take(&mut self.incoming);
                    if self.read_callback_enabled {
                        events = self.read_events(request.header.uid, &message);
                    } else {
                        self.received.extend_from_slice(&message);
                    }
                }

                Some(PayloadWriter::new().u8(take as u8).finish())
            }
            2 => Some(self.read_low_level(reader.u16().expect("length"))),
            3 => {
                self.read_callback_enabled = true;
                Some(Bytes::new())
            }
            4 => {
                self.read_callback_enabled = false;
                Some(Bytes::new())
            }
            5 => Some(PayloadWriter::new().bool(self.read_callback_enabled).finish()),
            6 => {
                self.configuration = request.payload.clone();
                Some(Bytes::new())
            }
            7 => Some(self.configuration.clone()),
            8 => Some(Bytes::new()),
            9 => {
                self.buffer_config = (reader.u16().expect("send"), reader.u16().expect("recv"));
                Some(Bytes::new())
            }
            10 => Some(
                PayloadWriter::new()
                    .u16(self.buffer_config.0)
                    .u16(self.buffer_config.1)
                    .finish(),
            ),
            11 => Some(
                PayloadWriter::new()
                    .u16(0)
                    .u16(self.received.len() as u16)
                    .finish(),
            ),
            255 => Some(
                PayloadWriter::new()
                    .padded(UID.as_bytes(), 8)
                    .padded(b"6abc", 8)
                    .u8(b'c')
                    .u8(1)
                    .u8(0)
                    .u8(0)
                    .u8(2)
                    .u8(0)
                    .u8(6)
                    .u16(2108)
                    .finish(),
            ),
            _ => None,
        };

        match reply {
            Some(payload) if request.header.response_expected => {
                out.push(request.reply(ErrorCode::Ok, payload).expect("reply"));
            }
            Some(_) => {}
            None => {
                out.push(
                    request
                        .reply(ErrorCode::FunctionNotSupported, Bytes::new())
                        .expect("reply"),
                );
            }
        }

        out.extend(events);
        out
    }

    /// Splits `message` into read events.
    fn read_events(&self, uid: u32, message: &[u8]) -> Vec<Frame> {
        let length = message.len() as u16;
        if message.is_empty() {
            return vec![read_event(uid, 0, 0, &[])];
        }

        message
            .chunks(CHUNK)
            .enumerate()
            .map(|(index, chunk)| read_event(uid, length, (index * CHUNK) as u16, chunk))
            .collect()
    }

    fn read_low_level(&mut self, length: u16) -> Bytes {
        let (message, offset) = self.reading.take().unwrap_or_else(|| {
            let take = usize::from(length).min(self.received.len());
            (self.received.drain(..take).collect(), 0)
        });

        let end = (offset + CHUNK).min(message.len());
        let payload = PayloadWriter::new()
            .u16(message.len() as u16)
            .u16(offset as u16)
            .padded(&message[offset..end], CHUNK)
            .finish();

        if end < message.len() {
            self.reading = Some((message, end));
        }
        payload
    }
}

fn read_event(uid: u32, length: u16, offset: u16, chunk: &[u8]) -> Frame {
    let payload = PayloadWriter::new()
        .u16(length)
        .u16(offset)
        .padded(chunk, CHUNK)
        .finish();
    Frame::with_raw_uid(uid, 12, payload).expect("event")
}
