//! RS232 Bricklet 2.0 proxy.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Proxy struct, function ids, response-expected table |
//! | `io` | Chunked write and read |
//! | `config` | Line parameters, buffers, read event switch |
//! | `callbacks` | Read and error event listeners |
//! | `stream` | Chunk reassembly |
//! | `types` | Value types |
//!
//! # Example
//!
//! ```no_run
//! use tfp_client::{IpConnection, Result, Rs232V2};
//!
//! # async fn example() -> Result<()> {
//! let ipcon = IpConnection::new();
//! let rs232 = Rs232V2::new("XYZ", &ipcon)?;
//! ipcon.connect("localhost:4223").await?;
//!
//! rs232.register_read_callback(|message| println!("Message: {message}"))?;
//! rs232.enable_read_callback().await?;
//! rs232.write("test").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod callbacks;
mod config;
mod core;
mod io;
mod stream;
mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{DEVICE_DISPLAY_NAME, DEVICE_IDENTIFIER, Rs232V2, function};
pub use stream::{CHUNK_SIZE, ChunkAssembler, ChunkOutcome};
pub use types::{
    BAUDRATE_MAX, BAUDRATE_MIN, BUFFER_MIN_SIZE, BUFFER_TOTAL_SIZE, BufferConfig, BufferStatus,
    Configuration, FlowControl, Parity, ReadChunk, Rs232Error, StopBits, WordLength,
};
