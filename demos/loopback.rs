//! RS232 loopback through a brick daemon.
//!
//! Demonstrates:
//! - Connecting to brickd
//! - Registering a read callback on an RS232 Bricklet 2.0
//! - Writing text that comes back through the callback
//!
//! Requires a bricklet with RX and TX bridged. Set UID below.
//!
//! Usage:
//!   cargo run --example loopback
//!   cargo run --example loopback -- --no-wait
//!   cargo run --example loopback -- --debug

// ============================================================================
// Imports
// ============================================================================

use tfp_client::{Configuration, IpConnection, Result, Rs232V2};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const ADDR: &str = "localhost:4223";
const UID: &str = "XYZ";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug = args.iter().any(|a| a == "--debug");
    let no_wait = args.iter().any(|a| a == "--no-wait");

    let filter = if debug {
        "tfp_client=debug"
    } else {
        "tfp_client=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    if let Err(e) = run(no_wait).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(no_wait: bool) -> Result<()> {
    println!("=== RS232 Loopback ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting to {ADDR}...");

    let ipcon = IpConnection::new();
    let rs232 = Rs232V2::new(UID, &ipcon)?;
    ipcon.connect(ADDR).await?;

    let identity = rs232.get_identity().await?;
    println!(
        "    ✓ Found {} at position {} (firmware {:?})\n",
        identity.uid, identity.position, identity.firmware_version
    );

    // ========================================================================
    // Configure
    // ========================================================================

    println!("[2] Configuring 115200 8N1...");
    rs232.set_configuration(Configuration::default()).await?;
    println!("    ✓ {:?}\n", rs232.get_configuration().await?);

    // ========================================================================
    // Loopback
    // ========================================================================

    println!("[3] Registering read callback...");
    rs232.register_read_callback(|message| println!("    Message: {message:?}"))?;
    rs232.enable_read_callback().await?;

    let written = rs232.write("test").await?;
    println!("    ✓ Wrote {written} bytes\n");

    // ========================================================================
    // Wait
    // ========================================================================

    if no_wait {
        println!("[--no-wait] Skipping wait");
    } else {
        println!("Press Ctrl+C to exit...");
        tokio::signal::ctrl_c().await?;
    }

    rs232.disable_read_callback().await?;
    ipcon.disconnect().await;

    println!("\n=== Done ===");
    Ok(())
}
