//! Connect, arm, stream telemetry while sending RC values, then tear down.
//!
//! Run against the mock flight controller:
//!   cargo run --example mock-drone
//!   cargo run --example scripted-flight -- 127.0.0.1:4445

use std::thread;
use std::time::Duration;

use dronelink::frame::{Segment, Telemetry};
use dronelink::{Client, SessionConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let remote = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4445".to_string())
        .parse()?;

    let client = Client::connect_udp(remote, SessionConfig::default())?;
    eprintln!("Connected to {remote}");

    client.arm()?;
    thread::sleep(Duration::from_secs(1));

    client.start_telemetry(|segment: Segment| match Telemetry::try_from(&segment) {
        Ok(telemetry) => println!("{telemetry:?}"),
        Err(e) => eprintln!("Undecodable telemetry: {e}"),
    })?;

    for _ in 0..25 {
        let echo = client.set_rc(1502, 1500, 1500, 1200)?;
        eprintln!("RC echo {:?}", echo.payload());
        thread::sleep(Duration::from_millis(200));
    }

    client.disarm()?;
    client.stop_telemetry()?;
    client.close()?;
    eprintln!("Session closed");
    Ok(())
}
