use std::time::Instant;

use serde::Serialize;

use crate::cmd::{open_client, ProbeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ProbeOutput {
    addr: String,
    connected: bool,
    phase: String,
    handshake_ms: f64,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let start = Instant::now();
    let client = open_client(&args.connect)?;
    let handshake_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = ProbeOutput {
        addr: args.connect.addr.clone(),
        connected: client.is_connected(),
        phase: client.connection_phase().to_string(),
        handshake_ms,
    };

    client
        .close()
        .map_err(|err| session_error("close failed", err))?;

    print_probe(&out, format);
    Ok(SUCCESS)
}

fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Flight controller:");
            println!("  Address:    {}", out.addr);
            println!("  Phase:      {}", out.phase);
            println!("  Handshake:  {:.2}ms", out.handshake_ms);
        }
    }
}
