use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dronelink_frame::{Segment, Telemetry};
use dronelink_session::{Client, SessionError};
use dronelink_transport::UdpChannel;
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, open_client, parse_duration, FlyArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_telemetry, OutputFormat};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub fn run(args: FlyArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let duration = parse_duration(&args.duration)?;
    let arm_delay = parse_duration(&args.arm_delay)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let client = open_client(&args.connect)?;
    client.arm().map_err(|err| session_error("arm failed", err))?;
    info!(?arm_delay, "armed");

    let flown = fly(&client, &args, &running, arm_delay, interval, duration, format);

    // Teardown runs whatever happened in flight.
    let mut first_error = flown.err();
    if let Err(err) = client.disarm() {
        first_error.get_or_insert(session_error("disarm failed", err));
    }
    if let Err(err) = client.stop_telemetry() {
        first_error.get_or_insert(session_error("stop telemetry failed", err));
    }
    if let Err(err) = client.close() {
        first_error.get_or_insert(session_error("close failed", err));
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn fly(
    client: &Client<UdpChannel>,
    args: &FlyArgs,
    running: &AtomicBool,
    arm_delay: Duration,
    interval: Duration,
    duration: Duration,
    format: OutputFormat,
) -> CliResult<()> {
    sleep_while_running(running, arm_delay);

    if args.telemetry {
        client
            .start_telemetry(move |segment: Segment| {
                if let Ok(telemetry) = Telemetry::try_from(&segment) {
                    print_telemetry(&telemetry, format);
                }
            })
            .map_err(|err| session_error("start telemetry failed", err))?;
    }

    let end = Instant::now() + duration;
    let mut sent = 0u64;
    let mut missed = 0u64;
    while running.load(Ordering::SeqCst) && Instant::now() < end {
        match client.set_rc(args.roll, args.pitch, args.yaw, args.throttle) {
            Ok(echo) => {
                sent += 1;
                debug!(payload = ?echo.payload(), "rc echo");
            }
            // Datagrams are lossy; a missing echo does not end the flight.
            Err(SessionError::Timeout(timeout)) => {
                missed += 1;
                warn!(?timeout, "rc echo missing");
            }
            Err(err) => return Err(session_error("set_rc failed", err)),
        }
        sleep_while_running(running, interval);
    }

    info!(sent, missed, "flight finished");
    if sent == 0 && missed > 0 {
        return Err(CliError::new(TIMEOUT, "no rc echo received during flight"));
    }
    Ok(())
}

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let end = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= end {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(end - now));
    }
}
