use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use dronelink_frame::{Segment, Telemetry};
use dronelink_session::{SessionError, TelemetrySink};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, open_client, parse_duration, MonitorArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_telemetry, OutputFormat};

const WAKE_INTERVAL: Duration = Duration::from_millis(100);

enum Event {
    Segment(Segment),
    Failed(SessionError),
}

/// Forwards the stream to the printing thread.
struct ForwardingSink(Sender<Event>);

impl TelemetrySink for ForwardingSink {
    fn on_segment(&self, segment: Segment) {
        let _ = self.0.send(Event::Segment(segment));
    }

    fn on_error(&self, error: SessionError) {
        let _ = self.0.send(Event::Failed(error));
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|d| Instant::now() + d);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let client = open_client(&args.connect)?;
    let (tx, rx) = unbounded();
    client
        .start_telemetry(ForwardingSink(tx))
        .map_err(|err| session_error("start telemetry failed", err))?;

    let mut printed = 0usize;
    let mut failure = None;
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }

        match rx.recv_timeout(WAKE_INTERVAL) {
            Ok(Event::Segment(segment)) => match Telemetry::try_from(&segment) {
                Ok(telemetry) => {
                    print_telemetry(&telemetry, format);
                    printed = printed.saturating_add(1);
                }
                Err(err) => warn!(%err, code = segment.code(), "skipping undecodable telemetry"),
            },
            Ok(Event::Failed(err)) => {
                failure = Some(err);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(printed, stats = ?client.telemetry_stats(), "monitor finished");
    let closed = client.close();

    if let Some(err) = failure {
        return Err(session_error("telemetry failed", err));
    }
    closed.map_err(|err| session_error("close failed", err))?;
    Ok(SUCCESS)
}
