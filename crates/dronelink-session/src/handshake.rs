//! Reply waiting for synchronous requests.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use dronelink_frame::{
    decode_segment,
    opcode::{is_telemetry, opcode_name},
    Segment,
};
use dronelink_transport::{DatagramChannel, TransportError};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// What to do with a reply that is not the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mismatch {
    /// Fail with `HandshakeRejected`. Telemetry segments still in flight
    /// from an earlier stream are skipped.
    Reject,
    /// Drop it and keep waiting until the deadline.
    Skip,
}

/// Read the channel directly until a segment with `expected` arrives.
///
/// Only valid while nothing else reads the channel.
pub(crate) fn await_reply<C: DatagramChannel + ?Sized>(
    channel: &C,
    buf: &mut [u8],
    expected: u16,
    timeout: Duration,
    on_mismatch: Mismatch,
) -> Result<Segment> {
    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(SessionError::Timeout(timeout));
        }

        let Some(n) = channel.recv(buf, deadline - now)? else {
            continue;
        };

        let segment = match decode_segment(&buf[..n]) {
            Ok(segment) => segment,
            Err(err) if on_mismatch == Mismatch::Reject => {
                return Err(SessionError::HandshakeRejected(format!(
                    "malformed reply to {}: {err}",
                    opcode_name(expected)
                )));
            }
            Err(err) => {
                warn!(%err, len = n, "dropping malformed reply");
                continue;
            }
        };

        if segment.code() == expected {
            return Ok(segment);
        }

        match on_mismatch {
            Mismatch::Reject if is_telemetry(segment.code()) => {
                debug!(
                    expected,
                    code = segment.code(),
                    "skipping stale telemetry while awaiting reply"
                );
            }
            Mismatch::Reject => {
                return Err(SessionError::HandshakeRejected(format!(
                    "expected {} ({expected}), got {} ({})",
                    opcode_name(expected),
                    opcode_name(segment.code()),
                    segment.code()
                )));
            }
            Mismatch::Skip => {
                debug!(
                    expected,
                    code = segment.code(),
                    "ignoring unrelated segment while awaiting reply"
                );
            }
        }
    }
}

/// Wait for the telemetry loop to route the expected reply.
pub(crate) fn await_routed(rx: &Receiver<Segment>, timeout: Duration) -> Result<Segment> {
    match rx.recv_timeout(timeout) {
        Ok(segment) => Ok(segment),
        Err(RecvTimeoutError::Timeout) => Err(SessionError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(SessionError::ChannelFailure(TransportError::Closed))
        }
    }
}
