use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dronelink_frame::{decode_segment, opcode::is_telemetry, opcode::opcode_name, Segment};
use dronelink_transport::DatagramChannel;
use tracing::{debug, error, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::pool::DispatchPool;
use crate::router::ReplyRouter;

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Consumer of the telemetry stream.
///
/// `on_segment` runs on a pool thread; calls for successive segments may
/// complete in any order. It must not block indefinitely and must not call
/// back into the owning [`Client`](crate::Client), which is locked while
/// telemetry stops.
pub trait TelemetrySink: Send + Sync + 'static {
    /// Called once per received segment, including unknown codes.
    fn on_segment(&self, segment: Segment);

    /// Called once on the receive thread when the channel fails. The stream
    /// has ended by the time this returns.
    fn on_error(&self, error: SessionError) {
        error!(%error, "telemetry stream terminated");
    }
}

impl<F> TelemetrySink for F
where
    F: Fn(Segment) + Send + Sync + 'static,
{
    fn on_segment(&self, segment: Segment) {
        self(segment)
    }
}

#[derive(Debug, Default)]
struct DispatchStats {
    received: AtomicU64,
    dispatched: AtomicU64,
    replies: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of telemetry loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounters {
    /// Datagrams read from the channel.
    pub received: u64,
    /// Segments queued for the telemetry sink.
    pub dispatched: u64,
    /// Segments delivered to a waiting synchronous request.
    pub replies: u64,
    /// Datagrams dropped because they failed to decode.
    pub malformed: u64,
    /// Segments dropped because the dispatch queue was full.
    pub dropped: u64,
}

impl DispatchStats {
    fn snapshot(&self) -> DispatchCounters {
        DispatchCounters {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Background receive loop for one active telemetry phase.
pub(crate) struct TelemetryDispatcher {
    stop: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryDispatcher {
    /// Start the receive loop on its own thread.
    ///
    /// The loop holds a clone of `channel` only until it exits.
    pub(crate) fn spawn<C: DatagramChannel>(
        channel: Arc<C>,
        router: Arc<ReplyRouter>,
        sink: Arc<dyn TelemetrySink>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let pool = DispatchPool::start(
            Arc::clone(&sink),
            config.dispatch_workers,
            config.dispatch_queue_depth,
        )?;

        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(DispatchStats::default());
        let receive = ReceiveLoop {
            channel,
            router,
            sink,
            pool,
            stop: Arc::clone(&stop),
            stats: Arc::clone(&stats),
            poll_interval: config.poll_interval,
            buf: vec![0u8; config.max_datagram_size],
        };

        let handle = thread::Builder::new()
            .name("dronelink-telemetry".to_string())
            .spawn(move || receive.run())
            .map_err(|err| SessionError::Spawn("telemetry", err))?;

        Ok(Self {
            stop,
            stats,
            handle: Some(handle),
        })
    }

    /// Ask the loop to exit after its current receive attempt.
    pub(crate) fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// True while the receive thread has not exited.
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn counters(&self) -> DispatchCounters {
        self.stats.snapshot()
    }

    /// Wait up to `timeout` for the loop to exit.
    ///
    /// On timeout the thread is left to finish on its own; it observes the
    /// stop flag within one poll interval.
    pub(crate) fn join(mut self, timeout: Duration) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return Err(SessionError::ShutdownFailed(format!(
                    "telemetry loop did not exit within {timeout:?}"
                )));
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        handle.join().map_err(|_| {
            SessionError::ShutdownFailed("telemetry loop panicked".to_string())
        })
    }
}

impl Drop for TelemetryDispatcher {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

struct ReceiveLoop<C> {
    channel: Arc<C>,
    router: Arc<ReplyRouter>,
    sink: Arc<dyn TelemetrySink>,
    pool: DispatchPool,
    stop: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
    poll_interval: Duration,
    buf: Vec<u8>,
}

impl<C: DatagramChannel> ReceiveLoop<C> {
    fn run(mut self) {
        debug!("telemetry loop started");

        while !self.stop.load(Ordering::Acquire) {
            let received = match self.channel.recv(&mut self.buf, self.poll_interval) {
                Ok(Some(n)) => n,
                Ok(None) => continue,
                Err(err) => {
                    error!(%err, "telemetry receive failed");
                    self.router.close();
                    self.sink.on_error(SessionError::ChannelFailure(err));
                    break;
                }
            };
            self.stats.received.fetch_add(1, Ordering::Relaxed);

            let segment = match decode_segment(&self.buf[..received]) {
                Ok(segment) => segment,
                Err(err) => {
                    self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(%err, len = received, "dropping malformed telemetry datagram");
                    continue;
                }
            };

            let Some(segment) = self.router.offer(segment) else {
                self.stats.replies.fetch_add(1, Ordering::Relaxed);
                continue;
            };

            let code = segment.code();
            if !is_telemetry(code) {
                debug!(code, "dispatching segment with unrecognized code");
            }
            match self.pool.submit(segment) {
                Ok(()) => {
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        code,
                        kind = opcode_name(code),
                        "dispatch queue full; dropping segment"
                    );
                }
            }
        }

        self.router.close();
        self.pool.shutdown();
        debug!(stats = ?self.stats.snapshot(), "telemetry loop exited");
    }
}
