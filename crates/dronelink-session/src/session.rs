use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use dronelink_frame::{
    encode_segment, opcode::opcode_name, Segment, ARM, CONNECTION_ACCEPTED, DISARM,
    END_CONNECTION, END_TELEMETRY, SET_RC, START_CONNECTION, START_TELEMETRY, TELEMETRY_ACCEPTED,
};
use dronelink_transport::{DatagramChannel, TransportError};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::{DispatchCounters, TelemetryDispatcher, TelemetrySink};
use crate::error::{Result, SessionError};
use crate::handshake::{await_reply, await_routed, Mismatch};
use crate::router::ReplyRouter;
use crate::state::{ConnectionPhase, TelemetryPhase};

/// One connection to a flight controller over an exclusively owned channel.
///
/// All operations take `&mut self`, so at most one synchronous request is in
/// flight per session. While telemetry is active the background dispatcher
/// is the only reader of the channel and hands replies to pending requests
/// through a reply router; otherwise requests read the channel directly.
pub struct ConnectionSession<C: DatagramChannel> {
    channel: Option<Arc<C>>,
    config: SessionConfig,
    connection: ConnectionPhase,
    telemetry: TelemetryPhase,
    dispatcher: Option<TelemetryDispatcher>,
    router: Option<Arc<ReplyRouter>>,
    send_buf: BytesMut,
    recv_buf: Vec<u8>,
}

impl<C: DatagramChannel> ConnectionSession<C> {
    /// Create a session with default configuration.
    pub fn new(channel: C) -> Self {
        Self::build(channel, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(channel: C, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(channel, config))
    }

    fn build(channel: C, config: SessionConfig) -> Self {
        let recv_buf = vec![0u8; config.max_datagram_size];
        Self {
            channel: Some(Arc::new(channel)),
            config,
            connection: ConnectionPhase::Disconnected,
            telemetry: TelemetryPhase::Inactive,
            dispatcher: None,
            router: None,
            send_buf: BytesMut::with_capacity(64),
            recv_buf,
        }
    }

    /// Perform the START_CONNECTION handshake.
    pub fn connect(&mut self) -> Result<()> {
        if self.connection != ConnectionPhase::Disconnected {
            return Err(SessionError::NotConnected {
                operation: "connect",
                phase: self.connection,
            });
        }

        self.connection = ConnectionPhase::Handshaking;
        let timeout = self.config.handshake_timeout;
        let result = self.request(
            &Segment::command(START_CONNECTION),
            CONNECTION_ACCEPTED,
            timeout,
            Mismatch::Reject,
        );

        match result {
            Ok(_) => {
                self.connection = ConnectionPhase::Connected;
                info!("connected to flight controller");
                Ok(())
            }
            Err(err) => {
                self.connection = ConnectionPhase::Disconnected;
                warn!(%err, "connection handshake failed");
                Err(err)
            }
        }
    }

    /// Arm the motors. No acknowledgement is expected.
    pub fn arm(&mut self) -> Result<()> {
        self.ensure_connected("arm")?;
        self.send_segment(&Segment::command(ARM))?;
        info!("arm sent");
        Ok(())
    }

    /// Disarm the motors. No acknowledgement is expected.
    pub fn disarm(&mut self) -> Result<()> {
        self.ensure_connected("disarm")?;
        self.send_segment(&Segment::command(DISARM))?;
        info!("disarm sent");
        Ok(())
    }

    /// Send RC axis values and wait for the flight controller's echo.
    ///
    /// The echo is returned as received; its payload is not compared with the
    /// request.
    pub fn set_rc(&mut self, roll: i16, pitch: i16, yaw: i16, throttle: i16) -> Result<Segment> {
        self.ensure_connected("set_rc")?;
        let timeout = self.config.reply_timeout;
        let segment = Segment::new(SET_RC, vec![roll, pitch, yaw, throttle]);
        self.request(&segment, SET_RC, timeout, Mismatch::Skip)
    }

    /// Request the telemetry stream and start dispatching it into `sink`.
    ///
    /// Returns immediately if telemetry is already active; `sink` is then
    /// dropped and the existing one stays registered.
    pub fn start_telemetry<S: TelemetrySink>(&mut self, sink: S) -> Result<()> {
        self.ensure_connected("start_telemetry")?;
        if self.telemetry == TelemetryPhase::Active {
            debug!("telemetry already active");
            return Ok(());
        }

        self.telemetry = TelemetryPhase::Requesting;
        let timeout = self.config.reply_timeout;
        if let Err(err) = self.request(
            &Segment::command(START_TELEMETRY),
            TELEMETRY_ACCEPTED,
            timeout,
            Mismatch::Reject,
        ) {
            self.telemetry = TelemetryPhase::Inactive;
            warn!(%err, "telemetry request failed");
            return Err(err);
        }

        let channel = Arc::clone(self.channel_ref("start_telemetry")?);
        let router = Arc::new(ReplyRouter::new());
        let spawned =
            TelemetryDispatcher::spawn(channel, Arc::clone(&router), Arc::new(sink), &self.config);

        match spawned {
            Ok(dispatcher) => {
                self.dispatcher = Some(dispatcher);
                self.router = Some(router);
                self.telemetry = TelemetryPhase::Active;
                info!("telemetry active");
                Ok(())
            }
            Err(err) => {
                self.telemetry = TelemetryPhase::Inactive;
                if let Err(send_err) = self.send_segment(&Segment::command(END_TELEMETRY)) {
                    warn!(%send_err, "failed to cancel telemetry after spawn failure");
                }
                Err(err)
            }
        }
    }

    /// Stop the telemetry stream and wait for the receive loop to exit.
    ///
    /// No-op when telemetry is not active. The loop is stopped even if the
    /// END_TELEMETRY send fails; that failure is returned afterwards.
    pub fn stop_telemetry(&mut self) -> Result<()> {
        let Some(dispatcher) = self.dispatcher.take() else {
            self.telemetry = TelemetryPhase::Inactive;
            return Ok(());
        };

        self.telemetry = TelemetryPhase::Stopping;
        let sent = self.send_segment(&Segment::command(END_TELEMETRY));
        if let Err(err) = &sent {
            warn!(%err, "failed to send END_TELEMETRY");
        }

        dispatcher.signal_stop();
        let joined = dispatcher.join(self.config.stop_timeout);
        if let Some(router) = self.router.take() {
            router.close();
        }
        self.telemetry = TelemetryPhase::Inactive;
        info!("telemetry stopped");

        sent.and(joined)
    }

    /// Stop telemetry and end the connection, keeping the channel for a
    /// later [`connect`](Self::connect).
    pub fn disconnect(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        self.end_connection(&mut failures);
        into_teardown_result(failures)
    }

    /// Tear the session down and release the channel.
    ///
    /// Every step is attempted even if an earlier one fails. Closing an
    /// already closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.connection == ConnectionPhase::Closed {
            return Ok(());
        }

        let mut failures = Vec::new();
        self.end_connection(&mut failures);
        self.channel.take();
        self.connection = ConnectionPhase::Closed;
        info!("session closed");
        into_teardown_result(failures)
    }

    /// Current connection phase.
    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection
    }

    /// Current telemetry phase.
    pub fn telemetry_phase(&self) -> TelemetryPhase {
        self.telemetry
    }

    /// True once the connection handshake has succeeded.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionPhase::Connected
    }

    /// Counters of the running telemetry loop, if any.
    pub fn telemetry_stats(&self) -> Option<DispatchCounters> {
        self.dispatcher.as_ref().map(TelemetryDispatcher::counters)
    }

    /// True if telemetry is active but its receive loop has ended, which
    /// happens after a channel failure.
    pub fn telemetry_failed(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(|d| !d.is_running())
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The channel, until the session is closed.
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_deref()
    }

    fn end_connection(&mut self, failures: &mut Vec<String>) {
        if let Err(err) = self.stop_telemetry() {
            failures.push(format!("stop telemetry: {err}"));
        }
        if self.connection == ConnectionPhase::Connected {
            if let Err(err) = self.send_segment(&Segment::command(END_CONNECTION)) {
                failures.push(format!("end connection: {err}"));
            }
            self.connection = ConnectionPhase::Disconnected;
            info!("disconnected from flight controller");
        }
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        if self.connection == ConnectionPhase::Connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected {
                operation,
                phase: self.connection,
            })
        }
    }

    fn channel_ref(&self, operation: &'static str) -> Result<&Arc<C>> {
        self.channel.as_ref().ok_or(SessionError::NotConnected {
            operation,
            phase: self.connection,
        })
    }

    fn send_segment(&mut self, segment: &Segment) -> Result<()> {
        let Some(channel) = self.channel.as_ref() else {
            return Err(SessionError::ChannelFailure(TransportError::Closed));
        };
        self.send_buf.clear();
        encode_segment(segment.code(), segment.payload(), &mut self.send_buf)?;
        channel.send(&self.send_buf)?;
        debug!(
            code = segment.code(),
            kind = opcode_name(segment.code()),
            size = segment.size(),
            "segment sent"
        );
        Ok(())
    }

    fn request(
        &mut self,
        segment: &Segment,
        expected: u16,
        timeout: Duration,
        on_mismatch: Mismatch,
    ) -> Result<Segment> {
        if let Some(router) = self.router.clone() {
            let rx = router.register(expected)?;
            if let Err(err) = self.send_segment(segment) {
                router.cancel(expected);
                return Err(err);
            }
            let reply = await_routed(&rx, timeout);
            router.cancel(expected);
            return reply;
        }

        self.send_segment(segment)?;
        let Some(channel) = self.channel.as_ref() else {
            return Err(SessionError::ChannelFailure(TransportError::Closed));
        };
        await_reply(
            channel.as_ref(),
            &mut self.recv_buf,
            expected,
            timeout,
            on_mismatch,
        )
    }
}

impl<C: DatagramChannel> Drop for ConnectionSession<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(%err, "session teardown reported failures");
        }
    }
}

impl<C: DatagramChannel + std::fmt::Debug> std::fmt::Debug for ConnectionSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("channel", &self.channel)
            .field("connection", &self.connection)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

fn into_teardown_result(failures: Vec<String>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(SessionError::ShutdownFailed(failures.join("; ")))
    }
}
