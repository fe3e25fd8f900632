use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dronelink_frame::Segment;
use dronelink_transport::{DatagramChannel, UdpChannel};
use tracing::info;

use crate::config::SessionConfig;
use crate::dispatcher::{DispatchCounters, TelemetrySink};
use crate::error::Result;
use crate::session::ConnectionSession;
use crate::state::{ConnectionPhase, TelemetryPhase};

/// Thread-safe handle to one flight controller.
///
/// Every operation locks the underlying [`ConnectionSession`], so requests
/// from different threads are serialized and each reply reaches the caller
/// that asked for it. Telemetry callbacks run on pool threads and must not
/// call back into the client.
pub struct Client<C: DatagramChannel> {
    session: Mutex<ConnectionSession<C>>,
}

impl Client<UdpChannel> {
    /// Open a UDP channel to `remote` and perform the connection handshake.
    pub fn connect_udp(remote: SocketAddr, config: SessionConfig) -> Result<Self> {
        let channel = UdpChannel::connect(remote)?;
        info!(%remote, local = ?channel.local_addr().ok(), "udp channel open");
        let client = Self::with_config(channel, config)?;
        client.connect()?;
        Ok(client)
    }
}

impl<C: DatagramChannel> Client<C> {
    /// Wrap `channel` with default configuration. Call [`connect`](Self::connect) next.
    pub fn new(channel: C) -> Self {
        Self {
            session: Mutex::new(ConnectionSession::new(channel)),
        }
    }

    pub fn with_config(channel: C, config: SessionConfig) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(ConnectionSession::with_config(channel, config)?),
        })
    }

    pub fn connect(&self) -> Result<()> {
        self.lock().connect()
    }

    /// End the connection but keep the channel for a later `connect`.
    pub fn disconnect(&self) -> Result<()> {
        self.lock().disconnect()
    }

    pub fn arm(&self) -> Result<()> {
        self.lock().arm()
    }

    pub fn disarm(&self) -> Result<()> {
        self.lock().disarm()
    }

    /// Send RC axis values; returns the flight controller's echo.
    pub fn set_rc(&self, roll: i16, pitch: i16, yaw: i16, throttle: i16) -> Result<Segment> {
        self.lock().set_rc(roll, pitch, yaw, throttle)
    }

    /// Start streaming telemetry into `sink`. A no-op if already active.
    pub fn start_telemetry<S: TelemetrySink>(&self, sink: S) -> Result<()> {
        self.lock().start_telemetry(sink)
    }

    pub fn stop_telemetry(&self) -> Result<()> {
        self.lock().stop_telemetry()
    }

    /// Stop telemetry, end the connection, and release the channel.
    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.lock().connection_phase()
    }

    pub fn telemetry_phase(&self) -> TelemetryPhase {
        self.lock().telemetry_phase()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn telemetry_stats(&self) -> Option<DispatchCounters> {
        self.lock().telemetry_stats()
    }

    /// Consume the client and return the session.
    pub fn into_session(self) -> ConnectionSession<C> {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panic while holding the lock leaves the session in a consistent
    // phase, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, ConnectionSession<C>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: DatagramChannel> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.lock();
        f.debug_struct("Client")
            .field("connection", &session.connection_phase())
            .field("telemetry", &session.telemetry_phase())
            .finish()
    }
}
