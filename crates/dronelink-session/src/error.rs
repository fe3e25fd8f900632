use std::time::Duration;

use crate::state::ConnectionPhase;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// I/O failure on the underlying channel.
    #[error("channel failure: {0}")]
    ChannelFailure(#[from] dronelink_transport::TransportError),

    /// Segment encoding or decoding failed.
    #[error("frame error: {0}")]
    Frame(#[from] dronelink_frame::FrameError),

    /// The peer answered a handshake with something other than the expected ack.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// No matching reply arrived in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The operation is not valid in the current connection phase.
    #[error("{operation} not allowed while {phase}")]
    NotConnected {
        operation: &'static str,
        phase: ConnectionPhase,
    },

    /// One or more teardown steps failed.
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),

    /// A background worker thread could not be started.
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),

    /// The session configuration is unusable.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
