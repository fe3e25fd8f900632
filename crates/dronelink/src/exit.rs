use std::fmt;
use std::io;

use dronelink_frame::FrameError;
use dronelink_session::SessionError;
use dronelink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => TRANSPORT_ERROR,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::ChannelFailure(err) => transport_error(context, err),
        SessionError::Frame(FrameError::PayloadTooLarge { .. }) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SessionError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::HandshakeRejected(_) | SessionError::NotConnected { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeout_maps_to_timeout_code() {
        let err = session_error("connect failed", SessionError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn refused_channel_maps_to_transport_code() {
        let err = session_error(
            "set_rc failed",
            SessionError::ChannelFailure(TransportError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn rejection_maps_to_failure() {
        let err = session_error(
            "connect failed",
            SessionError::HandshakeRejected("expected 301".to_string()),
        );
        assert_eq!(err.code, FAILURE);
    }
}
