use std::time::Duration;

use dronelink_frame::{DEFAULT_MAX_DATAGRAM, HEADER_SIZE};

use crate::error::{Result, SessionError};

/// Configuration for a connection session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for the START_CONNECTION handshake.
    pub handshake_timeout: Duration,
    /// Deadline for every other synchronous reply (telemetry ack, RC echo).
    pub reply_timeout: Duration,
    /// Receive timeout of the telemetry loop between cancellation checks.
    pub poll_interval: Duration,
    /// Upper bound on waiting for the telemetry loop to exit.
    pub stop_timeout: Duration,
    /// Receive buffer size for one datagram.
    pub max_datagram_size: usize,
    /// Number of threads running the telemetry callback.
    pub dispatch_workers: usize,
    /// Segments queued for the callback before new ones are dropped.
    pub dispatch_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(1),
            reply_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(2),
            max_datagram_size: DEFAULT_MAX_DATAGRAM,
            dispatch_workers: 2,
            dispatch_queue_depth: 64,
        }
    }
}

impl SessionConfig {
    /// Check that every timeout is finite and non-zero and the pool can run.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("handshake_timeout", self.handshake_timeout),
            ("reply_timeout", self.reply_timeout),
            ("poll_interval", self.poll_interval),
            ("stop_timeout", self.stop_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if self.poll_interval >= self.stop_timeout {
            return Err(SessionError::InvalidConfig(format!(
                "poll_interval ({:?}) must be shorter than stop_timeout ({:?})",
                self.poll_interval, self.stop_timeout
            )));
        }

        if self.max_datagram_size < HEADER_SIZE {
            return Err(SessionError::InvalidConfig(format!(
                "max_datagram_size {} is smaller than the {HEADER_SIZE}-byte header",
                self.max_datagram_size
            )));
        }

        if self.dispatch_workers == 0 || self.dispatch_queue_depth == 0 {
            return Err(SessionError::InvalidConfig(
                "dispatch_workers and dispatch_queue_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = SessionConfig {
            reply_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig(msg) if msg.contains("reply_timeout")));
    }

    #[test]
    fn rejects_poll_interval_longer_than_stop_timeout() {
        let config = SessionConfig {
            poll_interval: Duration::from_secs(3),
            stop_timeout: Duration::from_secs(1),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_tiny_datagram_buffer_and_empty_pool() {
        let tiny = SessionConfig {
            max_datagram_size: 2,
            ..SessionConfig::default()
        };
        assert!(tiny.validate().is_err());

        let no_workers = SessionConfig {
            dispatch_workers: 0,
            ..SessionConfig::default()
        };
        assert!(no_workers.validate().is_err());
    }
}
