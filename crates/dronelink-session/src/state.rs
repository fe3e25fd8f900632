use std::fmt;

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Handshaking,
    Connected,
    Closed,
}

/// Telemetry lifecycle within a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryPhase {
    Inactive,
    Requesting,
    Active,
    Stopping,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Handshaking => "handshaking",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Closed => "closed",
        })
    }
}

impl fmt::Display for TelemetryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TelemetryPhase::Inactive => "inactive",
            TelemetryPhase::Requesting => "requesting",
            TelemetryPhase::Active => "active",
            TelemetryPhase::Stopping => "stopping",
        })
    }
}
