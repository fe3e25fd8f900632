//! Connection management for a dronelink flight controller.
//!
//! [`Client`] is the entry point: connect, arm, send RC values, and stream
//! telemetry into a callback. Underneath, [`ConnectionSession`] runs the
//! handshake state machine and owns the channel, while a background
//! dispatcher receives telemetry and correlates replies to pending requests.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
mod handshake;
mod pool;
mod router;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;

pub use client::Client;
pub use config::SessionConfig;
pub use dispatcher::{DispatchCounters, TelemetrySink};
pub use error::{Result, SessionError};
pub use session::ConnectionSession;
pub use state::{ConnectionPhase, TelemetryPhase};
