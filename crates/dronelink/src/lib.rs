//! Client for the dronelink flight-controller protocol over UDP.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected datagram channel abstraction and its UDP implementation
//! - [`frame`]: segment codec, operation codes, and typed telemetry views
//! - [`session`]: connection state machine, telemetry dispatch, and the [`Client`] facade
//!
//! ```no_run
//! use dronelink::{Client, SessionConfig};
//! use dronelink::frame::{Segment, Telemetry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect_udp("127.0.0.1:4445".parse()?, SessionConfig::default())?;
//! client.arm()?;
//! client.start_telemetry(|segment: Segment| {
//!     if let Ok(telemetry) = Telemetry::try_from(&segment) {
//!         println!("{telemetry:?}");
//!     }
//! })?;
//! client.set_rc(1500, 1500, 1500, 1100)?;
//! client.disarm()?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use dronelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dronelink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use dronelink_session::*;
}

pub use dronelink_session::{Client, SessionConfig, SessionError};
