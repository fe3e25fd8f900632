//! Segment codec for the dronelink flight-controller protocol.
//!
//! Every datagram carries exactly one segment:
//! - A 2-byte big-endian operation code
//! - A 2-byte big-endian payload size in bytes (always even)
//! - `size / 2` big-endian signed 16-bit payload elements
//!
//! Telemetry payloads can be projected into typed views ([`RawImu`],
//! [`Attitude`], ...) or classified as a whole through [`Telemetry`].

pub mod codec;
pub mod error;
pub mod opcode;
pub mod telemetry;

pub use codec::{decode_segment, encode_segment, Segment, DEFAULT_MAX_DATAGRAM, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use opcode::{
    ALTITUDE, ARM, ATTITUDE, CONNECTION_ACCEPTED, DISARM, END_CONNECTION, END_TELEMETRY, MOTOR,
    RAW_IMU, RC, SERVO, SET_RC, START_CONNECTION, START_TELEMETRY, TELEMETRY_ACCEPTED,
};
pub use telemetry::{Altitude, Attitude, Motor, Projection, RawImu, Rc, Servo, Telemetry};
