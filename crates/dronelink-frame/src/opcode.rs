//! Operation codes.
//!
//! Commands flow client → flight controller; acknowledgements and telemetry
//! flow back. Telemetry kinds occupy 100-199.

/// Open a connection.
pub const START_CONNECTION: u16 = 300;

/// Connection accepted by the flight controller.
pub const CONNECTION_ACCEPTED: u16 = 301;

/// Close the connection.
pub const END_CONNECTION: u16 = 302;

/// Arm the motors.
pub const ARM: u16 = 220;

/// Disarm the motors.
pub const DISARM: u16 = 221;

/// Set the four radio-control axes. Echoed back by the flight controller.
pub const SET_RC: u16 = 200;

/// Ask the flight controller to start streaming telemetry.
pub const START_TELEMETRY: u16 = 120;

/// Telemetry stream accepted.
pub const TELEMETRY_ACCEPTED: u16 = 121;

/// Stop the telemetry stream.
pub const END_TELEMETRY: u16 = 122;

/// Raw accelerometer, gyroscope and magnetometer readings.
pub const RAW_IMU: u16 = 102;

/// Servo outputs.
pub const SERVO: u16 = 103;

/// Motor outputs.
pub const MOTOR: u16 = 104;

/// RC channel echo.
pub const RC: u16 = 105;

/// Attitude angles and heading.
pub const ATTITUDE: u16 = 108;

/// Estimated altitude and vertical speed.
pub const ALTITUDE: u16 = 109;

/// Returns a human-readable name for an operation code.
pub fn opcode_name(code: u16) -> &'static str {
    match code {
        START_CONNECTION => "START_CONNECTION",
        CONNECTION_ACCEPTED => "CONNECTION_ACCEPTED",
        END_CONNECTION => "END_CONNECTION",
        ARM => "ARM",
        DISARM => "DISARM",
        SET_RC => "SET_RC",
        START_TELEMETRY => "START_TELEMETRY",
        TELEMETRY_ACCEPTED => "TELEMETRY_ACCEPTED",
        END_TELEMETRY => "END_TELEMETRY",
        RAW_IMU => "RAW_IMU",
        SERVO => "SERVO",
        MOTOR => "MOTOR",
        RC => "RC",
        ATTITUDE => "ATTITUDE",
        ALTITUDE => "ALTITUDE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code is one of the known telemetry kinds.
pub fn is_telemetry(code: u16) -> bool {
    matches!(code, RAW_IMU | SERVO | MOTOR | RC | ATTITUDE | ALTITUDE)
}
