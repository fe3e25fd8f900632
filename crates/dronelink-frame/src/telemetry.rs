//! Typed views over telemetry payloads.
//!
//! Each projection fixes the index-to-field mapping of one telemetry kind.
//! Values are raw flight-controller units; no physical conversion happens here.

use serde::Serialize;

use crate::codec::Segment;
use crate::error::{FrameError, Result};
use crate::opcode::{ALTITUDE, ATTITUDE, MOTOR, RAW_IMU, RC, SERVO};

/// A fixed-shape projection of one telemetry kind.
pub trait Projection: Sized {
    /// Operation code carrying this projection.
    const CODE: u16;
    /// Minimum number of payload elements.
    const LEN: usize;
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Build the projection from payload elements already known to be long enough.
    fn from_elements(payload: &[i16]) -> Self;

    /// Build the projection from a payload, rejecting short payloads.
    fn from_payload(payload: &[i16]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(FrameError::PayloadTooShort {
                kind: Self::NAME,
                expected: Self::LEN,
                actual: payload.len(),
            });
        }
        Ok(Self::from_elements(payload))
    }

    /// Build the projection from a segment whose code must be [`Self::CODE`].
    fn from_segment(segment: &Segment) -> Result<Self> {
        if segment.code() != Self::CODE {
            return Err(FrameError::UnsupportedSegment(segment.code()));
        }
        Self::from_payload(segment.payload())
    }
}

/// Raw IMU sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawImu {
    pub acc_x: i16,
    pub acc_y: i16,
    pub acc_z: i16,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
    pub mag_x: i16,
    pub mag_y: i16,
    pub mag_z: i16,
}

impl Projection for RawImu {
    const CODE: u16 = RAW_IMU;
    const LEN: usize = 9;
    const NAME: &'static str = "RAW_IMU";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            acc_x: p[0],
            acc_y: p[1],
            acc_z: p[2],
            gyro_x: p[3],
            gyro_y: p[4],
            gyro_z: p[5],
            mag_x: p[6],
            mag_y: p[7],
            mag_z: p[8],
        }
    }
}

/// Attitude angles and compass heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attitude {
    pub angle_x: i16,
    pub angle_y: i16,
    pub heading: i16,
}

impl Projection for Attitude {
    const CODE: u16 = ATTITUDE;
    const LEN: usize = 3;
    const NAME: &'static str = "ATTITUDE";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            angle_x: p[0],
            angle_y: p[1],
            heading: p[2],
        }
    }
}

/// RC channel values as seen by the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rc {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub throttle: i16,
}

impl Projection for Rc {
    const CODE: u16 = RC;
    const LEN: usize = 4;
    const NAME: &'static str = "RC";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            roll: p[0],
            pitch: p[1],
            yaw: p[2],
            throttle: p[3],
        }
    }
}

/// Estimated altitude and vertical speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Altitude {
    pub estimated: i16,
    pub vario: i16,
}

impl Projection for Altitude {
    const CODE: u16 = ALTITUDE;
    const LEN: usize = 2;
    const NAME: &'static str = "ALTITUDE";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            estimated: p[0],
            vario: p[1],
        }
    }
}

/// Motor outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Motor {
    pub motors: [i16; 4],
}

impl Projection for Motor {
    const CODE: u16 = MOTOR;
    const LEN: usize = 4;
    const NAME: &'static str = "MOTOR";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            motors: [p[0], p[1], p[2], p[3]],
        }
    }
}

/// Servo outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Servo {
    pub servos: [i16; 4],
}

impl Projection for Servo {
    const CODE: u16 = SERVO;
    const LEN: usize = 4;
    const NAME: &'static str = "SERVO";

    fn from_elements(p: &[i16]) -> Self {
        Self {
            servos: [p[0], p[1], p[2], p[3]],
        }
    }
}

/// A decoded telemetry segment, classified by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Telemetry {
    RawImu(RawImu),
    Servo(Servo),
    Motor(Motor),
    Rc(Rc),
    Attitude(Attitude),
    Altitude(Altitude),
    /// A code outside the known telemetry kinds, passed through untouched.
    Unknown(Segment),
}

impl Telemetry {
    /// The operation code this telemetry came from.
    pub fn code(&self) -> u16 {
        match self {
            Telemetry::RawImu(_) => RawImu::CODE,
            Telemetry::Servo(_) => Servo::CODE,
            Telemetry::Motor(_) => Motor::CODE,
            Telemetry::Rc(_) => Rc::CODE,
            Telemetry::Attitude(_) => Attitude::CODE,
            Telemetry::Altitude(_) => Altitude::CODE,
            Telemetry::Unknown(segment) => segment.code(),
        }
    }

    /// Kind name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Telemetry::RawImu(_) => RawImu::NAME,
            Telemetry::Servo(_) => Servo::NAME,
            Telemetry::Motor(_) => Motor::NAME,
            Telemetry::Rc(_) => Rc::NAME,
            Telemetry::Attitude(_) => Attitude::NAME,
            Telemetry::Altitude(_) => Altitude::NAME,
            Telemetry::Unknown(_) => "UNKNOWN",
        }
    }

    /// Reject [`Telemetry::Unknown`] with [`FrameError::UnsupportedSegment`].
    pub fn into_known(self) -> Result<Self> {
        match self {
            Telemetry::Unknown(segment) => Err(FrameError::UnsupportedSegment(segment.code())),
            known => Ok(known),
        }
    }
}

impl TryFrom<&Segment> for Telemetry {
    type Error = FrameError;

    fn try_from(segment: &Segment) -> Result<Self> {
        let payload = segment.payload();
        Ok(match segment.code() {
            RAW_IMU => Telemetry::RawImu(RawImu::from_payload(payload)?),
            SERVO => Telemetry::Servo(Servo::from_payload(payload)?),
            MOTOR => Telemetry::Motor(Motor::from_payload(payload)?),
            RC => Telemetry::Rc(Rc::from_payload(payload)?),
            ATTITUDE => Telemetry::Attitude(Attitude::from_payload(payload)?),
            ALTITUDE => Telemetry::Altitude(Altitude::from_payload(payload)?),
            _ => Telemetry::Unknown(segment.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::SET_RC;

    #[test]
    fn raw_imu_index_mapping() {
        let segment = Segment::new(RAW_IMU, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let imu = RawImu::from_segment(&segment).unwrap();
        assert_eq!((imu.acc_x, imu.acc_y, imu.acc_z), (1, 2, 3));
        assert_eq!((imu.gyro_x, imu.gyro_y, imu.gyro_z), (4, 5, 6));
        assert_eq!((imu.mag_x, imu.mag_y, imu.mag_z), (7, 8, 9));
    }

    #[test]
    fn short_payload_is_an_error() {
        let err = RawImu::from_payload(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooShort {
                kind: "RAW_IMU",
                expected: 9,
                actual: 3
            }
        ));

        let err = Telemetry::try_from(&Segment::new(ALTITUDE, vec![10])).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooShort { .. }));
    }

    #[test]
    fn longer_payload_uses_leading_elements() {
        let altitude = Altitude::from_payload(&[120, -4, 99]).unwrap();
        assert_eq!(altitude, Altitude { estimated: 120, vario: -4 });
    }

    #[test]
    fn mismatched_code_is_unsupported() {
        let segment = Segment::new(MOTOR, vec![1000, 1000, 1000, 1000]);
        let err = Servo::from_segment(&segment).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedSegment(MOTOR)));
    }

    #[test]
    fn classify_known_kinds() {
        let cases = [
            (Segment::new(ATTITUDE, vec![15, -30, 270]), "ATTITUDE"),
            (Segment::new(RC, vec![1500, 1500, 1500, 1000]), "RC"),
            (Segment::new(MOTOR, vec![1100, 1100, 1100, 1100]), "MOTOR"),
            (Segment::new(SERVO, vec![1500, 1500, 1500, 1500]), "SERVO"),
        ];
        for (segment, name) in cases {
            let telemetry = Telemetry::try_from(&segment).unwrap();
            assert_eq!(telemetry.name(), name);
            assert_eq!(telemetry.code(), segment.code());
        }

        let rc = Telemetry::try_from(&Segment::new(RC, vec![1, 2, 3, 4])).unwrap();
        assert_eq!(
            rc,
            Telemetry::Rc(Rc {
                roll: 1,
                pitch: 2,
                yaw: 3,
                throttle: 4
            })
        );
    }

    #[test]
    fn unknown_code_passes_through() {
        let segment = Segment::new(SET_RC, vec![1500]);
        let telemetry = Telemetry::try_from(&segment).unwrap();
        assert_eq!(telemetry, Telemetry::Unknown(segment));
        assert_eq!(telemetry.code(), SET_RC);

        let err = telemetry.into_known().unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedSegment(SET_RC)));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let telemetry = Telemetry::Attitude(Attitude {
            angle_x: 1,
            angle_y: 2,
            heading: 90,
        });
        let json = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(json["kind"], "attitude");
        assert_eq!(json["data"]["heading"], 90);
    }
}
