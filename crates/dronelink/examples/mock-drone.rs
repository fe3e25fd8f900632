//! A stand-in flight controller for trying the client without hardware.
//!
//! Run with:
//!   cargo run --example mock-drone -- 127.0.0.1:4445
//!
//! In another terminal:
//!   cargo run --features cli -- monitor 127.0.0.1:4445 --count 10

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use dronelink::frame::{
    decode_segment, Segment, ALTITUDE, ATTITUDE, CONNECTION_ACCEPTED, END_CONNECTION,
    END_TELEMETRY, MOTOR, RAW_IMU, RC, SET_RC, START_CONNECTION, START_TELEMETRY,
    TELEMETRY_ACCEPTED,
};

const TELEMETRY_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4445".to_string());
    let socket = UdpSocket::bind(&bind)?;
    socket.set_read_timeout(Some(Duration::from_millis(20)))?;
    eprintln!("Flight controller listening on {}", socket.local_addr()?);

    let mut client: Option<SocketAddr> = None;
    let mut streaming = false;
    let mut rc = [1500i16, 1500, 1500, 1000];
    let mut tick: i16 = 0;
    let mut last_sent = Instant::now();
    let mut buf = [0u8; 512];

    loop {
        if let Ok((n, from)) = socket.recv_from(&mut buf) {
            let segment = match decode_segment(&buf[..n]) {
                Ok(segment) => segment,
                Err(e) => {
                    eprintln!("Dropping datagram from {from}: {e}");
                    continue;
                }
            };
            eprintln!("Received code {} from {from}", segment.code());

            let reply = match segment.code() {
                START_CONNECTION => {
                    client = Some(from);
                    Some(Segment::command(CONNECTION_ACCEPTED))
                }
                START_TELEMETRY => {
                    streaming = true;
                    Some(Segment::command(TELEMETRY_ACCEPTED))
                }
                END_TELEMETRY => {
                    streaming = false;
                    None
                }
                END_CONNECTION => {
                    streaming = false;
                    client = None;
                    None
                }
                SET_RC => {
                    if let [roll, pitch, yaw, throttle, ..] = segment.payload() {
                        rc = [*roll, *pitch, *yaw, *throttle];
                    }
                    Some(segment.clone())
                }
                _ => None,
            };
            if let Some(reply) = reply {
                socket.send_to(&reply.to_bytes()?, from)?;
            }
        }

        let Some(to) = client else {
            continue;
        };
        if streaming && last_sent.elapsed() >= TELEMETRY_INTERVAL {
            tick = tick.wrapping_add(1);
            let heading = tick.rem_euclid(360);
            let motor = rc[3];
            let frames = [
                Segment::new(
                    ATTITUDE,
                    vec![rc[0].wrapping_sub(1500), rc[1].wrapping_sub(1500), heading],
                ),
                Segment::new(ALTITUDE, vec![tick % 50, 0]),
                Segment::new(RC, rc.to_vec()),
                Segment::new(MOTOR, vec![motor; 4]),
                Segment::new(RAW_IMU, vec![0, 0, 512, 0, 0, 0, 120, -40, 300]),
            ];
            for frame in frames {
                socket.send_to(&frame.to_bytes()?, to)?;
            }
            last_sent = Instant::now();
        }
    }
}
