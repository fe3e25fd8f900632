use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dronelink_frame::Telemetry;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct TelemetryOutput<'a> {
    code: u16,
    name: &'a str,
    timestamp_ms: u128,
    telemetry: &'a Telemetry,
}

pub fn print_telemetry(telemetry: &Telemetry, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = TelemetryOutput {
                code: telemetry.code(),
                name: telemetry.name(),
                timestamp_ms: now_unix_millis(),
                telemetry,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let fields = telemetry_fields(telemetry);
            let mut header = vec!["KIND".to_string(), "CODE".to_string()];
            header.extend(fields.iter().map(|(name, _)| name.to_uppercase()));
            let mut row = vec![telemetry.name().to_string(), telemetry.code().to_string()];
            row.extend(fields.iter().map(|(_, value)| value.to_string()));

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let values = telemetry_fields(telemetry)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{} ({}) {values}", telemetry.name(), telemetry.code());
        }
    }
}

/// Field names and raw values in wire order.
pub fn telemetry_fields(telemetry: &Telemetry) -> Vec<(String, i16)> {
    let named = |pairs: &[(&str, i16)]| {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect::<Vec<_>>()
    };
    let indexed = |prefix: &str, values: &[i16]| {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| (format!("{prefix}{}", i + 1), *value))
            .collect::<Vec<_>>()
    };

    match telemetry {
        Telemetry::RawImu(imu) => named(&[
            ("acc_x", imu.acc_x),
            ("acc_y", imu.acc_y),
            ("acc_z", imu.acc_z),
            ("gyro_x", imu.gyro_x),
            ("gyro_y", imu.gyro_y),
            ("gyro_z", imu.gyro_z),
            ("mag_x", imu.mag_x),
            ("mag_y", imu.mag_y),
            ("mag_z", imu.mag_z),
        ]),
        Telemetry::Attitude(att) => named(&[
            ("angle_x", att.angle_x),
            ("angle_y", att.angle_y),
            ("heading", att.heading),
        ]),
        Telemetry::Rc(rc) => named(&[
            ("roll", rc.roll),
            ("pitch", rc.pitch),
            ("yaw", rc.yaw),
            ("throttle", rc.throttle),
        ]),
        Telemetry::Altitude(alt) => named(&[("estimated", alt.estimated), ("vario", alt.vario)]),
        Telemetry::Motor(motor) => indexed("motor", &motor.motors),
        Telemetry::Servo(servo) => indexed("servo", &servo.servos),
        Telemetry::Unknown(segment) => indexed("v", segment.payload()),
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
