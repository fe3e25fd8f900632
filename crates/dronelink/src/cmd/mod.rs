use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use dronelink_session::{Client, SessionConfig};
use dronelink_transport::UdpChannel;
use tracing::info;

use crate::exit::{session_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod fly;
pub mod monitor;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a flight controller, report the result, and disconnect.
    Probe(ProbeArgs),
    /// Stream telemetry and print each decoded segment.
    Monitor(MonitorArgs),
    /// Run a scripted session: arm, send RC values on an interval, disarm.
    Fly(FlyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Fly(args) => fly::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Flight controller address (host:port).
    #[arg(env = "DRONELINK_ADDR")]
    pub addr: String,
    /// Local address to bind instead of an ephemeral port.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
    /// Handshake and reply timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N telemetry segments.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 30s).
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct FlyArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Roll channel value.
    #[arg(long, allow_hyphen_values = true)]
    pub roll: i16,
    /// Pitch channel value.
    #[arg(long, allow_hyphen_values = true)]
    pub pitch: i16,
    /// Yaw channel value.
    #[arg(long, allow_hyphen_values = true)]
    pub yaw: i16,
    /// Throttle channel value.
    #[arg(long, allow_hyphen_values = true)]
    pub throttle: i16,
    /// Time between RC updates.
    #[arg(long, default_value = "200ms")]
    pub interval: String,
    /// How long to keep sending RC updates.
    #[arg(long, default_value = "10s")]
    pub duration: String,
    /// Pause between arming and the first RC update.
    #[arg(long, default_value = "5s")]
    pub arm_delay: String,
    /// Stream and print telemetry while flying.
    #[arg(long)]
    pub telemetry: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a UDP channel per `args` and perform the connection handshake.
pub fn open_client(args: &ConnectArgs) -> CliResult<Client<UdpChannel>> {
    let timeout = parse_duration(&args.timeout)?;
    let remote = resolve_addr(&args.addr)?;
    let config = SessionConfig {
        handshake_timeout: timeout,
        reply_timeout: timeout,
        ..SessionConfig::default()
    };

    let channel = match args.bind {
        Some(local) => UdpChannel::connect_from(local, remote),
        None => UdpChannel::connect(remote),
    }
    .map_err(|err| transport_error("channel setup failed", err))?;

    let client =
        Client::with_config(channel, config).map_err(|err| session_error("invalid config", err))?;
    client
        .connect()
        .map_err(|err| session_error("connect failed", err))?;
    info!(%remote, "connected");
    Ok(client)
}

fn resolve_addr(input: &str) -> CliResult<SocketAddr> {
    input
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("invalid address {input}: {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("address {input} did not resolve")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Clear `running` on Ctrl-C.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
