use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use controlino_frame::{ElementWidth, FrameConfig};
use controlino_link::{Channel, LinkConfig};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
#[cfg(unix)]
pub mod monitor;
#[cfg(unix)]
pub mod ping;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode packets from a captured byte stream.
    Decode(DecodeArgs),
    /// Encode a command line as it is sent to a controller.
    Encode(EncodeArgs),
    /// Check that a controller answers ping.
    #[cfg(unix)]
    Ping(PingArgs),
    /// Start acquisition and print incoming data packets.
    #[cfg(unix)]
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: &LinkConfig) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format, config),
        Command::Encode(args) => encode::run(args, format),
        #[cfg(unix)]
        Command::Ping(args) => ping::run(args, format, config),
        #[cfg(unix)]
        Command::Monitor(args) => monitor::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

/// Decoder settings that override the loaded link config.
#[derive(Args, Debug, Default)]
pub struct FrameArgs {
    /// Element width for a data block, as ID=BITS (comma-separated).
    #[arg(long = "width", value_name = "ID=BITS", value_delimiter = ',', value_parser = parse_block_width)]
    pub widths: Vec<(u8, ElementWidth)>,
    /// Element width in bits for blocks without an explicit --width.
    #[arg(long, value_name = "BITS", value_parser = parse_element_width)]
    pub default_width: Option<ElementWidth>,
    /// Largest declared packet length accepted before resynchronizing.
    #[arg(long, value_name = "BYTES")]
    pub max_packet_size: Option<usize>,
}

impl FrameArgs {
    pub fn apply(&self, frame: &mut FrameConfig) {
        if let Some(width) = self.default_width {
            frame.widths.default_width = width;
        }
        for &(block_id, width) in &self.widths {
            frame.widths.blocks.insert(block_id, width);
        }
        if let Some(max) = self.max_packet_size {
            frame.max_packet_size = max;
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to decode ("-" reads stdin).
    pub input: PathBuf,
    /// Input is hex text; whitespace is ignored.
    #[arg(long)]
    pub hex: bool,
    /// Feed the decoder N bytes at a time.
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command name (e.g. PING, ACQUIRE:START, CH:WRITE).
    pub name: String,
    /// Command parameters.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub params: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Socket path of the controller link.
    pub path: PathBuf,
    /// Number of pings to send.
    #[arg(long, default_value = "1")]
    pub count: u32,
    /// Delay between pings (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Nominal data packet rate; sets the reply timeout.
    #[arg(long, value_name = "HZ")]
    pub rate_hz: Option<u32>,
    /// How long to keep retrying the connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "2s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Socket path of the controller link.
    pub path: PathBuf,
    /// Input channel to register before acquiring, as ID:RATE (comma-separated).
    #[arg(long = "channel", value_name = "ID:RATE", value_delimiter = ',', value_parser = parse_channel_spec)]
    pub channels: Vec<ChannelSpec>,
    /// Exit after receiving N data packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Do not ping the controller before starting acquisition.
    #[arg(long)]
    pub skip_ping: bool,
    /// How long to keep retrying the connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "2s")]
    pub connect_timeout: String,
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// An input channel named on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: String,
    pub rate: u32,
}

impl Channel for ChannelSpec {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn sampling_rate(&self) -> u32 {
        self.rate
    }
}

pub fn parse_element_width(input: &str) -> Result<ElementWidth, String> {
    let bits: u32 = input
        .trim()
        .trim_start_matches(['u', 'U'])
        .parse()
        .map_err(|_| format!("invalid element width: {input}"))?;
    ElementWidth::from_bits(bits)
        .ok_or_else(|| format!("element width must be 8, 16, 32 or 64 bits, got {bits}"))
}

pub fn parse_block_width(input: &str) -> Result<(u8, ElementWidth), String> {
    let (id, bits) = input
        .split_once('=')
        .ok_or_else(|| format!("expected ID=BITS, got {input}"))?;
    let id: u8 = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid block id: {id}"))?;
    Ok((id, parse_element_width(bits)?))
}

pub fn parse_channel_spec(input: &str) -> Result<ChannelSpec, String> {
    let (id, rate) = input
        .rsplit_once(':')
        .ok_or_else(|| format!("expected ID:RATE, got {input}"))?;
    let id = id.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(format!("invalid channel id: {id:?}"));
    }
    let rate: u32 = rate
        .trim()
        .parse()
        .map_err(|_| format!("invalid sampling rate: {rate}"))?;
    Ok(ChannelSpec {
        id: id.to_string(),
        rate,
    })
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

#[cfg(unix)]
pub use link::{connect_link, install_ctrlc_handler};

#[cfg(unix)]
mod link {
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use controlino_transport::{uds, StreamTransport, TransportError};

    use crate::exit::{transport_error, CliError, CliResult, INTERNAL, TIMEOUT};

    /// Connect to a controller link, retrying while the socket is missing or
    /// not yet accepting.
    pub fn connect_link(
        path: &Path,
        timeout: Duration,
    ) -> CliResult<(UnixStream, StreamTransport<UnixStream>)> {
        let start = Instant::now();
        loop {
            match uds::connect(path) {
                Ok(link) => return Ok(link),
                Err(err) => {
                    if !is_retryable_connect_error(&err) {
                        return Err(transport_error("connect failed", err));
                    }
                    if start.elapsed() >= timeout {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("connect timed out after {timeout:?}"),
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn is_retryable_connect_error(err: &TransportError) -> bool {
        match err {
            TransportError::Connect { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
                    || source.kind() == std::io::ErrorKind::ConnectionRefused
            }
            _ => false,
        }
    }

    pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
    }
}
