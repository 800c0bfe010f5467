use std::io::Read;

use bytes::BytesMut;
use controlino_frame::PacketDecoder;
use controlino_link::LinkConfig;
use tracing::{debug, info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_packets, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat, config: &LinkConfig) -> CliResult<i32> {
    let mut frame = config.frame.clone();
    args.frame.apply(&mut frame);

    let raw = read_input(&args)?;
    let bytes = if args.hex { parse_hex(&raw)? } else { raw };

    let chunk_size = match args.chunk_size {
        Some(0) => return Err(CliError::new(USAGE, "chunk size must be greater than zero")),
        Some(n) => n,
        None => bytes.len().max(1),
    };

    let decoder = PacketDecoder::with_config(frame);
    let mut buf = BytesMut::new();
    let mut packets = Vec::new();
    for chunk in bytes.chunks(chunk_size) {
        buf.extend_from_slice(chunk);
        packets.extend(decoder.ingest(&mut buf));
    }

    if !buf.is_empty() {
        warn!(
            leftover = buf.len(),
            "capture ends inside a packet or marker"
        );
    }
    info!(
        input_bytes = bytes.len(),
        packets = packets.len(),
        "decoded capture"
    );

    print_packets(&packets, format);
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if args.input.as_os_str() == "-" {
        let mut raw = Vec::new();
        std::io::stdin()
            .read_to_end(&mut raw)
            .map_err(|err| io_error("reading stdin", err))?;
        return Ok(raw);
    }
    debug!(path = %args.input.display(), "reading capture");
    std::fs::read(&args.input)
        .map_err(|err| io_error(&format!("reading {}", args.input.display()), err))
}

/// Parse hex text such as `A5 A5 A5 A5 01 00 0B`. Whitespace between or
/// inside byte pairs is ignored.
fn parse_hex(text: &[u8]) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    hex::decode(digits)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))
}
