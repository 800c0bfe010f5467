mod cmd;
mod config;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "controlino", version, about = "controlino controller link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Link configuration file (JSON).
    #[arg(long, value_name = "FILE", env = "CONTROLINO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = config::load(cli.config.as_deref())
        .and_then(|config| cmd::run(cli.command, format, &config));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_subcommand_with_widths() {
        let cli = Cli::try_parse_from([
            "controlino",
            "decode",
            "capture.bin",
            "--width",
            "1=16,2=32",
            "--chunk-size",
            "3",
        ])
        .expect("decode args should parse");

        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.frame.widths.len(), 2);
                assert_eq!(args.chunk_size, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_block_width() {
        let err = Cli::try_parse_from(["controlino", "decode", "-", "--width", "1=12"])
            .expect_err("12-bit width should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn encode_keeps_negative_params() {
        let cli = Cli::try_parse_from(["controlino", "encode", "CH:WRITE", "A0", "-5"])
            .expect("encode args should parse");
        match cli.command {
            Command::Encode(args) => assert_eq!(args.params, ["A0", "-5"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn parses_monitor_channels_and_global_config() {
        let cli = Cli::try_parse_from([
            "controlino",
            "monitor",
            "/tmp/controller.sock",
            "--channel",
            "A0:10,A1:5",
            "--count",
            "4",
            "--config",
            "link.json",
        ])
        .expect("monitor args should parse");

        assert_eq!(cli.config, Some(PathBuf::from("link.json")));
        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.channels.len(), 2);
                assert_eq!(args.channels[1].rate, 5);
                assert_eq!(args.count, Some(4));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
