use std::io::{IsTerminal, Write};

use bytes::BytesMut;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use controlino_frame::{
    encode_data_packet, encode_string_packet, Command, DataPacket, Packet, Result as FrameResult,
};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

/// Print decoded packets.
///
/// JSON and pretty output emit one line per packet. Table output collects
/// every packet into one table. Raw output re-encodes each packet, which
/// yields a clean capture with the noise between packets removed.
pub fn print_packets(packets: &[Packet], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for packet in packets {
                println!(
                    "{}",
                    serde_json::to_string(packet).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "TIMESTAMP (ms)", "BLOCK", "WIDTH", "VALUES"]);
            for packet in packets {
                match packet {
                    Packet::Data(data) if data.data_blocks.is_empty() => {
                        table.add_row(vec![
                            "data".to_string(),
                            data.relative_start_timestamp_ms.to_string(),
                            "-".to_string(),
                            "-".to_string(),
                            String::new(),
                        ]);
                    }
                    Packet::Data(data) => {
                        for block in &data.data_blocks {
                            table.add_row(vec![
                                "data".to_string(),
                                data.relative_start_timestamp_ms.to_string(),
                                block.block_id.to_string(),
                                width_name(block.values.width().size()),
                                join_values(&block.values.to_u64_vec()),
                            ]);
                        }
                    }
                    Packet::String(reply) => {
                        table.add_row(vec![
                            "string".to_string(),
                            "-".to_string(),
                            "-".to_string(),
                            "-".to_string(),
                            reply.text.clone(),
                        ]);
                    }
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for packet in packets {
                println!("{}", pretty_packet(packet));
            }
        }
        OutputFormat::Raw => {
            let mut wire = BytesMut::new();
            for packet in packets {
                if let Err(err) = encode_packet(packet, &mut wire) {
                    tracing::warn!(error = %err, "failed re-encoding packet");
                }
            }
            print_raw(&wire);
        }
    }
}

pub fn print_data_packet(packet: &DataPacket, format: OutputFormat) {
    print_packets(&[Packet::Data(packet.clone())], format);
}

#[derive(Serialize)]
struct CommandOutput {
    command: String,
    wire: String,
    hex: String,
    size: usize,
}

/// Print an encoded command line.
pub fn print_command(command: &Command, format: OutputFormat) {
    let wire = command.encode();
    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                command: command.to_string(),
                wire: escape_wire(&wire),
                hex: hex::encode_upper(&wire),
                size: wire.len(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SIZE", "HEX"])
                .add_row(vec![
                    escape_wire(&wire),
                    wire.len().to_string(),
                    hex::encode_upper(&wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", escape_wire(&wire)),
        OutputFormat::Raw => print_raw(&wire),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> FrameResult<()> {
    match packet {
        Packet::Data(data) => encode_data_packet(data, dst),
        Packet::String(reply) => encode_string_packet(&reply.text, dst),
    }
}

fn pretty_packet(packet: &Packet) -> String {
    match packet {
        Packet::Data(data) => {
            let mut line = format!(
                "data t={}ms blocks={}",
                data.relative_start_timestamp_ms,
                data.data_blocks.len()
            );
            for block in &data.data_blocks {
                line.push_str(&format!(
                    " [{}:{} {}]",
                    block.block_id,
                    width_name(block.values.width().size()),
                    join_values(&block.values.to_u64_vec())
                ));
            }
            line
        }
        Packet::String(reply) => format!("string {:?}", reply.text),
    }
}

fn width_name(size: usize) -> String {
    format!("u{}", size * 8)
}

fn join_values(values: &[u64]) -> String {
    values
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_wire(wire: &[u8]) -> String {
    String::from_utf8_lossy(wire).escape_debug().to_string()
}
