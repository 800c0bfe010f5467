use std::sync::Arc;
use std::time::Instant;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use controlino_frame::DataPacket;
use controlino_link::{spawn_pump, Controller, DataSink, LinkConfig};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cmd::{connect_link, parse_duration, PingArgs};
use crate::exit::{CliError, CliResult, HEALTH_CHECK_FAILED, SUCCESS, USAGE};
use crate::output::OutputFormat;

/// Data packets are irrelevant to a ping; drop them.
struct DiscardSink;

impl DataSink for DiscardSink {
    fn update_input_channels(&mut self, packet: &DataPacket) {
        trace!(
            timestamp_ms = packet.relative_start_timestamp_ms,
            "discarding data packet"
        );
    }
}

#[derive(Serialize)]
struct PingAttempt {
    attempt: u32,
    ok: bool,
    latency_ms: Option<f64>,
}

#[derive(Serialize)]
struct PingReport {
    path: String,
    timeout_ms: u64,
    attempts: Vec<PingAttempt>,
    ok: bool,
}

pub fn run(args: PingArgs, format: OutputFormat, config: &LinkConfig) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::new(USAGE, "count must be greater than zero"));
    }
    let interval = parse_duration(&args.interval)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let mut config = config.clone();
    if let Some(rate) = args.rate_hz {
        config.data_packet_rate_hz = rate;
    }
    let timeout = config.reply_timeout();

    let (reader, transport) = connect_link(&args.path, connect_timeout)?;
    let controller = Arc::new(Controller::with_config(transport, DiscardSink, config));
    let pump = spawn_pump(reader, Arc::clone(&controller));

    let mut attempts = Vec::with_capacity(args.count as usize);
    for attempt in 1..=args.count {
        if attempt > 1 {
            std::thread::sleep(interval);
        }
        let start = Instant::now();
        let ok = controller.ping();
        let latency_ms =
            ok.then(|| (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0);
        debug!(attempt, ok, ?latency_ms, "ping attempt");
        attempts.push(PingAttempt {
            attempt,
            ok,
            latency_ms,
        });
    }

    controller.disconnect();
    match pump.join() {
        Ok(exit) => debug!(?exit, "inbound pump stopped"),
        Err(err) => warn!(error = %err, "inbound pump failed"),
    }

    let ok = attempts.iter().all(|a| a.ok);
    let report = PingReport {
        path: args.path.display().to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        attempts,
        ok,
    };
    print_report(&report, format);

    if ok {
        info!(path = %report.path, "controller answered every ping");
        Ok(SUCCESS)
    } else {
        warn!(path = %report.path, "controller missed a ping");
        Ok(HEALTH_CHECK_FAILED)
    }
}

fn print_report(report: &PingReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ATTEMPT", "RESULT", "LATENCY"]);
            for attempt in &report.attempts {
                table.add_row(vec![
                    attempt.attempt.to_string(),
                    result_label(attempt.ok).to_string(),
                    latency_label(attempt),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for attempt in &report.attempts {
                println!(
                    "ping {} #{}: {} ({})",
                    report.path,
                    attempt.attempt,
                    result_label(attempt.ok),
                    latency_label(attempt)
                );
            }
        }
        OutputFormat::Raw => println!("{}", result_label(report.ok)),
    }
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        "pong"
    } else {
        "timeout"
    }
}

fn latency_label(attempt: &PingAttempt) -> String {
    match attempt.latency_ms {
        Some(ms) => format!("{ms:.2}ms"),
        None => "-".to_string(),
    }
}
