use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use controlino_frame::DataPacket;
use controlino_link::{spawn_pump, Controller, LinkConfig, PumpHandle};
use controlino_transport::StreamTransport;
use tracing::{debug, info, warn};

use crate::cmd::{connect_link, install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_data_packet, OutputFormat};

type MonitorController = Controller<StreamTransport<UnixStream>, mpsc::Sender<DataPacket>>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, format: OutputFormat, config: &LinkConfig) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let mut config = config.clone();
    args.frame.apply(&mut config.frame);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (reader, transport) = connect_link(&args.path, connect_timeout)?;
    let (tx, rx) = mpsc::channel();
    let controller = Arc::new(Controller::with_config(transport, tx, config));
    let pump = spawn_pump(reader, Arc::clone(&controller));

    let result = acquire(&controller, &pump, &rx, &args, format, &running);

    if controller.is_connected() {
        if let Err(err) = controller.stop_acquiring_data() {
            warn!(error = %err, "failed stopping acquisition");
        }
    }
    controller.disconnect();
    match pump.join() {
        Ok(exit) => debug!(?exit, "inbound pump stopped"),
        Err(err) => {
            // A pump failure ends the stream; report it unless something
            // else already failed.
            if result.is_ok() {
                return Err(link_error("inbound pump failed", err));
            }
            warn!(error = %err, "inbound pump failed");
        }
    }
    result
}

fn acquire(
    controller: &MonitorController,
    pump: &PumpHandle,
    rx: &mpsc::Receiver<DataPacket>,
    args: &MonitorArgs,
    format: OutputFormat,
    running: &AtomicBool,
) -> CliResult<i32> {
    if !args.skip_ping && !controller.ping() {
        return Err(CliError::new(
            HEALTH_CHECK_FAILED,
            format!("{} did not answer ping", args.path.display()),
        ));
    }

    for channel in &args.channels {
        controller
            .register_input_channel(channel)
            .map_err(|err| link_error("channel registration failed", err))?;
    }
    controller
        .start_acquiring_data()
        .map_err(|err| link_error("starting acquisition failed", err))?;
    info!(
        path = %args.path.display(),
        channels = args.channels.len(),
        "acquisition started"
    );

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(packet) => {
                print_data_packet(&packet, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if pump.is_finished() {
                    return Err(CliError::new(FAILURE, "controller link closed"));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(packets = printed, "acquisition finished");
    Ok(SUCCESS)
}
