use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use controlino_transport::Transport;
use tracing::{debug, info};

use crate::controller::Controller;
use crate::error::Result;
use crate::traits::DataSink;

/// Pause before polling a non-blocking reader that had no data.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Why an inbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The stream reached EOF.
    Closed,
    /// The stop flag was raised.
    Stopped,
}

/// Reads a controller link and feeds every chunk to the controller.
///
/// This is the on-data-arrival activity of a link. It handles partial reads
/// internally; the controller only ever sees whole chunks appended in order.
pub struct InboundPump<R> {
    reader: R,
    chunk: Vec<u8>,
    stop: Arc<AtomicBool>,
}

impl<R: Read> InboundPump<R> {
    /// Create a pump reading at most `read_size` bytes per call.
    pub fn new(reader: R, read_size: usize) -> Self {
        Self {
            reader,
            chunk: vec![0u8; read_size.max(1)],
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the pump before its next read.
    ///
    /// A read already blocked on the stream is not interrupted; give the
    /// stream a read timeout or disconnect the transport to wake it.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Pump until EOF, the stop flag, or an error.
    ///
    /// `WouldBlock` and `TimedOut` reads count as "no data yet"; a reader
    /// that would block is polled again after a short pause.
    pub fn run<T: Transport, S: DataSink>(
        &mut self,
        controller: &Controller<T, S>,
    ) -> Result<PumpExit> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(PumpExit::Stopped);
            }

            let read = match self.reader.read(&mut self.chunk) {
                Ok(0) => {
                    debug!("inbound stream closed");
                    return Ok(PumpExit::Closed);
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(WOULD_BLOCK_BACKOFF);
                    continue;
                }
                // The read timeout already waited.
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) => return Err(err.into()),
            };

            controller.handle_incoming_bytes(&self.chunk[..read])?;
        }
    }
}

/// A pump running on its own thread.
#[derive(Debug)]
pub struct PumpHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<PumpExit>>,
}

impl PumpHandle {
    /// Ask the pump to stop before its next read.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the pump thread to exit.
    pub fn join(self) -> Result<PumpExit> {
        match self.thread.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Spawn a pump thread feeding `controller` from `reader`.
///
/// Reads are sized to the transport's `max_bytes_per_read`.
pub fn spawn_pump<R, T, S>(reader: R, controller: Arc<Controller<T, S>>) -> PumpHandle
where
    R: Read + Send + 'static,
    T: Transport + Send + 'static,
    S: DataSink + Send + 'static,
{
    let read_size = controller.max_bytes_per_read();
    let mut pump = InboundPump::new(reader, read_size);
    let stop = pump.stop_flag();
    let thread = thread::spawn(move || {
        let exit = pump.run(&controller);
        info!(?exit, "inbound pump finished");
        exit
    });
    PumpHandle { stop, thread }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;
    use controlino_frame::{encode_data_packet, encode_string_packet, DataPacket};
    use controlino_transport::StreamTransport;

    use super::*;
    use crate::error::LinkError;

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct NotReadyThenData {
        polls_left: usize,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for NotReadyThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.polls_left > 0 {
                self.polls_left -= 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.inner.read(buf)
        }
    }

    fn wire() -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_data_packet(
            &DataPacket {
                relative_start_timestamp_ms: 5,
                data_blocks: Vec::new(),
            },
            &mut wire,
        )
        .unwrap();
        encode_string_packet("PONG", &mut wire).unwrap();
        wire.to_vec()
    }

    fn controller() -> Controller<StreamTransport<Vec<u8>>, Vec<DataPacket>> {
        Controller::new(StreamTransport::new(Vec::new()), Vec::new())
    }

    #[test]
    fn byte_by_byte_reads_decode_everything() {
        let controller = controller();
        let mut pump = InboundPump::new(
            ByteByByteReader {
                bytes: wire(),
                pos: 0,
            },
            64,
        );

        assert_eq!(pump.run(&controller).unwrap(), PumpExit::Closed);
        controller.with_sink(|sink| assert_eq!(sink.len(), 1));
        assert_eq!(controller.replies().try_take().unwrap().text, "PONG");
    }

    #[test]
    fn interrupted_read_retries() {
        let controller = controller();
        let mut pump = InboundPump::new(
            InterruptedThenData {
                interrupted: false,
                inner: Cursor::new(wire()),
            },
            64,
        );

        assert_eq!(pump.run(&controller).unwrap(), PumpExit::Closed);
        assert_eq!(controller.replies().len(), 1);
    }

    #[test]
    fn not_ready_reader_is_polled_with_backoff() {
        let controller = controller();
        let mut pump = InboundPump::new(
            NotReadyThenData {
                polls_left: 5,
                inner: Cursor::new(wire()),
            },
            64,
        );

        let start = std::time::Instant::now();
        assert_eq!(pump.run(&controller).unwrap(), PumpExit::Closed);
        assert!(start.elapsed() >= WOULD_BLOCK_BACKOFF * 5);
        assert_eq!(controller.replies().len(), 1);
    }

    #[test]
    fn raised_stop_flag_exits_before_reading() {
        let controller = controller();
        let mut pump = InboundPump::new(Cursor::new(wire()), 64);
        pump.stop_flag().store(true, Ordering::Release);

        assert_eq!(pump.run(&controller).unwrap(), PumpExit::Stopped);
        assert!(controller.replies().is_empty());
    }

    #[test]
    fn oversized_read_surfaces_overload() {
        let controller = Controller::new(
            StreamTransport::with_max_bytes_per_read(Vec::new(), 4),
            Vec::<DataPacket>::new(),
        );
        let mut pump = InboundPump::new(Cursor::new(wire()), 64);

        let err = pump.run(&controller).unwrap_err();
        assert!(matches!(err, LinkError::TransportOverload { max: 4, .. }));
        assert!(!controller.is_connected());
    }

    #[test]
    #[cfg(unix)]
    fn spawned_pump_answers_ping_over_socket() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (host, mut device) = UnixStream::pair().unwrap();
        let (reader, transport) = controlino_transport::uds::split(host).unwrap();
        let controller = Arc::new(Controller::new(transport, Vec::<DataPacket>::new()));
        let pump = spawn_pump(reader, Arc::clone(&controller));

        let device_thread = thread::spawn(move || {
            let mut line = [0u8; 5];
            device.read_exact(&mut line).unwrap();
            assert_eq!(&line, b"PING\r");
            let mut reply = BytesMut::new();
            encode_string_packet("PONG", &mut reply).unwrap();
            device.write_all(&reply).unwrap();
            device
        });

        assert!(controller.ping());
        let _device = device_thread.join().unwrap();

        controller.disconnect();
        assert_eq!(pump.join().unwrap(), PumpExit::Closed);
    }

    #[test]
    fn pump_handle_reports_closed_stream() {
        let controller = Arc::new(controller());
        let pump = spawn_pump(Cursor::new(wire()), Arc::clone(&controller));
        let exit = pump.join().unwrap();

        assert_eq!(exit, PumpExit::Closed);
        assert_eq!(controller.replies().await_reply(Duration::ZERO).unwrap().text, "PONG");
    }
}
