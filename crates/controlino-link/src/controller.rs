use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use controlino_frame::{
    Command, Packet, PacketDecoder, CHANNEL_DIRECTION_IN, CHANNEL_DIRECTION_OUT,
    CMD_CHANNEL_DIRECTION, CMD_CHANNEL_REGISTER, CMD_CHANNEL_WRITE,
};
use controlino_transport::Transport;
use tracing::{debug, trace, warn, Level};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::replies::ReplyQueue;
use crate::traits::{Channel, DataSink};

/// One host-side session with a controller.
///
/// Inbound bytes are fed through [`handle_incoming_bytes`](Self::handle_incoming_bytes)
/// from whatever activity reads the link. Commands may be issued concurrently
/// from other threads; share the controller behind an `Arc`.
pub struct Controller<T, S> {
    transport: Mutex<T>,
    sink: Mutex<S>,
    inbound: Mutex<BytesMut>,
    decoder: PacketDecoder,
    replies: ReplyQueue,
    /// Serializes synchronous commands, since replies carry no request id.
    command_lock: Mutex<()>,
    config: LinkConfig,
    /// Read once at construction so inbound decoding never waits on the
    /// transport lock held by an outbound write.
    max_bytes_per_read: usize,
}

impl<T: Transport, S: DataSink> Controller<T, S> {
    pub fn new(transport: T, sink: S) -> Self {
        Self::with_config(transport, sink, LinkConfig::default())
    }

    pub fn with_config(transport: T, sink: S, config: LinkConfig) -> Self {
        let max_bytes_per_read = transport.max_bytes_per_read();
        Self {
            transport: Mutex::new(transport),
            sink: Mutex::new(sink),
            inbound: Mutex::new(BytesMut::with_capacity(config.frame.max_packet_size)),
            decoder: PacketDecoder::with_config(config.frame.clone()),
            replies: ReplyQueue::new(config.reply_queue_capacity),
            command_lock: Mutex::new(()),
            config,
            max_bytes_per_read,
        }
    }

    /// Feed a chunk of bytes read from the link.
    ///
    /// Every complete packet in the connection's buffer is decoded and
    /// dispatched: data packets to the sink, string packets to the reply
    /// queue. Incomplete trailing bytes are kept for the next chunk.
    /// Returns the number of packets dispatched.
    ///
    /// A chunk larger than the transport's `max_bytes_per_read` disconnects
    /// the transport and discards everything buffered.
    pub fn handle_incoming_bytes(&self, chunk: &[u8]) -> Result<usize> {
        if tracing::enabled!(Level::TRACE) {
            trace!(len = chunk.len(), rx = %hex::encode_upper(chunk), "rx");
        }

        let mut inbound = lock(&self.inbound);

        let max = self.max_bytes_per_read;
        if chunk.len() > max {
            warn!(size = chunk.len(), max, "transport overloaded, disconnecting");
            lock(&self.transport).disconnect();
            inbound.clear();
            return Err(LinkError::TransportOverload {
                size: chunk.len(),
                max,
            });
        }

        inbound.extend_from_slice(chunk);
        let packets = self.decoder.ingest(&mut inbound);
        drop(inbound);

        let count = packets.len();
        for packet in packets {
            match packet {
                Packet::Data(data) => {
                    trace!(
                        timestamp_ms = data.relative_start_timestamp_ms,
                        blocks = data.data_blocks.len(),
                        "data packet"
                    );
                    lock(&self.sink).update_input_channels(&data);
                }
                Packet::String(reply) => {
                    debug!(text = %reply.text, "string packet");
                    self.replies.enqueue(reply);
                }
            }
        }
        Ok(count)
    }

    /// Check that the controller is responsive.
    ///
    /// Sends `PING` and waits up to two data packet intervals for a reply.
    /// Returns true only if the reply is the expected pong text. A timeout,
    /// a different reply or a failed transmit all return false.
    pub fn ping(&self) -> bool {
        let _serial = lock(&self.command_lock);

        if let Err(err) = self.send_command(&Command::ping()) {
            warn!(%err, "ping not sent");
            return false;
        }

        let timeout = self.config.reply_timeout();
        match self.replies.await_reply(timeout) {
            Some(reply) if reply.text == self.config.expected_pong => true,
            Some(reply) => {
                debug!(reply = %reply.text, "unexpected ping reply");
                false
            }
            None => {
                debug!(?timeout, "ping timed out");
                false
            }
        }
    }

    /// Zero the controller's clock and start streaming data packets.
    pub fn start_acquiring_data(&self) -> Result<()> {
        self.send_command(&Command::acquire_start())
    }

    /// Stop streaming data packets.
    pub fn stop_acquiring_data(&self) -> Result<()> {
        self.send_command(&Command::acquire_stop())
    }

    /// Ask the controller to stream a channel at its sampling rate.
    pub fn register_input_channel(&self, channel: &dyn Channel) -> Result<()> {
        self.send_command(
            &Command::new(CMD_CHANNEL_REGISTER)
                .arg(channel.identifier())
                .arg(channel.sampling_rate()),
        )
    }

    pub fn set_channel_direction(&self, channel: &dyn Channel, is_output: bool) -> Result<()> {
        let direction = if is_output {
            CHANNEL_DIRECTION_OUT
        } else {
            CHANNEL_DIRECTION_IN
        };
        self.send_command(
            &Command::new(CMD_CHANNEL_DIRECTION)
                .arg(channel.identifier())
                .arg(direction),
        )
    }

    /// Write values to an output channel.
    pub fn write_to_channel<V: fmt::Display>(
        &self,
        channel: &dyn Channel,
        values: &[V],
    ) -> Result<()> {
        self.send_command(
            &Command::new(CMD_CHANNEL_WRITE)
                .arg(channel.identifier())
                .args(values),
        )
    }

    /// Encode and transmit a command without waiting for a reply.
    pub fn send_command(&self, command: &Command) -> Result<()> {
        debug!(%command, "tx");
        lock(&self.transport).transmit(&command.encode())?;
        Ok(())
    }

    pub fn disconnect(&self) {
        lock(&self.transport).disconnect();
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.transport).is_connected()
    }

    /// Largest chunk `handle_incoming_bytes` accepts, as reported by the
    /// transport when the controller was built.
    pub fn max_bytes_per_read(&self) -> usize {
        self.max_bytes_per_read
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn replies(&self) -> &ReplyQueue {
        &self.replies
    }

    /// Bytes buffered while waiting for the rest of a packet.
    pub fn buffered_len(&self) -> usize {
        lock(&self.inbound).len()
    }

    /// Run `f` with exclusive access to the data sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.sink))
    }

    /// Run `f` with exclusive access to the transport.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut lock(&self.transport))
    }
}

impl<T, S> fmt::Debug for Controller<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("pending_replies", &self.replies.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
