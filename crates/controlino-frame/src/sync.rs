use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode_header, FrameConfig, PacketType, HEADER_SIZE, MARKER};
use crate::packet::{decode_data_packet, decode_string_packet, Packet};

/// Outcome of one synchronization step.
enum Step {
    Packet(Packet),
    /// A packet or corrupt header was consumed without producing anything.
    Skipped,
    NeedMore,
}

/// Extracts packets from a raw controller byte stream.
///
/// The decoder keeps no state between calls: everything not yet consumed
/// stays in the caller's buffer, which is appended to as chunks arrive.
/// Noise, corrupt headers and packets whose bodies fail to decode are
/// dropped here and never reach the caller.
#[derive(Debug, Clone, Default)]
pub struct PacketDecoder {
    config: FrameConfig,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Decode every complete packet currently in `src`.
    ///
    /// Consumed bytes are removed from `src`; a trailing partial packet is
    /// left in place for the next call.
    pub fn ingest(&self, src: &mut BytesMut) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = self.decode_next(src) {
            packets.push(packet);
        }
        packets
    }

    /// Decode the next complete packet in `src`, if any.
    pub fn decode_next(&self, src: &mut BytesMut) -> Option<Packet> {
        loop {
            match self.step(src) {
                Step::Packet(packet) => return Some(packet),
                Step::Skipped => continue,
                Step::NeedMore => return None,
            }
        }
    }

    fn step(&self, src: &mut BytesMut) -> Step {
        match find_marker(src) {
            Ok(0) => {}
            Ok(start) => {
                trace!(discarded = start, "discarding bytes before packet marker");
                src.advance(start);
            }
            Err(keep) => {
                let noise = src.len() - keep;
                if noise > 0 {
                    trace!(discarded = noise, "discarding noise without packet marker");
                    src.advance(noise);
                }
                return Step::NeedMore;
            }
        }

        // `src` now starts with a marker, so the header check can only come
        // up short, never fail.
        debug_assert!(src.starts_with(&MARKER));
        let Ok(Some(header)) = decode_header(src) else {
            return Step::NeedMore;
        };

        let length = header.length as usize;
        if length < HEADER_SIZE || length > self.config.max_packet_size {
            warn!(
                length,
                max = self.config.max_packet_size,
                "corrupt packet length, resynchronizing"
            );
            src.advance(1);
            return Step::Skipped;
        }

        if src.len() < length {
            return Step::NeedMore;
        }

        let packet = src.split_to(length).freeze();
        let body = &packet[HEADER_SIZE..];

        match header.packet_type {
            PacketType::Data => match decode_data_packet(body, &self.config.widths) {
                Ok(data) => Step::Packet(Packet::Data(data)),
                Err(err) => {
                    warn!(%err, length, "dropping data packet");
                    Step::Skipped
                }
            },
            PacketType::String => match decode_string_packet(body) {
                Ok(text) => Step::Packet(Packet::String(text)),
                Err(err) => {
                    warn!(%err, length, "dropping string packet");
                    Step::Skipped
                }
            },
            PacketType::Unknown(kind) => {
                debug!(packet_type = kind, length, "dropping packet of unknown type");
                Step::Skipped
            }
        }
    }
}

/// Position of the first marker in `buf`.
///
/// Without a marker, returns `Err(keep)`: the length of the longest suffix of
/// `buf` that is a proper prefix of the marker. Those bytes may be completed
/// by the next chunk and must not be discarded.
fn find_marker(buf: &[u8]) -> std::result::Result<usize, usize> {
    if let Some(start) = buf.windows(MARKER.len()).position(|w| w == MARKER) {
        return Ok(start);
    }

    let longest = (MARKER.len() - 1).min(buf.len());
    let keep = (1..=longest)
        .rev()
        .find(|&n| buf[buf.len() - n..] == MARKER[..n])
        .unwrap_or(0);
    Err(keep)
}
