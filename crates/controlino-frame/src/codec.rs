use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::packet::WidthSchema;

/// Packet header: marker (4) + type (1) + length (2) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Packet start marker.
pub const MARKER: [u8; 4] = [0xA5, 0xA5, 0xA5, 0xA5];

/// Default largest declared packet length accepted before the header is
/// treated as corrupt.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// Packet type announced in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    /// Sampled channel data.
    Data,
    /// Textual reply to a command.
    String,
    /// A type this host does not understand. The packet is skipped.
    Unknown(u8),
}

impl PacketType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Data,
            1 => Self::String,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::String => 1,
            Self::Unknown(other) => other,
        }
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    /// Total packet size, header included.
    pub length: u16,
}

impl PacketHeader {
    /// Number of body bytes following the header, if the length is sane.
    pub fn body_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(HEADER_SIZE)
    }
}

/// Decode a packet header from the start of `src`.
///
/// Returns `Ok(None)` if fewer than [`HEADER_SIZE`] bytes are available.
/// Does not consume anything.
pub fn decode_header(src: &[u8]) -> Result<Option<PacketHeader>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..4] != MARKER {
        return Err(FrameError::InvalidMarker);
    }

    Ok(Some(PacketHeader {
        packet_type: PacketType::from_u8(src[4]),
        length: u16::from_be_bytes([src[5], src[6]]),
    }))
}

/// Encode a packet header.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬────────┬──────────────┐
/// │ Marker (4B)      │ Type   │ Length       │
/// │ A5 A5 A5 A5      │ (1B)   │ (2B BE)      │
/// └──────────────────┴────────┴──────────────┘
/// ```
pub fn encode_header(header: &PacketHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_slice(&MARKER);
    dst.put_u8(header.packet_type.as_u8());
    dst.put_u16(header.length);
}

/// Configuration for the packet decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Largest declared packet length accepted. A header announcing more (or
    /// less than a header's worth) is treated as corrupt and the decoder
    /// resynchronizes on the next marker. Default: 4096.
    pub max_packet_size: usize,
    /// Element width per data block id.
    pub widths: WidthSchema,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            widths: WidthSchema::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PacketHeader {
            packet_type: PacketType::String,
            length: 11,
        };
        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);

        assert_eq!(buf.as_ref(), &[0xA5, 0xA5, 0xA5, 0xA5, 0x01, 0x00, 0x0B]);
        assert_eq!(decode_header(&buf).unwrap(), Some(header));
        assert_eq!(header.body_len(), Some(4));
    }

    #[test]
    fn test_decode_incomplete_header() {
        let result = decode_header(&[0xA5, 0xA5, 0xA5, 0xA5, 0x00]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_marker() {
        let result = decode_header(&[0xA5, 0xA5, 0xA5, 0x00, 0x00, 0x00, 0x07]);
        assert!(matches!(result, Err(FrameError::InvalidMarker)));
    }

    #[test]
    fn test_unknown_packet_type_is_preserved() {
        let header = decode_header(&[0xA5, 0xA5, 0xA5, 0xA5, 0x09, 0x00, 0x07])
            .unwrap()
            .unwrap();
        assert_eq!(header.packet_type, PacketType::Unknown(9));
        assert_eq!(header.packet_type.as_u8(), 9);
    }

    #[test]
    fn test_body_len_rejects_short_length() {
        let header = PacketHeader {
            packet_type: PacketType::Data,
            length: 3,
        };
        assert_eq!(header.body_len(), None);
    }

    #[test]
    fn test_frame_config_defaults_from_empty_json() {
        let config: FrameConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FrameConfig::default());
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
    }
}
