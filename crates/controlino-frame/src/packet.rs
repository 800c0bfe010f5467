use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{encode_header, PacketHeader, PacketType, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Data body prefix: timestamp (4) + block count (1).
const DATA_PREFIX_SIZE: usize = 5;
/// Block prefix: id (1) + byte length (2).
const BLOCK_PREFIX_SIZE: usize = 3;

/// Width of the unsigned integers packed in a data block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementWidth {
    #[default]
    U8,
    U16,
    U32,
    U64,
}

impl ElementWidth {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Width for an element size in bits (8, 16, 32 or 64).
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::U16),
            32 => Some(Self::U32),
            64 => Some(Self::U64),
            _ => None,
        }
    }
}

/// Element width per data block id.
///
/// The wire format does not carry the width, so host and firmware must agree
/// on it out of band. Blocks without an explicit entry use `default_width`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidthSchema {
    pub default_width: ElementWidth,
    pub blocks: BTreeMap<u8, ElementWidth>,
}

impl WidthSchema {
    /// A schema that decodes every block with `width`.
    pub fn uniform(width: ElementWidth) -> Self {
        Self {
            default_width: width,
            blocks: BTreeMap::new(),
        }
    }

    /// Set the width for one block id.
    pub fn with_block(mut self, block_id: u8, width: ElementWidth) -> Self {
        self.blocks.insert(block_id, width);
        self
    }

    /// Width used for `block_id`.
    pub fn width_for(&self, block_id: u8) -> ElementWidth {
        self.blocks
            .get(&block_id)
            .copied()
            .unwrap_or(self.default_width)
    }
}

/// Values carried by one data block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "width", content = "values", rename_all = "lowercase")]
pub enum BlockValues {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl BlockValues {
    pub fn width(&self) -> ElementWidth {
        match self {
            Self::U8(_) => ElementWidth::U8,
            Self::U16(_) => ElementWidth::U16,
            Self::U32(_) => ElementWidth::U32,
            Self::U64(_) => ElementWidth::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.width().size()
    }

    /// All values widened to `u64`.
    pub fn to_u64_vec(&self) -> Vec<u64> {
        match self {
            Self::U8(v) => v.iter().map(|&x| u64::from(x)).collect(),
            Self::U16(v) => v.iter().map(|&x| u64::from(x)).collect(),
            Self::U32(v) => v.iter().map(|&x| u64::from(x)).collect(),
            Self::U64(v) => v.clone(),
        }
    }

    fn decode(mut src: &[u8], width: ElementWidth) -> Result<Self> {
        if src.len() % width.size() != 0 {
            return Err(FrameError::malformed(format!(
                "block length {} is not a multiple of {}-byte elements",
                src.len(),
                width.size()
            )));
        }
        let count = src.len() / width.size();
        Ok(match width {
            ElementWidth::U8 => Self::U8(src.to_vec()),
            ElementWidth::U16 => Self::U16((0..count).map(|_| src.get_u16()).collect()),
            ElementWidth::U32 => Self::U32((0..count).map(|_| src.get_u32()).collect()),
            ElementWidth::U64 => Self::U64((0..count).map(|_| src.get_u64()).collect()),
        })
    }

    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::U8(v) => dst.put_slice(v),
            Self::U16(v) => v.iter().for_each(|&x| dst.put_u16(x)),
            Self::U32(v) => v.iter().for_each(|&x| dst.put_u32(x)),
            Self::U64(v) => v.iter().for_each(|&x| dst.put_u64(x)),
        }
    }
}

/// One channel's samples within a data packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBlock {
    pub block_id: u8,
    pub values: BlockValues,
}

/// Sampled data streamed by a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataPacket {
    /// Timestamp of the first sample, in milliseconds since the acquisition
    /// start command.
    pub relative_start_timestamp_ms: u32,
    pub data_blocks: Vec<DataBlock>,
}

/// A textual reply from a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringPacket {
    pub text: String,
}

impl StringPacket {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Data(DataPacket),
    String(StringPacket),
}

/// Decode a data packet body (everything after the header).
pub fn decode_data_packet(mut body: &[u8], widths: &WidthSchema) -> Result<DataPacket> {
    if body.remaining() < DATA_PREFIX_SIZE {
        return Err(FrameError::malformed(format!(
            "data body too short ({} bytes)",
            body.remaining()
        )));
    }

    let relative_start_timestamp_ms = body.get_u32();
    let block_count = body.get_u8() as usize;
    let mut data_blocks = Vec::with_capacity(block_count);

    for index in 0..block_count {
        if body.remaining() < BLOCK_PREFIX_SIZE {
            return Err(FrameError::malformed(format!(
                "block {index} header truncated"
            )));
        }
        let block_id = body.get_u8();
        let byte_len = body.get_u16() as usize;
        if body.remaining() < byte_len {
            return Err(FrameError::malformed(format!(
                "block {block_id} declares {byte_len} bytes, {} remain",
                body.remaining()
            )));
        }

        let values = BlockValues::decode(&body[..byte_len], widths.width_for(block_id))?;
        body.advance(byte_len);
        data_blocks.push(DataBlock { block_id, values });
    }

    if body.has_remaining() {
        return Err(FrameError::malformed(format!(
            "{} trailing bytes after last block",
            body.remaining()
        )));
    }

    Ok(DataPacket {
        relative_start_timestamp_ms,
        data_blocks,
    })
}

/// Decode a string packet body (everything after the header).
pub fn decode_string_packet(body: &[u8]) -> Result<StringPacket> {
    let text = std::str::from_utf8(body)?;
    Ok(StringPacket::new(text))
}

/// Encode a complete data packet, header included.
pub fn encode_data_packet(packet: &DataPacket, dst: &mut BytesMut) -> Result<()> {
    if packet.data_blocks.len() > u8::MAX as usize {
        return Err(FrameError::malformed(format!(
            "too many blocks ({}, max {})",
            packet.data_blocks.len(),
            u8::MAX
        )));
    }

    let total = HEADER_SIZE
        + DATA_PREFIX_SIZE
        + packet
            .data_blocks
            .iter()
            .map(|block| BLOCK_PREFIX_SIZE + block.values.byte_len())
            .sum::<usize>();
    let length = checked_length(total)?;

    dst.reserve(total);
    encode_header(
        &PacketHeader {
            packet_type: PacketType::Data,
            length,
        },
        dst,
    );
    dst.put_u32(packet.relative_start_timestamp_ms);
    dst.put_u8(packet.data_blocks.len() as u8);
    for block in &packet.data_blocks {
        dst.put_u8(block.block_id);
        dst.put_u16(block.values.byte_len() as u16);
        block.values.encode(dst);
    }
    Ok(())
}

/// Encode a complete string packet, header included.
pub fn encode_string_packet(text: &str, dst: &mut BytesMut) -> Result<()> {
    let total = HEADER_SIZE + text.len();
    let length = checked_length(total)?;

    dst.reserve(total);
    encode_header(
        &PacketHeader {
            packet_type: PacketType::String,
            length,
        },
        dst,
    );
    dst.put_slice(text.as_bytes());
    Ok(())
}

fn checked_length(total: usize) -> Result<u16> {
    u16::try_from(total).map_err(|_| FrameError::PacketTooLarge {
        size: total,
        max: u16::MAX as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(packet: &BytesMut) -> &[u8] {
        &packet[HEADER_SIZE..]
    }

    #[test]
    fn decodes_single_u8_block() {
        let body = [0x00, 0x00, 0x00, 0x00, 0x01, 0x05, 0x00, 0x01, 0x07];
        let packet = decode_data_packet(&body, &WidthSchema::default()).unwrap();

        assert_eq!(packet.relative_start_timestamp_ms, 0);
        assert_eq!(
            packet.data_blocks,
            vec![DataBlock {
                block_id: 5,
                values: BlockValues::U8(vec![7]),
            }]
        );
    }

    #[test]
    fn decodes_big_endian_timestamp_and_wide_blocks() {
        let body = [
            0x00, 0x01, 0x02, 0x03, // timestamp
            0x02, // blocks
            0x01, 0x00, 0x04, 0x12, 0x34, 0xAB, 0xCD, // block 1: two u16
            0x02, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF, // block 2: one u32
        ];
        let widths = WidthSchema::default()
            .with_block(1, ElementWidth::U16)
            .with_block(2, ElementWidth::U32);

        let packet = decode_data_packet(&body, &widths).unwrap();

        assert_eq!(packet.relative_start_timestamp_ms, 0x0001_0203);
        assert_eq!(packet.data_blocks[0].values, BlockValues::U16(vec![0x1234, 0xABCD]));
        assert_eq!(packet.data_blocks[1].values, BlockValues::U32(vec![0xDEAD_BEEF]));
    }

    #[test]
    fn same_bytes_decode_differently_per_width() {
        let body = [0, 0, 0, 0, 1, 9, 0x00, 0x02, 0x01, 0x02];

        let narrow = decode_data_packet(&body, &WidthSchema::default()).unwrap();
        let wide = decode_data_packet(&body, &WidthSchema::uniform(ElementWidth::U16)).unwrap();

        assert_eq!(narrow.data_blocks[0].values, BlockValues::U8(vec![1, 2]));
        assert_eq!(wide.data_blocks[0].values, BlockValues::U16(vec![0x0102]));
    }

    #[test]
    fn rejects_truncated_prefix() {
        let err = decode_data_packet(&[0, 0, 0], &WidthSchema::default()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn rejects_block_longer_than_body() {
        let body = [0, 0, 0, 0, 1, 5, 0x00, 0x04, 0x07];
        let err = decode_data_packet(&body, &WidthSchema::default()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn rejects_missing_block() {
        let body = [0, 0, 0, 0, 2, 5, 0x00, 0x01, 0x07];
        let err = decode_data_packet(&body, &WidthSchema::default()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let body = [0, 0, 0, 0, 1, 5, 0x00, 0x01, 0x07, 0xFF];
        let err = decode_data_packet(&body, &WidthSchema::default()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn rejects_length_not_multiple_of_width() {
        let body = [0, 0, 0, 0, 1, 5, 0x00, 0x03, 0x01, 0x02, 0x03];
        let err =
            decode_data_packet(&body, &WidthSchema::uniform(ElementWidth::U16)).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn empty_block_list_is_valid() {
        let packet = decode_data_packet(&[0, 0, 0x01, 0x00, 0], &WidthSchema::default()).unwrap();
        assert_eq!(packet.relative_start_timestamp_ms, 256);
        assert!(packet.data_blocks.is_empty());
    }

    #[test]
    fn string_packet_rejects_invalid_utf8() {
        let err = decode_string_packet(&[0x50, 0xFF, 0x4E]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidEncoding(_)));
    }

    #[test]
    fn string_packet_keeps_text_verbatim() {
        let packet = decode_string_packet("PONG µ".as_bytes()).unwrap();
        assert_eq!(packet.text, "PONG µ");
        assert_eq!(decode_string_packet(b"").unwrap().text, "");
    }

    #[test]
    fn data_packet_encodes_to_decodable_body() {
        let packet = DataPacket {
            relative_start_timestamp_ms: 1500,
            data_blocks: vec![
                DataBlock {
                    block_id: 3,
                    values: BlockValues::U8(vec![1, 2, 3]),
                },
                DataBlock {
                    block_id: 4,
                    values: BlockValues::U64(vec![u64::MAX]),
                },
            ],
        };
        let widths = WidthSchema::default().with_block(4, ElementWidth::U64);

        let mut wire = BytesMut::new();
        encode_data_packet(&packet, &mut wire).unwrap();

        assert_eq!(wire.len(), HEADER_SIZE + 5 + (3 + 3) + (3 + 8));
        assert_eq!(u16::from_be_bytes([wire[5], wire[6]]) as usize, wire.len());
        assert_eq!(decode_data_packet(body_of(&wire), &widths).unwrap(), packet);
    }

    #[test]
    fn string_packet_encodes_header_and_text() {
        let mut wire = BytesMut::new();
        encode_string_packet("PONG", &mut wire).unwrap();

        assert_eq!(
            wire.as_ref(),
            &[0xA5, 0xA5, 0xA5, 0xA5, 0x01, 0x00, 0x0B, b'P', b'O', b'N', b'G']
        );
    }

    #[test]
    fn encode_rejects_oversized_packet() {
        let mut wire = BytesMut::new();
        let text = "x".repeat(u16::MAX as usize);
        let err = encode_string_packet(&text, &mut wire).unwrap_err();
        assert!(matches!(err, FrameError::PacketTooLarge { .. }));
        assert!(wire.is_empty());
    }

    #[test]
    fn encode_rejects_too_many_blocks() {
        let packet = DataPacket {
            relative_start_timestamp_ms: 0,
            data_blocks: (0..=255u16)
                .map(|id| DataBlock {
                    block_id: id as u8,
                    values: BlockValues::U8(Vec::new()),
                })
                .collect(),
        };
        let err = encode_data_packet(&packet, &mut BytesMut::new()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPacket(_)));
    }

    #[test]
    fn width_schema_falls_back_to_default() {
        let widths = WidthSchema::uniform(ElementWidth::U32).with_block(7, ElementWidth::U8);
        assert_eq!(widths.width_for(7), ElementWidth::U8);
        assert_eq!(widths.width_for(8), ElementWidth::U32);
        assert_eq!(ElementWidth::from_bits(16), Some(ElementWidth::U16));
        assert_eq!(ElementWidth::from_bits(12), None);
    }

    #[test]
    fn block_values_widen_to_u64() {
        let values = BlockValues::U16(vec![1, 0xFFFF]);
        assert_eq!(values.to_u64_vec(), vec![1, 0xFFFF]);
        assert_eq!(values.byte_len(), 4);
        assert!(!values.is_empty());
    }

    #[test]
    fn packet_serializes_with_type_and_width_tags() {
        let packet = Packet::Data(DataPacket {
            relative_start_timestamp_ms: 10,
            data_blocks: vec![DataBlock {
                block_id: 5,
                values: BlockValues::U8(vec![7]),
            }],
        });
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["type"], "data");
        assert_eq!(json["data_blocks"][0]["values"]["width"], "u8");
        assert_eq!(json["data_blocks"][0]["values"]["values"][0], 7);
    }
}
