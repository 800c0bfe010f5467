//! Packet framing and command encoding for the controlino wire protocol.
//!
//! Controllers stream packets to the host over a byte link with no message
//! boundaries other than the packet's own length field. Every packet starts
//! with a fixed header:
//! - A 4-byte marker (`A5 A5 A5 A5`) for stream synchronization
//! - A 1-byte packet type (0 = data, 1 = string)
//! - A 2-byte big-endian total packet length, header included
//!
//! The host answers with ASCII command lines terminated by a carriage return.

pub mod codec;
pub mod command;
pub mod error;
pub mod packet;
pub mod sync;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_header, encode_header, FrameConfig, PacketHeader, PacketType, DEFAULT_MAX_PACKET_SIZE,
    HEADER_SIZE, MARKER,
};
pub use command::{
    encode_command, Command, CHANNEL_DIRECTION_IN, CHANNEL_DIRECTION_OUT, CMD_ACQUIRE_START,
    CMD_ACQUIRE_STOP, CMD_CHANNEL_DIRECTION, CMD_CHANNEL_REGISTER, CMD_CHANNEL_WRITE, CMD_PING,
    REPLY_PONG,
};
pub use error::{FrameError, Result};
pub use packet::{
    decode_data_packet, decode_string_packet, encode_data_packet, encode_string_packet,
    BlockValues, DataBlock, DataPacket, ElementWidth, Packet, StringPacket, WidthSchema,
};
pub use sync::PacketDecoder;

#[cfg(feature = "async")]
pub use async_codec::ControlinoCodec;
