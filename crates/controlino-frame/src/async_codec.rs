use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::FrameConfig;
use crate::command::Command;
use crate::error::{FrameError, Result};
use crate::packet::Packet;
use crate::sync::PacketDecoder;

/// `tokio_util` codec: decodes controller packets, encodes command lines.
#[derive(Debug, Clone, Default)]
pub struct ControlinoCodec {
    decoder: PacketDecoder,
}

impl ControlinoCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: PacketDecoder::with_config(config),
        }
    }
}

impl Decoder for ControlinoCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        Ok(self.decoder.decode_next(src))
    }
}

impl Encoder<Command> for ControlinoCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        item.encode_to(dst);
        Ok(())
    }
}
