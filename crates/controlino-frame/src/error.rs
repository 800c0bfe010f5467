/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header does not start with the packet marker.
    #[error("invalid packet marker (expected A5 A5 A5 A5)")]
    InvalidMarker,

    /// The packet's length or content does not match its layout.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A string packet body is not valid UTF-8.
    #[error("invalid string packet encoding: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// The encoded packet would not fit the 16-bit length field.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPacket(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
