/// Errors that can occur in controller session operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] controlino_transport::TransportError),

    /// A single inbound chunk exceeded what the transport can deliver in one
    /// read. The stream boundary is lost and the transport was disconnected.
    #[error("transport overloaded ({size} bytes in one read, max {max})")]
    TransportOverload { size: usize, max: usize },

    /// Reading from the inbound stream failed.
    #[error("inbound I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
