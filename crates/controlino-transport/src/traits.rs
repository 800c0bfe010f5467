use crate::error::Result;

/// A byte-oriented link to a controller.
///
/// Implementations own the outbound half of the link. Inbound bytes are
/// delivered separately (see the link crate's pump), so a transport never
/// blocks on reads.
pub trait Transport {
    /// Send raw bytes to the controller.
    fn transmit(&mut self, bytes: &[u8]) -> Result<()>;

    /// Tear the link down. Subsequent `transmit` calls fail.
    fn disconnect(&mut self);

    /// Whether the link is still usable.
    fn is_connected(&self) -> bool;

    /// The largest chunk a single read on this link can yield.
    ///
    /// A chunk larger than this means the reader fell behind and the stream
    /// boundary can no longer be trusted.
    fn max_bytes_per_read(&self) -> usize;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).transmit(bytes)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn max_bytes_per_read(&self) -> usize {
        (**self).max_bytes_per_read()
    }
}
