use std::fmt;
use std::io::{ErrorKind, Write};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default read chunk limit for a controller link.
pub const DEFAULT_MAX_BYTES_PER_READ: usize = 4096;

/// Pause before retrying a write on a non-blocking stream that is not ready.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

type CloseHook<W> = Box<dyn FnMut(&W) + Send>;

/// A [`Transport`] over any `Write` stream.
///
/// Non-blocking streams work too: a write that would block is retried
/// after a short pause until the whole command line is out.
pub struct StreamTransport<W> {
    inner: Option<W>,
    max_bytes_per_read: usize,
    on_close: Option<CloseHook<W>>,
}

impl<W: Write> StreamTransport<W> {
    /// Wrap a stream using [`DEFAULT_MAX_BYTES_PER_READ`].
    pub fn new(inner: W) -> Self {
        Self::with_max_bytes_per_read(inner, DEFAULT_MAX_BYTES_PER_READ)
    }

    /// Wrap a stream with an explicit read chunk limit.
    pub fn with_max_bytes_per_read(inner: W, max_bytes_per_read: usize) -> Self {
        Self {
            inner: Some(inner),
            max_bytes_per_read,
            on_close: None,
        }
    }

    /// Run `hook` on the stream right before it is dropped by `disconnect`.
    ///
    /// Sockets use this to shut down the read half so a blocked reader wakes.
    pub fn on_close(mut self, hook: impl FnMut(&W) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Borrow the underlying stream, if still connected.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Consume the transport and return the inner stream, if still connected.
    pub fn into_inner(self) -> Option<W> {
        self.inner
    }
}

impl<W: Write> Transport for StreamTransport<W> {
    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(TransportError::Disconnected)?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Some(hook) = self.on_close.as_mut() {
                hook(&inner);
            }
            debug!("stream transport disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    fn max_bytes_per_read(&self) -> usize {
        self.max_bytes_per_read
    }
}

impl<W> fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("connected", &self.inner.is_some())
            .field("max_bytes_per_read", &self.max_bytes_per_read)
            .finish()
    }
}
