use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::{StreamTransport, DEFAULT_MAX_BYTES_PER_READ};

/// Connect to a Unix domain socket bridged to a controller.
///
/// Returns the read half (for the inbound pump) and a [`StreamTransport`] over
/// the write half. Disconnecting the transport shuts the socket down in both
/// directions, which wakes a reader blocked on the read half.
pub fn connect(path: impl AsRef<Path>) -> Result<(UnixStream, StreamTransport<UnixStream>)> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(?path, "connected to controller socket");
    split(stream)
}

/// Split a connected stream into a read half and a transport.
pub fn split(stream: UnixStream) -> Result<(UnixStream, StreamTransport<UnixStream>)> {
    let reader = stream.try_clone()?;
    let transport =
        StreamTransport::with_max_bytes_per_read(stream, DEFAULT_MAX_BYTES_PER_READ).on_close(
            |stream: &UnixStream| {
                if let Err(err) = stream.shutdown(Shutdown::Both) {
                    debug!(%err, "socket shutdown failed");
                }
            },
        );
    Ok((reader, transport))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::traits::Transport;

    #[test]
    fn split_transmits_to_peer() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let (_reader, mut transport) = split(left).unwrap();

        transport.transmit(b"PING\r").unwrap();

        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"PING\r");
    }

    #[test]
    fn disconnect_wakes_reader_with_eof() {
        let (left, _right) = UnixStream::pair().unwrap();
        let (mut reader, mut transport) = split(left).unwrap();

        transport.disconnect();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn connect_to_missing_path_fails() {
        let path = std::env::temp_dir().join(format!(
            "controlino-missing-{}.sock",
            std::process::id()
        ));
        let err = connect(&path).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
