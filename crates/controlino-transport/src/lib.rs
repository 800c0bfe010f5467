//! Transport abstraction for controlino serial links.
//!
//! The protocol layer never touches a device directly. It talks to a
//! [`Transport`] that can transmit bytes, report the largest chunk it will
//! ever hand over in a single read, and be torn down when the byte stream is
//! no longer trustworthy.
//!
//! [`StreamTransport`] adapts any `std::io::Write` (a serial port handle, a
//! socket bridged to a controller, a test buffer) into a [`Transport`].

pub mod error;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::{StreamTransport, DEFAULT_MAX_BYTES_PER_READ};
pub use traits::Transport;
