//! Host-side link to controlino microcontroller firmware.
//!
//! A controlino controller streams sampled data and textual replies over a
//! serial-style byte link and accepts carriage-return terminated ASCII
//! commands. This crate bundles the layers needed to talk to one.
//!
//! # Crate Structure
//!
//! - [`transport`]: Outbound byte links (any `Write`, Unix sockets)
//! - [`frame`]: Packet framing, stream resynchronization, and command encoding
//! - [`link`]: Controller sessions: reply correlation, ping, and the inbound pump

/// Re-export transport types.
pub mod transport {
    pub use controlino_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use controlino_frame::*;
}

/// Re-export controller session types.
pub mod link {
    pub use controlino_link::*;
}
