//! Outgoing command lines.
//!
//! Commands are ASCII lines of space-separated tokens terminated by a single
//! carriage return: `NAME PARAM1 PARAM2 ...\r`.

use std::fmt;

use bytes::{BufMut, BytesMut};

/// Start an acquisition block. The time this is sent is the zero point for
/// every timestamp the controller reports afterwards.
pub const CMD_ACQUIRE_START: &str = "ACQUIRE:START";
/// Stop the current acquisition block.
pub const CMD_ACQUIRE_STOP: &str = "ACQUIRE:STOP";
/// Liveness check, answered with [`REPLY_PONG`].
pub const CMD_PING: &str = "PING";
/// Set a channel's direction: `CH:DIR <id> IN|OUT`.
pub const CMD_CHANNEL_DIRECTION: &str = "CH:DIR";
/// Start streaming a channel: `CH:REGISTER <id> <rate>`.
pub const CMD_CHANNEL_REGISTER: &str = "CH:REGISTER";
/// Write values to an output channel: `CH:WRITE <id> <v1> <v2> ...`.
pub const CMD_CHANNEL_WRITE: &str = "CH:WRITE";

pub const CHANNEL_DIRECTION_IN: &str = "IN";
pub const CHANNEL_DIRECTION_OUT: &str = "OUT";

/// Reply text for [`CMD_PING`].
pub const REPLY_PONG: &str = "PONG";

const TERMINATOR: u8 = b'\r';

/// Encode a command line.
pub fn encode_command<P: AsRef<str>>(name: &str, params: &[P]) -> Vec<u8> {
    let mut dst = BytesMut::new();
    encode_into(name, params.iter().map(AsRef::as_ref), &mut dst);
    dst.to_vec()
}

fn encode_into<'a>(name: &str, params: impl Iterator<Item = &'a str>, dst: &mut BytesMut) {
    dst.put_slice(name.as_bytes());
    for param in params {
        dst.put_u8(b' ');
        dst.put_slice(param.as_bytes());
    }
    dst.put_u8(TERMINATOR);
}

/// A command name with its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append one parameter, formatted with `Display`.
    pub fn arg(mut self, param: impl fmt::Display) -> Self {
        self.params.push(param.to_string());
        self
    }

    /// Append several parameters.
    pub fn args<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.params
            .extend(params.into_iter().map(|param| param.to_string()));
        self
    }

    pub fn ping() -> Self {
        Self::new(CMD_PING)
    }

    pub fn acquire_start() -> Self {
        Self::new(CMD_ACQUIRE_START)
    }

    pub fn acquire_stop() -> Self {
        Self::new(CMD_ACQUIRE_STOP)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The wire bytes, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        encode_command(&self.name, &self.params)
    }

    /// Append the wire bytes to `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        encode_into(&self.name, self.params.iter().map(String::as_str), dst);
    }
}

/// The command line without its terminator.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}
