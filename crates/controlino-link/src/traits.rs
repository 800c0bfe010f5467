use std::sync::mpsc;

use controlino_frame::DataPacket;
use tracing::debug;

/// Receives the data packets decoded from a controller link.
pub trait DataSink {
    fn update_input_channels(&mut self, packet: &DataPacket);
}

impl DataSink for Vec<DataPacket> {
    fn update_input_channels(&mut self, packet: &DataPacket) {
        self.push(packet.clone());
    }
}

/// Forwards packets to another thread. Packets are dropped once the
/// receiving side has hung up.
impl DataSink for mpsc::Sender<DataPacket> {
    fn update_input_channels(&mut self, packet: &DataPacket) {
        if self.send(packet.clone()).is_err() {
            debug!("data packet receiver gone, dropping packet");
        }
    }
}

/// A controller channel as seen by the command API.
pub trait Channel {
    /// Identifier the firmware knows the channel by (e.g. `A0`, `D13`).
    fn identifier(&self) -> &str;

    /// Requested sampling rate in Hz.
    fn sampling_rate(&self) -> u32;
}
