use std::time::Duration;

use controlino_frame::{FrameConfig, REPLY_PONG};
use serde::{Deserialize, Serialize};

/// Nominal rate at which controllers emit data packets.
pub const DEFAULT_DATA_PACKET_RATE_HZ: u32 = 10;

/// Default number of unclaimed string replies kept per controller.
pub const DEFAULT_REPLY_QUEUE_CAPACITY: usize = 10;

/// Controller session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Nominal data packet rate. Synchronous commands wait two packet
    /// intervals for their reply.
    pub data_packet_rate_hz: u32,
    /// Capacity of the reply queue. When full, the oldest reply is dropped.
    pub reply_queue_capacity: usize,
    /// Reply text that acknowledges a ping.
    pub expected_pong: String,
    /// Packet decoder settings.
    pub frame: FrameConfig,
}

impl LinkConfig {
    /// How long a synchronous command waits for its reply.
    pub fn reply_timeout(&self) -> Duration {
        let rate = self.data_packet_rate_hz.max(1);
        Duration::from_secs(2) / rate
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            data_packet_rate_hz: DEFAULT_DATA_PACKET_RATE_HZ,
            reply_queue_capacity: DEFAULT_REPLY_QUEUE_CAPACITY,
            expected_pong: REPLY_PONG.to_string(),
            frame: FrameConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use controlino_frame::ElementWidth;

    use super::*;

    #[test]
    fn default_reply_timeout_is_two_packet_intervals() {
        assert_eq!(LinkConfig::default().reply_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        let config = LinkConfig {
            data_packet_rate_hz: 0,
            ..LinkConfig::default()
        };
        assert_eq!(config.reply_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LinkConfig = serde_json::from_str(
            r#"{
                "data_packet_rate_hz": 50,
                "frame": { "widths": { "default_width": "u16", "blocks": { "3": "u32" } } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.data_packet_rate_hz, 50);
        assert_eq!(config.reply_queue_capacity, DEFAULT_REPLY_QUEUE_CAPACITY);
        assert_eq!(config.expected_pong, "PONG");
        assert_eq!(config.frame.widths.width_for(3), ElementWidth::U32);
        assert_eq!(config.frame.widths.width_for(4), ElementWidth::U16);
        assert_eq!(config.reply_timeout(), Duration::from_millis(40));
    }
}
