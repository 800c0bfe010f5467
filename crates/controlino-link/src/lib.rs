//! Controller session management for the controlino wire protocol.
//!
//! A [`Controller`] owns one link: the inbound byte buffer, the decoder, the
//! sink that receives sampled data and the queue that hands textual replies
//! to synchronous commands such as [`Controller::ping`].

pub mod config;
pub mod controller;
pub mod error;
pub mod pump;
pub mod replies;
pub mod traits;

pub use config::{LinkConfig, DEFAULT_DATA_PACKET_RATE_HZ, DEFAULT_REPLY_QUEUE_CAPACITY};
pub use controller::Controller;
pub use error::{LinkError, Result};
pub use pump::{spawn_pump, InboundPump, PumpExit, PumpHandle};
pub use replies::ReplyQueue;
pub use traits::{Channel, DataSink};
