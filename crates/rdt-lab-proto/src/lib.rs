pub mod channel;
pub mod config;
pub mod packet;
pub mod rtt;

pub use channel::{ChannelEmulator, Verdict};
pub use config::{SessionConfig, SessionConfigOverride};
pub use packet::{DecodeError, Packet};
pub use rtt::RttEstimator;
