//! NexusRoom room runtime: the 60 Hz tick loop, session lifecycle,
//! replication pipeline, and monitoring core that sit on top of the
//! `nexus-*` component crates, plus the WebSocket transport that drives
//! them. The `nexus-server` binary (`main.rs`) is a thin wrapper around
//! [`room::Room`].

pub mod config;
pub mod error;
pub mod monitoring;
#[cfg(feature = "redis-advisory")]
pub mod redis_advisory;
pub mod room;
pub mod transport;

pub use config::Config;
pub use error::RoomError;
pub use room::{Room, RoomHandle};
