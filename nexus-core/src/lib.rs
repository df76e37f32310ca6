//! Shared primitives used by every NexusRoom crate: stable identity newtypes,
//! 3-D vector math, suspicion levels, and the handful of game constants the
//! spec pins down as process-level configuration.

pub mod constants;
pub mod ids;
pub mod suspicion;
pub mod text;
pub mod vector;

pub use ids::{
    AccountId, CharacterId, DungeonId, EntityId, GuildId, RoomId, SessionId, TradeId,
};
pub use suspicion::SuspicionLevel;
pub use vector::Vector3;
