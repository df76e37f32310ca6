//! Dungeon instancing: deterministic generation, per-player
//! progress tracking, and idle-instance teardown.

pub mod generator;
pub mod instance;
pub mod rng;

pub use generator::{Cell, DungeonEntity, DungeonEntityKind, DungeonRoom, GeneratedDungeon, GenerationConfig, RoomBounds, RoomType};
pub use instance::{CompletionReward, DungeonError, DungeonInstance, DungeonManager, PlayerProgress};
pub use rng::Lcg;
