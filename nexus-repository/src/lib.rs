//! Player repository facade: a pluggable-store-backed
//! cache + write-behind layer in front of the persistent player record.

pub mod cache;
pub mod dungeon;
pub mod error;
pub mod record;
pub mod repository;
pub mod store;

#[cfg(feature = "sql")]
pub mod sql;

pub use dungeon::{DungeonCompletionRecord, DungeonProgressRecord, DungeonStore, MemoryDungeonStore};
pub use error::RepositoryError;
pub use record::{CharacterSummary, PlayerRecord};
pub use repository::PlayerRepository;
pub use store::{MemoryStore, PlayerStore};

#[cfg(feature = "sql")]
pub use sql::SqlStore;
