//! Room-owned entity types and the derived subsystems that
//! hang off the tick loop: kill combos, guild membership, and dungeon
//! instancing. None of these crate types carry `serde`/wire concerns — the
//! wire schema lives in `nexus-protocol` and `nexus-server`'s replication
//! pipeline is the only place that maps one to the other.

pub mod combo;
pub mod dungeon;
pub mod entities;
pub mod guild;

pub use combo::{ComboRegistry, ComboState};
pub use entities::{Enemy, LootDrop, Player, Projectile, ResourceNode};
pub use guild::{Guild, GuildError, GuildRegistry};
