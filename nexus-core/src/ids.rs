use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(AccountId);
uuid_id!(CharacterId);
uuid_id!(RoomId);
uuid_id!(SessionId);
uuid_id!(TradeId);
uuid_id!(DungeonId);
uuid_id!(GuildId);

/// Identifies a transient, room-scoped entity (enemy, projectile, loot drop,
/// resource node). Allocated from a per-room monotonic counter rather than a
/// `Uuid` since these never outlive the room and the spatial grid benefits
/// from a cheap, dense key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out unique, process-local `EntityId`s for one room.
#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: AtomicU64,
}

impl EntityIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> EntityId {
        EntityId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_unique_and_monotonic() {
        let alloc = EntityIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert!(b.0 > a.0);
    }

    #[test]
    fn account_id_round_trips_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from(uuid);
        assert_eq!(id.0, uuid);
    }
}
