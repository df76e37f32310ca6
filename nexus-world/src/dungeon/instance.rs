//! Live dungeon instances and the manager that owns them.
//! One instance is shared by every player bound to it; `current_floor` is
//! tracked per player and genuinely advances
//! as rooms on higher floors clear, rather than staying pinned at zero.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nexus_core::ids::{AccountId, DungeonId, EntityId, EntityIdAllocator};
use thiserror::Error;
use time::OffsetDateTime;

use super::generator::{self, DungeonEntityKind, GeneratedDungeon, RoomType};

/// How long an instance with no bound players is kept around before being
/// torn down, mirroring the room's memory-hygiene cadence.
pub const IDLE_RELEASE: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DungeonError {
    #[error("dungeon instance not found")]
    NotFound,
    #[error("account is already inside a different dungeon instance")]
    AlreadyBoundElsewhere,
    #[error("account is not bound to this dungeon instance")]
    NotBound,
    #[error("entity not found in this dungeon instance")]
    EntityNotFound,
    #[error("dungeon is not fully cleared yet")]
    NotCleared,
    #[error("dungeon already completed")]
    AlreadyCompleted,
}

#[derive(Debug, Clone)]
pub struct PlayerProgress {
    pub current_floor: u32,
    pub rooms_cleared: Vec<usize>,
    pub entities_defeated: Vec<EntityId>,
    pub started_at: OffsetDateTime,
}

impl PlayerProgress {
    fn new(started_at: OffsetDateTime) -> Self {
        Self {
            current_floor: 0,
            rooms_cleared: Vec::new(),
            entities_defeated: Vec::new(),
            started_at,
        }
    }
}

pub struct DungeonInstance {
    pub id: DungeonId,
    pub seed: u64,
    pub difficulty: u32,
    pub level: u32,
    pub dungeon: GeneratedDungeon,
    pub player_ids: Vec<AccountId>,
    pub completed: bool,
    empty_since: Option<Instant>,
}

impl DungeonInstance {
    #[must_use]
    pub fn is_fully_cleared(&self) -> bool {
        self.dungeon.rooms.iter().all(|r| r.room_type == RoomType::Start || r.cleared)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionReward {
    pub xp: u64,
    pub credits: u64,
    pub crystals: u64,
}

#[derive(Default)]
pub struct DungeonManager {
    instances: HashMap<DungeonId, DungeonInstance>,
    bound_to: HashMap<AccountId, DungeonId>,
    progress: HashMap<(AccountId, DungeonId), PlayerProgress>,
    ids: EntityIdAllocator,
}

impl DungeonManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn create(&mut self, seed: u64, difficulty: u32, level: u32) -> DungeonId {
        let id = DungeonId::new();
        let dungeon = generator::generate(seed, difficulty, level, &self.ids);
        self.instances.insert(
            id,
            DungeonInstance {
                id,
                seed,
                difficulty,
                level,
                dungeon,
                player_ids: Vec::new(),
                completed: false,
                empty_since: Some(Instant::now()),
            },
        );
        id
    }

    #[must_use]
    pub fn get(&self, id: DungeonId) -> Option<&DungeonInstance> {
        self.instances.get(&id)
    }

    pub fn enter(&mut self, account: AccountId, dungeon_id: DungeonId, now: OffsetDateTime) -> Result<(), DungeonError> {
        if let Some(existing) = self.bound_to.get(&account) {
            if *existing != dungeon_id {
                return Err(DungeonError::AlreadyBoundElsewhere);
            }
            return Ok(());
        }
        let instance = self.instances.get_mut(&dungeon_id).ok_or(DungeonError::NotFound)?;
        instance.player_ids.push(account);
        instance.empty_since = None;
        self.bound_to.insert(account, dungeon_id);
        self.progress.entry((account, dungeon_id)).or_insert_with(|| PlayerProgress::new(now));
        Ok(())
    }

    pub fn exit(&mut self, account: AccountId) {
        let Some(dungeon_id) = self.bound_to.remove(&account) else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(&dungeon_id) {
            instance.player_ids.retain(|a| *a != account);
            if instance.player_ids.is_empty() {
                instance.empty_since = Some(Instant::now());
            }
        }
    }

    /// Marks an entity defeated; if it was the last live entity in its
    /// room, the room is auto-cleared and every in-progress player's
    /// progress on this instance is advanced.
    pub fn defeat_entity(&mut self, dungeon_id: DungeonId, entity_id: EntityId, killer: AccountId) -> Result<(), DungeonError> {
        let instance = self.instances.get_mut(&dungeon_id).ok_or(DungeonError::NotFound)?;
        let entity = instance
            .dungeon
            .entities
            .iter_mut()
            .find(|e| e.id == entity_id)
            .ok_or(DungeonError::EntityNotFound)?;
        if entity.defeated {
            return Ok(());
        }
        entity.defeated = true;
        let room_id = entity.room_id;

        if let Some(progress) = self.progress.get_mut(&(killer, dungeon_id)) {
            progress.entities_defeated.push(entity_id);
        }

        let room_cleared = instance
            .dungeon
            .entities
            .iter()
            .filter(|e| e.room_id == room_id && e.kind != DungeonEntityKind::Loot && e.kind != DungeonEntityKind::Puzzle)
            .all(|e| e.defeated);

        if room_cleared {
            self.clear_room(dungeon_id, room_id)?;
        }
        Ok(())
    }

    /// Marks a room cleared and advances every in-progress player's
    /// `current_floor` to `max(current, room.floor)`.
    pub fn clear_room(&mut self, dungeon_id: DungeonId, room_id: usize) -> Result<(), DungeonError> {
        let instance = self.instances.get_mut(&dungeon_id).ok_or(DungeonError::NotFound)?;
        let room = instance.dungeon.rooms.get_mut(room_id).ok_or(DungeonError::EntityNotFound)?;
        if room.cleared {
            return Ok(());
        }
        room.cleared = true;
        let floor = room.floor;

        for account in instance.player_ids.clone() {
            if let Some(progress) = self.progress.get_mut(&(account, dungeon_id)) {
                if !progress.rooms_cleared.contains(&room_id) {
                    progress.rooms_cleared.push(room_id);
                }
                progress.current_floor = progress.current_floor.max(floor);
            }
        }
        Ok(())
    }

    pub fn progress_for(&self, account: AccountId, dungeon_id: DungeonId) -> Option<&PlayerProgress> {
        self.progress.get(&(account, dungeon_id))
    }

    /// Computes the completion reward and marks the instance completed.
    /// Fails if any non-start room is still uncleared.
    pub fn complete(&mut self, dungeon_id: DungeonId) -> Result<CompletionReward, DungeonError> {
        let instance = self.instances.get_mut(&dungeon_id).ok_or(DungeonError::NotFound)?;
        if instance.completed {
            return Err(DungeonError::AlreadyCompleted);
        }
        if !instance.is_fully_cleared() {
            return Err(DungeonError::NotCleared);
        }
        instance.completed = true;

        let level = f64::from(instance.level);
        let difficulty = f64::from(instance.difficulty);
        let scale = 1.0 + 0.2 * difficulty;
        Ok(CompletionReward {
            xp: (level * 100.0 * scale).floor() as u64,
            credits: (level * 50.0 * scale).floor() as u64,
            crystals: difficulty.floor() as u64,
        })
    }

    /// Tears down instances that have had zero bound players for longer
    /// than [`IDLE_RELEASE`].
    pub fn release_idle(&mut self, now: Instant) {
        let expired: Vec<DungeonId> = self
            .instances
            .values()
            .filter(|instance| match instance.empty_since {
                Some(since) => now.duration_since(since) >= IDLE_RELEASE,
                None => false,
            })
            .map(|instance| instance.id)
            .collect();
        for id in expired {
            self.instances.remove(&id);
            self.progress.retain(|(_, d), _| *d != id);
            self.bound_to.retain(|_, d| *d != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn cannot_be_bound_to_two_instances_at_once() {
        let mut manager = DungeonManager::new();
        let a = manager.create(1, 1, 1);
        let b = manager.create(2, 1, 1);
        let account = AccountId::new();
        manager.enter(account, a, now()).unwrap();
        assert_eq!(manager.enter(account, b, now()).unwrap_err(), DungeonError::AlreadyBoundElsewhere);
    }

    #[test]
    fn defeating_every_hostile_in_a_room_clears_it_and_advances_floor() {
        let mut manager = DungeonManager::new();
        let id = manager.create(5, 1, 1);
        let account = AccountId::new();
        manager.enter(account, id, now()).unwrap();

        let instance = manager.get(id).unwrap();
        let boss_room = instance.dungeon.rooms.iter().find(|r| r.room_type == RoomType::Boss).unwrap();
        let boss_room_id = boss_room.id;
        let boss_floor = boss_room.floor;
        let entity_ids: Vec<_> = instance
            .dungeon
            .entities
            .iter()
            .filter(|e| e.room_id == boss_room_id)
            .map(|e| e.id)
            .collect();

        for entity_id in entity_ids {
            manager.defeat_entity(id, entity_id, account).unwrap();
        }

        let progress = manager.progress_for(account, id).unwrap();
        assert!(progress.rooms_cleared.contains(&boss_room_id));
        assert_eq!(progress.current_floor, boss_floor);
    }

    #[test]
    fn completion_requires_every_non_start_room_cleared() {
        let mut manager = DungeonManager::new();
        let id = manager.create(9, 1, 1);
        assert_eq!(manager.complete(id).unwrap_err(), DungeonError::NotCleared);
    }

    #[test]
    fn idle_instance_is_released_after_players_leave() {
        let mut manager = DungeonManager::new();
        let id = manager.create(3, 1, 1);
        let account = AccountId::new();
        manager.enter(account, id, now()).unwrap();
        manager.exit(account);
        manager.release_idle(Instant::now() + IDLE_RELEASE + Duration::from_secs(1));
        assert!(manager.get(id).is_none());
    }
}
