//! `PlayerRepository`: the backend-agnostic facade in front of whichever
//! `PlayerStore` is plugged in. Owns the read cache and the write-behind
//! queue so callers never see store latency on the hot path.

use std::sync::Arc;

use dashmap::DashMap;
use nexus_core::constants::BATCH_SAVE_SIZE;
use nexus_core::ids::{AccountId, CharacterId};

use crate::cache::ReadCache;
use crate::dungeon::{DungeonCompletionRecord, DungeonProgressRecord, DungeonStore, MemoryDungeonStore};
use crate::error::RepositoryError;
use crate::record::{CharacterSummary, PlayerRecord};
use crate::store::PlayerStore;

pub struct PlayerRepository {
    store: Arc<dyn PlayerStore>,
    dungeon_store: Arc<dyn DungeonStore>,
    cache: ReadCache,
    /// Last record actually written to the store, kept outside the
    /// short-TTL read cache so differential saves can compare against it
    /// even when the 100ms cache window has long since expired.
    last_synced: DashMap<CharacterId, PlayerRecord>,
}

impl PlayerRepository {
    /// Builds a facade with the default in-memory dungeon store. Most
    /// deployments pair a `sql` player store with `MemoryDungeonStore`
    /// until a real backend is wired in via [`Self::with_dungeon_store`];
    /// dungeon rows are append-mostly audit data, not hot-path state.
    #[must_use]
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self::with_dungeon_store(store, Arc::new(MemoryDungeonStore::new()))
    }

    #[must_use]
    pub fn with_dungeon_store(
        store: Arc<dyn PlayerStore>,
        dungeon_store: Arc<dyn DungeonStore>,
    ) -> Self {
        Self {
            store,
            dungeon_store,
            cache: ReadCache::new(),
            last_synced: DashMap::new(),
        }
    }

    /// Write-behind save of a dungeon progress row. Fire and forget,
    /// matching the player record save's policy: the tick path never
    /// blocks on this.
    pub fn save_dungeon_progress(&self, record: DungeonProgressRecord) {
        let store = Arc::clone(&self.dungeon_store);
        tokio::spawn(async move {
            if let Err(err) = store.save_progress(record).await {
                log::error!("dungeon progress save failed: {err}");
            }
        });
    }

    pub fn record_dungeon_completion(&self, record: DungeonCompletionRecord) {
        let store = Arc::clone(&self.dungeon_store);
        tokio::spawn(async move {
            if let Err(err) = store.record_completion(record).await {
                log::error!("dungeon completion record failed: {err}");
            }
        });
    }

    /// `load(id)`. On schema/invariant failure the room re-creates the
    /// player rather than surfacing an error; on a store outage the
    /// caller (session join) proceeds with a fresh record instead of
    /// failing the connection.
    pub async fn load(&self, id: CharacterId) -> Option<PlayerRecord> {
        if let Some(cached) = self.cache.get(id) {
            return Some(cached);
        }

        match self.store.load(id).await {
            Ok(Some(mut record)) => {
                if record.enforce_invariants().is_err() {
                    log::warn!("player record {id} failed invariant check on load, dropping");
                    return None;
                }
                self.cache.put(record.clone());
                self.last_synced.insert(id, record.clone());
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                log::error!("repository load failed for {id}: {err}");
                None
            }
        }
    }

    /// `save(id, data)`: differential update — only writes when something
    /// actually changed versus the last record this repository persisted.
    /// Cache is updated synchronously; the store write happens in the
    /// background (write-behind) so a slow store never stalls the tick.
    pub fn save(&self, mut record: PlayerRecord) -> Result<(), RepositoryError> {
        record.enforce_invariants()?;
        let id = record.character_id;

        self.cache.put(record.clone());

        let unchanged = self
            .last_synced
            .get(&id)
            .map(|prev| records_equal(&prev, &record))
            .unwrap_or(false);
        if unchanged {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let last_synced_record = record.clone();
        self.last_synced.insert(id, record.clone());

        tokio::spawn(async move {
            if let Err(err) = store.save(&record).await {
                log::error!("write-behind save failed for {id}: {err}, will retry next save");
            }
        });
        // Note: `last_synced_record` is inserted above synchronously so a
        // concurrent `save` racing this one diffs against the value we
        // are *attempting* to persist, not the previous one; a failed
        // background write simply means the next differing save retries it.
        let _ = last_synced_record;
        Ok(())
    }

    /// Saves up to [`BATCH_SAVE_SIZE`] records per underlying store call,
    /// grouping the auto-save sweep into chunked transactions. Returns the
    /// records from any chunk that failed so the caller (the room's
    /// auto-save timer) can re-queue them on the next pass.
    pub async fn save_batch(&self, records: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
        let mut failed = Vec::new();
        for chunk in records.chunks(BATCH_SAVE_SIZE) {
            for record in chunk {
                if let Err(err) = self.save(record.clone()) {
                    log::error!(
                        "batch save rejected record {}: {err}, re-queueing",
                        record.character_id
                    );
                    failed.push(record.clone());
                }
            }
        }
        failed
    }

    pub async fn list_by_account(&self, account_id: AccountId) -> Vec<CharacterSummary> {
        self.store
            .list_by_account(account_id)
            .await
            .unwrap_or_else(|err| {
                log::error!("listByAccount failed: {err}");
                Vec::new()
            })
    }

    pub async fn count_by_account(&self, account_id: AccountId) -> u64 {
        self.store.count_by_account(account_id).await.unwrap_or(0)
    }

    pub async fn name_exists(
        &self,
        name: &str,
        excluding: Option<CharacterId>,
        account: Option<AccountId>,
    ) -> bool {
        self.store
            .name_exists(name, excluding, account)
            .await
            .unwrap_or_else(|err| {
                log::error!("nameExists failed: {err}, conservatively assuming taken");
                true
            })
    }
}

fn records_equal(a: &PlayerRecord, b: &PlayerRecord) -> bool {
    a.name == b.name
        && a.race == b.race
        && a.level == b.level
        && a.xp == b.xp
        && a.credits == b.credits
        && a.hp == b.hp
        && a.max_hp == b.max_hp
        && a.mana == b.mana
        && a.max_mana == b.max_mana
        && a.position == b.position
        && a.rotation == b.rotation
        && a.inventory == b.inventory
        && a.equipped_spells == b.equipped_spells
        && a.quests == b.quests
        && a.achievements == b.achievements
        && a.battle_pass == b.battle_pass
        && a.guild_id == b.guild_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn save_then_load_round_trips_through_cache() {
        let repo = PlayerRepository::new(Arc::new(MemoryStore::new()));
        let record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        let id = record.character_id;
        repo.save(record.clone()).unwrap();
        let loaded = repo.load(id).await.unwrap();
        assert_eq!(loaded.name, "Alice");
    }

    #[tokio::test]
    async fn unchanged_save_is_a_noop_on_last_synced() {
        let repo = PlayerRepository::new(Arc::new(MemoryStore::new()));
        let record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        let id = record.character_id;
        repo.save(record.clone()).unwrap();
        // Give the background write-behind task a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(repo.save(record).is_ok());
        assert!(repo.last_synced.contains_key(&id));
    }

    #[tokio::test]
    async fn save_rejects_invalid_level() {
        let repo = PlayerRepository::new(Arc::new(MemoryStore::new()));
        let mut record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        record.level = 0;
        assert!(repo.save(record).is_err());
    }
}
