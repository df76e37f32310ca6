//! Dungeon persistence rows: `dungeon_progress`
//! keyed by `(account, dungeon)`, `dungeon_completions` an immutable log.
//! Kept in the repository crate alongside `PlayerRecord` persistence since
//! both are write-behind, fire-and-forget writes from the room's tick path;
//! `nexus-world`'s dungeon instance manager only ever sees this trait, never
//! a concrete backend.

use async_trait::async_trait;
use nexus_core::ids::{AccountId, DungeonId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::RepositoryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DungeonProgressRecord {
    pub account_id: AccountId,
    pub dungeon_id: DungeonId,
    pub current_floor: u32,
    pub rooms_cleared: Vec<String>,
    pub entities_defeated: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DungeonCompletionRecord {
    pub account_id: AccountId,
    pub dungeon_id: DungeonId,
    pub xp: u64,
    pub credits: u64,
    pub crystals: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

#[async_trait]
pub trait DungeonStore: Send + Sync {
    async fn save_progress(&self, record: DungeonProgressRecord) -> Result<(), RepositoryError>;
    async fn record_completion(
        &self,
        record: DungeonCompletionRecord,
    ) -> Result<(), RepositoryError>;
}

#[derive(Default)]
pub struct MemoryDungeonStore {
    progress: dashmap::DashMap<(AccountId, DungeonId), DungeonProgressRecord>,
    completions: dashmap::DashMap<AccountId, Vec<DungeonCompletionRecord>>,
}

impl MemoryDungeonStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completions_for(&self, account: AccountId) -> Vec<DungeonCompletionRecord> {
        self.completions.get(&account).map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DungeonStore for MemoryDungeonStore {
    async fn save_progress(&self, record: DungeonProgressRecord) -> Result<(), RepositoryError> {
        self.progress
            .insert((record.account_id, record.dungeon_id), record);
        Ok(())
    }

    async fn record_completion(
        &self,
        record: DungeonCompletionRecord,
    ) -> Result<(), RepositoryError> {
        self.completions.entry(record.account_id).or_default().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completions_accumulate_per_account() {
        let store = MemoryDungeonStore::new();
        let account = AccountId::new();
        store
            .record_completion(DungeonCompletionRecord {
                account_id: account,
                dungeon_id: DungeonId::new(),
                xp: 100,
                credits: 50,
                crystals: 1,
                completed_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
        assert_eq!(store.completions_for(account).len(), 1);
    }
}
