//! `PlayerStore` is the backend trait the facade (`PlayerRepository`)
//! dispatches to: a thin public facade, a private trait object per
//! storage backend.

use async_trait::async_trait;
use dashmap::DashMap;
use nexus_core::ids::{AccountId, CharacterId};

use crate::error::RepositoryError;
use crate::record::{CharacterSummary, PlayerRecord};

#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn load(&self, id: CharacterId) -> Result<Option<PlayerRecord>, RepositoryError>;
    async fn save(&self, record: &PlayerRecord) -> Result<(), RepositoryError>;
    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CharacterSummary>, RepositoryError>;
    async fn count_by_account(&self, account_id: AccountId) -> Result<u64, RepositoryError>;
    async fn name_exists(
        &self,
        name: &str,
        excluding: Option<CharacterId>,
        account: Option<AccountId>,
    ) -> Result<bool, RepositoryError>;
}

/// In-memory store, `DashMap`-backed. Used for tests and single-process
/// deployments with `store: memory`.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<CharacterId, PlayerRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn load(&self, id: CharacterId) -> Result<Option<PlayerRecord>, RepositoryError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn save(&self, record: &PlayerRecord) -> Result<(), RepositoryError> {
        self.records.insert(record.character_id, record.clone());
        Ok(())
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CharacterSummary>, RepositoryError> {
        let mut summaries: Vec<CharacterSummary> = self
            .records
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| CharacterSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| b.last_login.cmp(&a.last_login));
        Ok(summaries)
    }

    async fn count_by_account(&self, account_id: AccountId) -> Result<u64, RepositoryError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .count() as u64)
    }

    async fn name_exists(
        &self,
        name: &str,
        excluding: Option<CharacterId>,
        account: Option<AccountId>,
    ) -> Result<bool, RepositoryError> {
        Ok(self.records.iter().any(|entry| {
            entry.name == name
                && Some(entry.character_id) != excluding
                && account.map_or(true, |acc| entry.account_id == acc)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        let id = record.character_id;
        store.save(&record).await.unwrap();
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Alice");
    }

    #[tokio::test]
    async fn name_exists_is_case_sensitive_and_account_scoped() {
        let store = MemoryStore::new();
        let account = AccountId::new();
        let other_account = AccountId::new();
        let record = PlayerRecord::new(account, "Alice".into(), "human".into());
        store.save(&record).await.unwrap();

        assert!(store.name_exists("Alice", None, None).await.unwrap());
        assert!(!store.name_exists("alice", None, None).await.unwrap());
        assert!(store
            .name_exists("Alice", None, Some(other_account))
            .await
            .unwrap()
            .eq(&false));
        assert!(store
            .name_exists("Alice", Some(record.character_id), None)
            .await
            .unwrap()
            .eq(&false));
    }
}
