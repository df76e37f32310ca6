//! The persistent player record. This is the full mutable state block that survives
//! across sessions; the room's session-scoped `Player` view (owned by
//! `nexus-world`) is hydrated from, and saved back into, this record.

use nexus_core::ids::{AccountId, CharacterId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::RepositoryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub character_id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub race: String,

    pub level: u32,
    pub xp: u64,
    pub credits: u64,

    pub hp: i64,
    pub max_hp: i64,
    pub mana: i64,
    pub max_mana: i64,

    pub position: (f64, f64, f64),
    pub rotation: f64,

    /// Opaque JSON blobs owned by collaborators out of this core's scope:
    /// inventory, equipped spells, quests, achievements,
    /// battle-pass progress.
    pub inventory: Value,
    pub equipped_spells: Value,
    pub quests: Value,
    pub achievements: Value,
    pub battle_pass: Value,

    pub guild_id: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PlayerRecord {
    #[must_use]
    pub fn new(account_id: AccountId, name: String, race: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            character_id: CharacterId::new(),
            account_id,
            name,
            race,
            level: 1,
            xp: 0,
            credits: 0,
            hp: 100,
            max_hp: 100,
            mana: 100,
            max_mana: 100,
            position: (0.0, 1.0, 0.0),
            rotation: 0.0,
            inventory: Value::Array(vec![]),
            equipped_spells: Value::Array(vec![]),
            quests: Value::Object(serde_json::Map::new()),
            achievements: Value::Object(serde_json::Map::new()),
            battle_pass: Value::Object(serde_json::Map::new()),
            guild_id: None,
            created_at: now,
            last_login: now,
            updated_at: now,
        }
    }

    /// Enforces the invariants `save` requires checked/clamped:
    /// `hp ∈ [0, max_hp]`, `mana ∈ [0, max_mana]`, `1 ≤ level ≤ 100`,
    /// `name.length ∈ [1,100]`. Clamps hp/mana; hard-errors on the rest
    /// since those indicate a corrupt write rather than a sane out-of-range
    /// stat.
    pub fn enforce_invariants(&mut self) -> Result<(), RepositoryError> {
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mana = self.mana.clamp(0, self.max_mana);
        if !(1..=100).contains(&self.level) {
            return Err(RepositoryError::InvariantViolation(format!(
                "level {} out of range [1,100]",
                self.level
            )));
        }
        if !nexus_core::text::is_valid_display_name(&self.name) {
            return Err(RepositoryError::InvariantViolation(format!(
                "name length {} out of range [1,100]",
                self.name.chars().count()
            )));
        }
        Ok(())
    }
}

/// Row returned by `listByAccount`: a lightweight character summary rather
/// than the full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub character_id: CharacterId,
    pub name: String,
    pub race: String,
    pub level: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login: OffsetDateTime,
}

impl From<&PlayerRecord> for CharacterSummary {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            character_id: record.character_id,
            name: record.name.clone(),
            race: record.race.clone(),
            level: record.level,
            last_login: record.last_login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_invariants_clamps_hp_and_mana() {
        let mut record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        record.hp = -5;
        record.mana = 9999;
        record.enforce_invariants().unwrap();
        assert_eq!(record.hp, 0);
        assert_eq!(record.mana, record.max_mana);
    }

    #[test]
    fn enforce_invariants_rejects_out_of_range_level() {
        let mut record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        record.level = 0;
        assert!(record.enforce_invariants().is_err());
        record.level = 101;
        assert!(record.enforce_invariants().is_err());
    }

    #[test]
    fn enforce_invariants_rejects_empty_name() {
        let mut record = PlayerRecord::new(AccountId::new(), String::new(), "human".into());
        assert!(record.enforce_invariants().is_err());
    }
}
