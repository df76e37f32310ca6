//! Room-owned, session-scoped entity types. None of these
//! carry `serde` impls: the wire schema lives in `nexus-protocol` and is
//! deliberately decoupled from these internal collection types —
//! `nexus-server`'s replication pipeline is
//! the only place that maps one to the other.

use std::str::FromStr;
use std::time::Instant;

use nexus_core::ids::{AccountId, CharacterId, EntityId, GuildId};
use nexus_core::vector::Vector3;
use nexus_repository::PlayerRecord;

#[derive(Debug, Clone)]
pub struct Player {
    pub account_id: AccountId,
    pub character_id: CharacterId,
    pub name: String,
    pub race: String,
    pub position: Vector3,
    pub heading: f64,
    pub hp: i64,
    pub max_hp: i64,
    pub mana: i64,
    pub max_mana: i64,
    pub level: u32,
    pub guild_id: Option<GuildId>,
}

impl Player {
    #[must_use]
    pub fn new(
        account_id: AccountId,
        character_id: CharacterId,
        name: String,
        race: String,
        position: Vector3,
    ) -> Self {
        Self {
            account_id,
            character_id,
            name,
            race,
            position,
            heading: 0.0,
            hp: 100,
            max_hp: 100,
            mana: 100,
            max_mana: 100,
            level: 1,
            guild_id: None,
        }
    }

    /// Enforces `0 <= hp <= max_hp`, `0 <= mana <= max_mana`.
    pub fn clamp_stats(&mut self) {
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mana = self.mana.clamp(0, self.max_mana);
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Hydrates a session-scoped view from a loaded persistent record,
    /// if present, initializing the session player from it.
    #[must_use]
    pub fn from_record(record: &PlayerRecord) -> Self {
        Self {
            account_id: record.account_id,
            character_id: record.character_id,
            name: record.name.clone(),
            race: record.race.clone(),
            position: Vector3::new(record.position.0, record.position.1, record.position.2),
            heading: record.rotation,
            hp: record.hp,
            max_hp: record.max_hp,
            mana: record.mana,
            max_mana: record.max_mana,
            level: record.level,
            guild_id: record
                .guild_id
                .as_deref()
                .and_then(|s| GuildId::from_str(s).ok()),
        }
    }

    /// Writes this session view's mutable fields back into `record`,
    /// leaving the collaborator-owned JSON blobs (inventory, quests,
    /// achievements, battle pass) untouched — this view never mutates
    /// them.
    pub fn apply_to_record(&self, record: &mut PlayerRecord) {
        record.name = self.name.clone();
        record.race = self.race.clone();
        record.position = (self.position.x, self.position.y, self.position.z);
        record.rotation = self.heading;
        record.hp = self.hp;
        record.max_hp = self.max_hp;
        record.mana = self.mana;
        record.max_mana = self.max_mana;
        record.level = self.level;
        record.guild_id = self.guild_id.map(|id| id.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub enemy_type: String,
    pub position: Vector3,
    pub heading: f64,
    pub hp: i64,
    pub max_hp: i64,
    pub level: u32,
    /// Immutable for the enemy's lifetime.
    pub spawn_anchor: Vector3,
}

impl Enemy {
    #[must_use]
    pub fn new(id: EntityId, enemy_type: impl Into<String>, position: Vector3, level: u32, hp: i64) -> Self {
        Self {
            id,
            enemy_type: enemy_type.into(),
            position,
            heading: 0.0,
            hp,
            max_hp: hp,
            level,
            spawn_anchor: position,
        }
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub spell: String,
    pub caster_id: AccountId,
    pub position: Vector3,
    /// Unit direction vector.
    pub direction: Vector3,
    pub speed: f64,
    pub ttl_ms: i64,
}

impl Projectile {
    #[must_use]
    pub fn new(
        id: EntityId,
        spell: impl Into<String>,
        caster_id: AccountId,
        position: Vector3,
        direction: Vector3,
        speed: f64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id,
            spell: spell.into(),
            caster_id,
            position,
            direction: direction.normalized(),
            speed,
            ttl_ms,
        }
    }

    /// Advances position by `speed * dt` and decrements TTL.
    pub fn advance(&mut self, dt_ms: i64) {
        let dt_s = dt_ms as f64 / 1000.0;
        self.position = self.position.add(self.direction.scale(self.speed * dt_s));
        self.ttl_ms -= dt_ms;
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.ttl_ms <= 0
    }
}

#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub id: EntityId,
    pub node_type: String,
    pub position: Vector3,
    pub last_harvested: Option<Instant>,
    pub respawn_ms: u64,
}

impl ResourceNode {
    #[must_use]
    pub fn is_available(&self, now: Instant) -> bool {
        match self.last_harvested {
            None => true,
            Some(harvested) => now.duration_since(harvested).as_millis() as u64 >= self.respawn_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LootDrop {
    pub id: EntityId,
    pub item: String,
    pub position: Vector3,
    /// Bound to the first picker; once set only that player may pick up.
    pub owner_id: Option<AccountId>,
    pub expires_at: Instant,
}

impl LootDrop {
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn can_be_picked_up_by(&self, account: AccountId) -> bool {
        match self.owner_id {
            None => true,
            Some(owner) => owner == account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrate_from_record_then_apply_back_round_trips() {
        let mut record = PlayerRecord::new(AccountId::new(), "Alice".into(), "human".into());
        record.position = (1.0, 2.0, 3.0);
        record.hp = 40;

        let mut player = Player::from_record(&record);
        assert_eq!(player.name, "Alice");
        assert_eq!(player.position, Vector3::new(1.0, 2.0, 3.0));

        player.hp = 10;
        player.apply_to_record(&mut record);
        assert_eq!(record.hp, 10);
        assert_eq!(record.name, "Alice");
    }

    #[test]
    fn projectile_advances_and_expires() {
        let mut p = Projectile::new(
            EntityId(1),
            "fireball",
            AccountId::new(),
            Vector3::ZERO,
            Vector3::new(1.0, 0.0, 0.0),
            10.0,
            50,
        );
        p.advance(16);
        assert!((p.position.x - 0.16).abs() < 1e-9);
        assert!(!p.expired());
        p.advance(40);
        assert!(p.expired());
    }

    #[test]
    fn loot_ownership_gate() {
        let owner = AccountId::new();
        let other = AccountId::new();
        let drop = LootDrop {
            id: EntityId(1),
            item: "gold".into(),
            position: Vector3::ZERO,
            owner_id: Some(owner),
            expires_at: Instant::now() + std::time::Duration::from_secs(60),
        };
        assert!(drop.can_be_picked_up_by(owner));
        assert!(!drop.can_be_picked_up_by(other));
    }
}
