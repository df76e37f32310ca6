//! `sql` backend: an async `sqlx` pool against Postgres. Schema uses a
//! `players` table keyed by character id, JSON columns for the collaborator
//! blobs this core doesn't interpret.
//!
//! Queries use `sqlx::query_as` (runtime-checked) rather than the
//! `query_as!` macro: the macro needs a live `DATABASE_URL` at compile
//! time to verify column types, which this workspace cannot assume.

use async_trait::async_trait;
use nexus_core::ids::{AccountId, CharacterId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dungeon::{DungeonCompletionRecord, DungeonProgressRecord, DungeonStore};
use crate::error::RepositoryError;
use crate::record::{CharacterSummary, PlayerRecord};
use crate::store::PlayerStore;

pub struct SqlStore {
    pool: PgPool,
}

impl SqlStore {
    /// Connects and ensures the `players` table exists. Migrations proper
    /// belong to a deploy pipeline; this is the minimal bootstrap so tests
    /// against a scratch database don't need an external migration step.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                character_id UUID PRIMARY KEY,
                account_id UUID NOT NULL,
                name TEXT NOT NULL,
                race TEXT NOT NULL,
                level INTEGER NOT NULL,
                xp BIGINT NOT NULL,
                credits BIGINT NOT NULL,
                hp BIGINT NOT NULL,
                max_hp BIGINT NOT NULL,
                mana BIGINT NOT NULL,
                max_mana BIGINT NOT NULL,
                pos_x DOUBLE PRECISION NOT NULL,
                pos_y DOUBLE PRECISION NOT NULL,
                pos_z DOUBLE PRECISION NOT NULL,
                rotation DOUBLE PRECISION NOT NULL,
                inventory JSONB NOT NULL,
                equipped_spells JSONB NOT NULL,
                quests JSONB NOT NULL,
                achievements JSONB NOT NULL,
                battle_pass JSONB NOT NULL,
                guild_id TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                last_login TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (account_id, name)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dungeon_progress (
                account_id UUID NOT NULL,
                dungeon_id TEXT NOT NULL,
                current_floor INTEGER NOT NULL,
                rooms_cleared JSONB NOT NULL,
                entities_defeated JSONB NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (account_id, dungeon_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dungeon_completions (
                id BIGSERIAL PRIMARY KEY,
                account_id UUID NOT NULL,
                dungeon_id TEXT NOT NULL,
                xp BIGINT NOT NULL,
                credits BIGINT NOT NULL,
                crystals BIGINT NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        Ok(Self { pool })
    }
}

struct PlayerRow {
    character_id: Uuid,
    account_id: Uuid,
    name: String,
    race: String,
    level: i32,
    xp: i64,
    credits: i64,
    hp: i64,
    max_hp: i64,
    mana: i64,
    max_mana: i64,
    pos_x: f64,
    pos_y: f64,
    pos_z: f64,
    rotation: f64,
    inventory: serde_json::Value,
    equipped_spells: serde_json::Value,
    quests: serde_json::Value,
    achievements: serde_json::Value,
    battle_pass: serde_json::Value,
    guild_id: Option<String>,
    created_at: OffsetDateTime,
    last_login: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl FromRow<'_, sqlx::postgres::PgRow> for PlayerRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            character_id: row.try_get("character_id")?,
            account_id: row.try_get("account_id")?,
            name: row.try_get("name")?,
            race: row.try_get("race")?,
            level: row.try_get("level")?,
            xp: row.try_get("xp")?,
            credits: row.try_get("credits")?,
            hp: row.try_get("hp")?,
            max_hp: row.try_get("max_hp")?,
            mana: row.try_get("mana")?,
            max_mana: row.try_get("max_mana")?,
            pos_x: row.try_get("pos_x")?,
            pos_y: row.try_get("pos_y")?,
            pos_z: row.try_get("pos_z")?,
            rotation: row.try_get("rotation")?,
            inventory: row.try_get("inventory")?,
            equipped_spells: row.try_get("equipped_spells")?,
            quests: row.try_get("quests")?,
            achievements: row.try_get("achievements")?,
            battle_pass: row.try_get("battle_pass")?,
            guild_id: row.try_get("guild_id")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<PlayerRow> for PlayerRecord {
    fn from(row: PlayerRow) -> Self {
        Self {
            character_id: CharacterId::from(row.character_id),
            account_id: AccountId::from(row.account_id),
            name: row.name,
            race: row.race,
            level: row.level as u32,
            xp: row.xp as u64,
            credits: row.credits as u64,
            hp: row.hp,
            max_hp: row.max_hp,
            mana: row.mana,
            max_mana: row.max_mana,
            position: (row.pos_x, row.pos_y, row.pos_z),
            rotation: row.rotation,
            inventory: row.inventory,
            equipped_spells: row.equipped_spells,
            quests: row.quests,
            achievements: row.achievements,
            battle_pass: row.battle_pass,
            guild_id: row.guild_id,
            created_at: row.created_at,
            last_login: row.last_login,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PlayerStore for SqlStore {
    async fn load(&self, id: CharacterId) -> Result<Option<PlayerRecord>, RepositoryError> {
        let row: Option<PlayerRow> = sqlx::query_as(
            r#"SELECT character_id, account_id, name, race, level, xp, credits, hp, max_hp,
                      mana, max_mana, pos_x, pos_y, pos_z, rotation, inventory, equipped_spells,
                      quests, achievements, battle_pass, guild_id, created_at, last_login, updated_at
               FROM players WHERE character_id = $1"#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        Ok(row.map(PlayerRecord::from))
    }

    async fn save(&self, record: &PlayerRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO players (
                character_id, account_id, name, race, level, xp, credits, hp, max_hp,
                mana, max_mana, pos_x, pos_y, pos_z, rotation, inventory, equipped_spells,
                quests, achievements, battle_pass, guild_id, created_at, last_login, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
            ON CONFLICT (character_id) DO UPDATE SET
                name = EXCLUDED.name, race = EXCLUDED.race, level = EXCLUDED.level,
                xp = EXCLUDED.xp, credits = EXCLUDED.credits, hp = EXCLUDED.hp,
                max_hp = EXCLUDED.max_hp, mana = EXCLUDED.mana, max_mana = EXCLUDED.max_mana,
                pos_x = EXCLUDED.pos_x, pos_y = EXCLUDED.pos_y, pos_z = EXCLUDED.pos_z,
                rotation = EXCLUDED.rotation, inventory = EXCLUDED.inventory,
                equipped_spells = EXCLUDED.equipped_spells, quests = EXCLUDED.quests,
                achievements = EXCLUDED.achievements, battle_pass = EXCLUDED.battle_pass,
                guild_id = EXCLUDED.guild_id, last_login = EXCLUDED.last_login,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.character_id.0)
        .bind(record.account_id.0)
        .bind(&record.name)
        .bind(&record.race)
        .bind(record.level as i32)
        .bind(record.xp as i64)
        .bind(record.credits as i64)
        .bind(record.hp)
        .bind(record.max_hp)
        .bind(record.mana)
        .bind(record.max_mana)
        .bind(record.position.0)
        .bind(record.position.1)
        .bind(record.position.2)
        .bind(record.rotation)
        .bind(&record.inventory)
        .bind(&record.equipped_spells)
        .bind(&record.quests)
        .bind(&record.achievements)
        .bind(&record.battle_pass)
        .bind(&record.guild_id)
        .bind(record.created_at)
        .bind(record.last_login)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CharacterSummary>, RepositoryError> {
        let rows: Vec<PlayerRow> = sqlx::query_as(
            r#"SELECT character_id, account_id, name, race, level, xp, credits, hp, max_hp,
                      mana, max_mana, pos_x, pos_y, pos_z, rotation, inventory, equipped_spells,
                      quests, achievements, battle_pass, guild_id, created_at, last_login, updated_at
               FROM players WHERE account_id = $1 ORDER BY last_login DESC"#,
        )
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(PlayerRecord::from)
            .map(|record| CharacterSummary::from(&record))
            .collect())
    }

    async fn count_by_account(&self, account_id: AccountId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE account_id = $1")
            .bind(account_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;
        Ok(count as u64)
    }

    async fn name_exists(
        &self,
        name: &str,
        excluding: Option<CharacterId>,
        account: Option<AccountId>,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                SELECT 1 FROM players
                WHERE name = $1
                  AND ($2::uuid IS NULL OR character_id != $2)
                  AND ($3::uuid IS NULL OR account_id = $3)
            )"#,
        )
        .bind(name)
        .bind(excluding.map(|id| id.0))
        .bind(account.map(|id| id.0))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;

        Ok(exists)
    }
}

#[async_trait]
impl DungeonStore for SqlStore {
    async fn save_progress(&self, record: DungeonProgressRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO dungeon_progress (
                account_id, dungeon_id, current_floor, rooms_cleared, entities_defeated, started_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id, dungeon_id) DO UPDATE SET
                current_floor = EXCLUDED.current_floor,
                rooms_cleared = EXCLUDED.rooms_cleared,
                entities_defeated = EXCLUDED.entities_defeated
            "#,
        )
        .bind(record.account_id.0)
        .bind(record.dungeon_id.0.to_string())
        .bind(record.current_floor as i32)
        .bind(serde_json::to_value(&record.rooms_cleared).unwrap_or_default())
        .bind(serde_json::to_value(&record.entities_defeated).unwrap_or_default())
        .bind(record.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn record_completion(
        &self,
        record: DungeonCompletionRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO dungeon_completions (account_id, dungeon_id, xp, credits, crystals, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.account_id.0)
        .bind(record.dungeon_id.0.to_string())
        .bind(record.xp as i64)
        .bind(record.credits as i64)
        .bind(record.crystals as i64)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
