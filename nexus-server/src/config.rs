//! Room configuration. Loaded from an optional TOML file with
//! environment-variable overrides for deployment-specific knobs.

use std::path::Path;

use nexus_core::constants::{
    ENEMY_SPAWN_INTERVAL, LOOT_EXPIRY, PLAYER_BASE_SPEED, RESOURCE_RESPAWN, ROOM_CAPACITY,
    SPELL_CAST_RANGE, WORLD_BOSS_INTERVAL,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Starting port for the accept loop's probe-and-bind sequence.
pub const DEFAULT_PORT: u16 = 2567;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// No `TokenVerifier` configured: the transport-assigned session id
    /// stands in for the account id.
    None,
    Token,
}

impl Default for IdentityMode {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Sql,
}

impl Default for StoreKind {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub database_url: Option<String>,
}

/// The subset of game constants a deployment may override; everything else
/// (tick rate, spatial cell size, combo window, ...) is fixed and lives
/// only in `nexus_core::constants`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub player_base_speed: f64,
    pub spell_cast_range: f64,
    pub enemy_spawn_interval_ms: u64,
    pub resource_respawn_ms: u64,
    pub loot_expiry_ms: u64,
    pub room_capacity: usize,
    pub world_boss_interval_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_base_speed: PLAYER_BASE_SPEED,
            spell_cast_range: SPELL_CAST_RANGE,
            enemy_spawn_interval_ms: ENEMY_SPAWN_INTERVAL.as_millis() as u64,
            resource_respawn_ms: RESOURCE_RESPAWN.as_millis() as u64,
            loot_expiry_ms: LOOT_EXPIRY.as_millis() as u64,
            room_capacity: ROOM_CAPACITY,
            world_boss_interval_ms: WORLD_BOSS_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: Port,
    pub identity: IdentityConfig,
    pub store: StoreConfig,
    pub redis_url: Option<String>,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u16);

impl Default for Port {
    fn default() -> Self {
        Self(DEFAULT_PORT)
    }
}

impl Config {
    /// Loads `path` if it exists, falling back to defaults, then applies
    /// environment overrides. Missing file is not an error, a
    /// present-but-malformed one is.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            log::info!("no config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT").and_then(|v| v.parse().map_err(|_| std::env::VarError::NotPresent)) {
            self.port = Port(port);
        }
        if let Ok(mode) = std::env::var("NEXUS_IDENTITY_MODE") {
            self.identity.mode = match mode.as_str() {
                "token" => IdentityMode::Token,
                _ => IdentityMode::None,
            };
        }
        if let Ok(store) = std::env::var("NEXUS_STORE") {
            self.store.kind = match store.as_str() {
                "sql" => StoreKind::Sql,
                _ => StoreKind::Memory,
            };
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.store.database_url = Some(url);
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_game_constants() {
        let config = Config::default();
        assert_eq!(config.port.0, DEFAULT_PORT);
        assert_eq!(config.game.room_capacity, ROOM_CAPACITY);
        assert_eq!(config.identity.mode, IdentityMode::None);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/nexus-config.toml")).unwrap();
        assert_eq!(config.store.kind, StoreKind::Memory);
    }
}
