//! Pinned game constants. Several of these have a process-level config
//! override (see `nexus-server::config::Config`); the values here are the
//! defaults a fresh config resolves to.

use std::time::Duration;

/// Fixed simulation rate. Everything in the tick loop is keyed off this.
pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_DURATION: Duration = Duration::from_millis(1000 / TICK_RATE_HZ as u64);

pub const PLAYER_BASE_SPEED: f64 = 5.0;
pub const SPELL_CAST_RANGE: f64 = 20.0;
pub const ENEMY_SPAWN_INTERVAL: Duration = Duration::from_secs(5);
pub const RESOURCE_RESPAWN: Duration = Duration::from_secs(30);
pub const LOOT_EXPIRY: Duration = Duration::from_secs(60);
pub const ROOM_CAPACITY: usize = 1000;
pub const WORLD_BOSS_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

pub const MAX_ENEMIES: usize = 50;
pub const SPATIAL_CELL_SIZE: f64 = 10.0;

pub const COMBO_WINDOW: Duration = Duration::from_secs(8);
pub const COMBO_MULTIPLIER_CAP: f64 = 3.0;

pub const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(60);
pub const REPOSITORY_CACHE_TTL: Duration = Duration::from_millis(100);
pub const BATCH_SAVE_SIZE: usize = 75;

pub const DELTA_BROADCAST_INTERVAL_TICKS: u64 = 5;
pub const BATCH_FLUSH_HZ: u32 = 10;

pub const TRADE_EXPIRY: Duration = Duration::from_secs(5 * 60);
pub const TRADE_AUDIT_LOG_CAP: usize = 1000;

pub const METRICS_RING_CAP: usize = 10_000;
pub const LOGS_RING_CAP: usize = 5_000;
pub const ALERT_EVALUATION_INTERVAL: Duration = Duration::from_secs(5);
pub const ALERT_WINDOW: Duration = Duration::from_secs(60);
pub const ALERT_ESCALATION_AFTER: Duration = Duration::from_secs(5 * 60);

pub const MEMORY_HYGIENE_INTERVAL: Duration = Duration::from_secs(30);
