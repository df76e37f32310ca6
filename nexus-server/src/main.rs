//! NexusRoom server binary: wires the collaborator seams together, spawns
//! one [`nexus_server::Room`], and drives the WebSocket accept loop.
//! Collaborator systems out of this core's scope (identity, quests,
//! achievements, battle pass) are always wired to their no-op/pass-through
//! default here — a real deployment swaps them by linking a different
//! binary against this library, not by branching inside it.

use std::path::Path;
use std::sync::Arc;

use log::LevelFilter;
use nexus_registry::{AlwaysAllowVerifier, NoopAchievementSystem, NoopBattlePass, NoopQuestSystem};
use nexus_repository::{MemoryStore, PlayerRepository, PlayerStore};
use nexus_server::config::{Config, StoreKind};
use nexus_server::monitoring::MonitoringCore;
use nexus_server::{transport, Room};

const CONFIG_PATH: &str = "nexus-server.toml";

#[tokio::main]
async fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .expect("logger already initialized");

    let config = Config::load(Path::new(CONFIG_PATH)).expect("failed to load configuration");
    let port = config.port.0;

    let repository = Arc::new(PlayerRepository::new(build_store(&config).await));
    let monitoring = Arc::new(MonitoringCore::new());

    let room = Room::new(
        config,
        repository,
        Arc::new(AlwaysAllowVerifier),
        Arc::new(NoopQuestSystem),
        Arc::new(NoopAchievementSystem),
        Arc::new(NoopBattlePass),
        monitoring,
    );

    #[cfg(feature = "redis-advisory")]
    let room = attach_advisory(room).await;

    let handle = room.spawn();

    let listener = transport::bind(port).await.expect("failed to bind any port in the probe range");
    log::info!("nexus-server ready");
    transport::run_accept_loop(listener, handle).await;
}

async fn build_store(config: &Config) -> Arc<dyn PlayerStore> {
    match config.store.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sql => build_sql_store(config).await,
    }
}

#[cfg(feature = "sql")]
async fn build_sql_store(config: &Config) -> Arc<dyn PlayerStore> {
    let url = config.store.database_url.as_deref().expect("store.kind = sql requires database_url");
    Arc::new(
        nexus_repository::SqlStore::connect(url)
            .await
            .expect("failed to connect to the configured sql store"),
    )
}

#[cfg(not(feature = "sql"))]
async fn build_sql_store(_config: &Config) -> Arc<dyn PlayerStore> {
    log::error!("store.kind = sql requested but this binary was built without the `sql` feature; falling back to memory");
    Arc::new(MemoryStore::new())
}

#[cfg(feature = "redis-advisory")]
async fn attach_advisory(room: Room) -> Room {
    let Some(url) = room.config.redis_url.clone() else {
        return room;
    };
    match nexus_server::redis_advisory::RedisAdvisory::connect(&url).await {
        Ok(advisory) => room.with_advisory(Arc::new(advisory)),
        Err(err) => {
            log::error!("redis advisory publisher disabled: {err}");
            room
        }
    }
}
