//! Error types owned by the room runtime itself. Every per-crate error
//! (`RepositoryError`, `DungeonError`, `TradeError`, `GuildError`) folds
//! into [`RoomError`] so the tick loop and message handlers have one type
//! to propagate, following one policy throughout: reject the action,
//! optionally send a typed error back, never let one bad message take the
//! room down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("auth token missing")]
    AuthRequired,
    #[error("auth token invalid: {0}")]
    AuthInvalid(String),
    #[error("display name already taken")]
    NameTaken,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Repository(#[from] nexus_repository::RepositoryError),
    #[error(transparent)]
    Dungeon(#[from] nexus_world::dungeon::DungeonError),
    #[error(transparent)]
    Trade(#[from] nexus_trading::TradeError),
    #[error(transparent)]
    Guild(#[from] nexus_world::GuildError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("unknown session")]
    UnknownSession,
    #[error("invalid id: {0}")]
    InvalidId(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
