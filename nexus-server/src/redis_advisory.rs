//! Cross-instance advisory publisher: republishes room-level events to a
//! `redis` pub/sub channel for other rooms/instances to observe. Purely
//! advisory — no room logic ever reads from Redis, so a publish failure
//! only costs visibility, never correctness, and is logged rather than
//! propagated.

use nexus_core::ids::{AccountId, DungeonId, EntityId};
use redis::aio::ConnectionManager;
use serde::Serialize;

const CHANNEL: &str = "nexusroom:advisory";

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AdvisoryEvent {
    PlayerJoined { account_id: AccountId },
    PlayerLeft { account_id: AccountId },
    Kill { killer: AccountId, enemy: EntityId },
    DungeonCompleted { account_id: AccountId, dungeon_id: DungeonId },
}

#[derive(Debug, thiserror::Error)]
pub enum RedisAdvisoryError {
    #[error("failed to connect to redis at {url}: {source}")]
    Connect { url: String, source: redis::RedisError },
    #[error("failed to publish advisory event: {0}")]
    Publish(#[from] redis::RedisError),
}

/// Publishes [`AdvisoryEvent`]s over a multiplexed async connection. Built
/// only when `REDIS_URL` is configured; absent that, rooms never construct
/// one and this module is otherwise inert.
pub struct RedisAdvisory {
    conn: ConnectionManager,
}

impl RedisAdvisory {
    pub async fn connect(url: &str) -> Result<Self, RedisAdvisoryError> {
        let client = redis::Client::open(url).map_err(|source| RedisAdvisoryError::Connect {
            url: url.to_string(),
            source,
        })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|source| RedisAdvisoryError::Connect { url: url.to_string(), source })?;
        log::info!("redis advisory publisher connected");
        Ok(Self { conn })
    }

    pub async fn publish(&self, event: &AdvisoryEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("failed to encode advisory event: {err}");
                return;
            }
        };
        let mut conn = self.conn.clone();
        if let Err(err) = redis::cmd("PUBLISH")
            .arg(CHANNEL)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
        {
            log::warn!("failed to publish advisory event: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_events_serialize_with_an_event_tag() {
        let event = AdvisoryEvent::PlayerJoined { account_id: AccountId::new() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "playerJoined");
    }
}
