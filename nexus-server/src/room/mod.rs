//! The room runtime: a single owner task draining one `mpsc` command queue,
//! the "one owner task per room" concurrency model `Room::run` implements.
//! Client messages and internal timers both eventually become a method
//! call on this one `Room` value, so nothing inside the room ever needs a
//! lock.
//!
//! This build runs one `Room` per process rather than a multi-room registry
//! (see DESIGN.md) — room-capacity and lifecycle rules still apply to it
//! unchanged.

pub mod handlers;
pub mod replication;
pub mod state;
pub mod tick;

use std::sync::Arc;
use std::time::{Duration, Instant};

use nexus_core::ids::{AccountId, RoomId, SessionId};
use nexus_protocol::{CloseCode, InboundMessage, OutboundMessage};
use nexus_registry::{AchievementSystem, BattlePass, Monitoring, QuestSystem, TokenVerifier, TokenVerifyError};
use nexus_repository::{PlayerRecord, PlayerRepository};
use nexus_world::entities::Player;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::monitoring::{AlertRule, MonitoringCore};
use replication::ReplicationPipeline;
use state::{RoomState, SessionHandle};

const COMMAND_QUEUE_CAPACITY: usize = 1024;

pub enum RoomCommand {
    Connect {
        token: Option<String>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<Result<ConnectedSession, CloseCode>>,
    },
    Inbound {
        session_id: SessionId,
        message: InboundMessage,
    },
    Disconnect {
        session_id: SessionId,
    },
}

pub struct ConnectedSession {
    pub account_id: AccountId,
    pub session_id: SessionId,
    pub close_rx: oneshot::Receiver<CloseCode>,
}

/// Clonable handle transport connections use to talk to the room's single
/// owner task.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub async fn connect(
        &self,
        token: Option<String>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ConnectedSession, CloseCode> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomCommand::Connect { token, outbound, reply })
            .await
            .is_err()
        {
            return Err(CloseCode::Admin);
        }
        rx.await.unwrap_or(Err(CloseCode::Admin))
    }

    pub async fn inbound(&self, session_id: SessionId, message: InboundMessage) {
        let _ = self.sender.send(RoomCommand::Inbound { session_id, message }).await;
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        let _ = self.sender.send(RoomCommand::Disconnect { session_id }).await;
    }
}

/// Everything one room owns: state, the replication pipeline, and the
/// collaborator seams (store, identity, quest/achievement/battle-pass,
/// monitoring).
pub struct Room {
    pub id: RoomId,
    pub config: Config,
    pub state: RoomState,
    pub replication: ReplicationPipeline,
    pub repository: Arc<PlayerRepository>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub quests: Arc<dyn QuestSystem>,
    pub achievements: Arc<dyn AchievementSystem>,
    pub battle_pass: Arc<dyn BattlePass>,
    pub monitoring: Arc<MonitoringCore>,
    #[cfg(feature = "redis-advisory")]
    pub advisory: Option<Arc<crate::redis_advisory::RedisAdvisory>>,
}

impl Room {
    #[must_use]
    pub fn new(
        config: Config,
        repository: Arc<PlayerRepository>,
        token_verifier: Arc<dyn TokenVerifier>,
        quests: Arc<dyn QuestSystem>,
        achievements: Arc<dyn AchievementSystem>,
        battle_pass: Arc<dyn BattlePass>,
        monitoring: Arc<MonitoringCore>,
    ) -> Self {
        monitoring.register_alert(
            "tick_time_high",
            AlertRule {
                metric: "tick_time_ms".into(),
                threshold: 1000.0 / f64::from(nexus_core::constants::TICK_RATE_HZ),
                op: nexus_registry::AlertOp::Gt,
            },
        );
        Self {
            id: RoomId::new(),
            config,
            state: RoomState::new(),
            replication: ReplicationPipeline::default(),
            repository,
            token_verifier,
            quests,
            achievements,
            battle_pass,
            monitoring,
            #[cfg(feature = "redis-advisory")]
            advisory: None,
        }
    }

    /// Attaches a publisher for cross-instance advisory events. Only
    /// available when `REDIS_URL` is configured; absent a call to this, the
    /// room never touches Redis.
    #[cfg(feature = "redis-advisory")]
    #[must_use]
    pub fn with_advisory(mut self, advisory: Arc<crate::redis_advisory::RedisAdvisory>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    #[cfg(feature = "redis-advisory")]
    fn publish_advisory(&self, event: crate::redis_advisory::AdvisoryEvent) {
        if let Some(advisory) = self.advisory.clone() {
            tokio::spawn(async move { advisory.publish(&event).await });
        }
    }

    /// Spawns the room's owner task and returns a handle to it.
    pub fn spawn(self) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(self.run(receiver));
        RoomHandle { sender }
    }

    /// The single consumer loop. Every branch here is the only place that
    /// ever mutates `self.state` — the "one owner task" invariant
    /// `Room::run` implements.
    async fn run(mut self, mut commands: mpsc::Receiver<RoomCommand>) {
        let mut tick_interval = tokio::time::interval(nexus_core::constants::TICK_DURATION);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let batch_flush_period = Duration::from_millis(1000 / u64::from(nexus_core::constants::BATCH_FLUSH_HZ));
        let mut batch_interval = tokio::time::interval(batch_flush_period);
        batch_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut enemy_spawn_interval =
            tokio::time::interval(Duration::from_millis(self.config.game.enemy_spawn_interval_ms));
        enemy_spawn_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut world_boss_interval =
            tokio::time::interval(Duration::from_millis(self.config.game.world_boss_interval_ms));
        world_boss_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut auto_save_interval = tokio::time::interval(nexus_core::constants::AUTO_SAVE_INTERVAL);
        auto_save_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut hygiene_interval = tokio::time::interval(nexus_core::constants::MEMORY_HYGIENE_INTERVAL);
        hygiene_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut alert_interval = tokio::time::interval(MonitoringCore::evaluation_interval());
        alert_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("room {} started", self.id);

        loop {
            tokio::select! {
                biased;

                Some(command) = commands.recv() => self.dispatch(command).await,
                _ = tick_interval.tick() => self.tick().await,
                _ = batch_interval.tick() => self.flush_batch(),
                _ = enemy_spawn_interval.tick() => self.spawn_enemies(),
                _ = world_boss_interval.tick() => self.maybe_spawn_world_boss(),
                _ = auto_save_interval.tick() => self.auto_save().await,
                _ = hygiene_interval.tick() => self.memory_hygiene(),
                _ = alert_interval.tick() => self.evaluate_alerts(),
                else => break,
            }
        }

        log::info!("room {} shut down (all senders dropped)", self.id);
    }

    async fn dispatch(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Connect { token, outbound, reply } => {
                let outcome = self.handle_connect(token, outbound).await;
                let _ = reply.send(outcome);
            }
            RoomCommand::Inbound { session_id, message } => {
                let Some(account_id) = self.state.account_for_session(session_id) else {
                    return;
                };
                self.handle_message(account_id, message).await;
            }
            RoomCommand::Disconnect { session_id } => {
                self.handle_disconnect(session_id).await;
            }
        }
    }

    async fn handle_connect(
        &mut self,
        token: Option<String>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ConnectedSession, CloseCode> {
        let identity = self.token_verifier.verify(token.as_deref()).await.map_err(|err| match err {
            TokenVerifyError::Missing => CloseCode::AuthRequired,
            TokenVerifyError::Invalid(_) => CloseCode::AuthInvalid,
        })?;
        let account_id = identity.account_id;

        if let Some(old) = self.state.sessions.remove(&account_id) {
            log::info!("account {account_id} reconnected, closing previous session {}", old.session_id);
            let _ = old.close.send(CloseCode::Admin);
        }

        let (player, record) = self.hydrate_player(account_id).await?;
        let character_id = player.character_id;

        self.state.player_grid.insert(account_id, player.position);
        self.state.players.insert(account_id, player);
        self.state.records.insert(account_id, record);
        self.state.character_of.insert(account_id, character_id);

        self.monitoring.record_metric(
            "room_clients",
            self.state.client_count() as f64,
            &std::collections::HashMap::new(),
        );
        #[cfg(feature = "redis-advisory")]
        self.publish_advisory(crate::redis_advisory::AdvisoryEvent::PlayerJoined { account_id });

        let session_id = SessionId::new();
        let (close_tx, close_rx) = oneshot::channel();
        let snapshot = replication::build_snapshot(&self.state);
        let _ = outbound.send(snapshot);
        self.state.sessions.insert(
            account_id,
            SessionHandle {
                session_id,
                outbound,
                close: close_tx,
            },
        );

        Ok(ConnectedSession {
            account_id,
            session_id,
            close_rx,
        })
    }

    /// Loads the player's most-recently-played character if one exists, or
    /// creates a fresh one. Character *selection* (choosing among several
    /// existing characters) is out of this system's scope, so the room
    /// always resumes the most recent one (see DESIGN.md).
    async fn hydrate_player(&self, account_id: AccountId) -> Result<(Player, PlayerRecord), CloseCode> {
        let summaries = self.repository.list_by_account(account_id).await;
        if let Some(summary) = summaries.first() {
            if let Some(mut record) = self.repository.load(summary.character_id).await {
                record.last_login = time::OffsetDateTime::now_utc();
                let player = Player::from_record(&record);
                return Ok((player, record));
            }
        }

        let name = default_display_name(account_id);
        if self.repository.name_exists(&name, None, Some(account_id)).await {
            return Err(CloseCode::NameTaken);
        }
        let record = PlayerRecord::new(account_id, name, "human".to_string());
        let player = Player::from_record(&record);
        Ok((player, record))
    }

    async fn handle_disconnect(&mut self, session_id: SessionId) {
        let Some(account_id) = self.state.account_for_session(session_id) else {
            return;
        };
        log::info!("account {account_id} disconnected");

        self.state.sessions.remove(&account_id);
        self.state.trades.on_disconnect(account_id);
        self.state.dungeons.exit(account_id);
        self.state.validator.clear_session(account_id);
        self.state.player_grid.remove(account_id);

        if let (Some(player), Some(mut record)) =
            (self.state.players.remove(&account_id), self.state.records.remove(&account_id))
        {
            player.apply_to_record(&mut record);
            if let Err(err) = self.repository.save(record) {
                log::error!("final save on disconnect failed for {account_id}: {err}");
            }
        }
        self.replication.batcher.remove("player", &account_id.to_string());

        self.monitoring.record_metric(
            "room_clients",
            self.state.client_count() as f64,
            &std::collections::HashMap::new(),
        );
        #[cfg(feature = "redis-advisory")]
        self.publish_advisory(crate::redis_advisory::AdvisoryEvent::PlayerLeft { account_id });
    }

    async fn auto_save(&mut self) {
        let records: Vec<PlayerRecord> = self
            .state
            .players
            .iter()
            .filter_map(|(account_id, player)| {
                let mut record = self.state.records.get(account_id)?.clone();
                player.apply_to_record(&mut record);
                Some(record)
            })
            .collect();
        if records.is_empty() {
            return;
        }
        let count = records.len();
        let failed = self.repository.save_batch(records).await;
        if !failed.is_empty() {
            log::warn!("auto-save: {}/{count} records failed and will retry next sweep", failed.len());
        } else {
            log::debug!("auto-save: {count} records saved");
        }
    }

    fn memory_hygiene(&mut self) {
        let now = Instant::now();
        self.state.combos.prune(now, nexus_core::constants::MEMORY_HYGIENE_INTERVAL);
        self.state.dungeons.release_idle(now);

        let expired_trades = self.state.trades.cleanup_expired(time::OffsetDateTime::now_utc());
        for trade_id in expired_trades {
            log::debug!("trade {trade_id} expired during memory hygiene sweep");
        }
    }

    fn evaluate_alerts(&self) {
        for (id, firing) in self.monitoring.evaluate_alerts(Instant::now()) {
            if firing.escalated {
                log::error!("alert {id} still firing and has escalated");
            } else {
                log::warn!("alert {id} firing");
            }
        }
    }

    fn flush_batch(&mut self) {
        if let Some(message) = self.replication.flush_batch() {
            self.state.broadcast(&message);
        }
    }
}

fn default_display_name(account_id: AccountId) -> String {
    let short: String = account_id.to_string().chars().take(8).collect();
    format!("Guest-{short}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_repository::{MemoryStore, PlayerRepository};
    use nexus_registry::{AlwaysAllowVerifier, NoopAchievementSystem, NoopBattlePass, NoopQuestSystem};

    fn test_room() -> Room {
        Room::new(
            Config::default(),
            Arc::new(PlayerRepository::new(Arc::new(MemoryStore::new()))),
            Arc::new(AlwaysAllowVerifier),
            Arc::new(NoopQuestSystem),
            Arc::new(NoopAchievementSystem),
            Arc::new(NoopBattlePass),
            Arc::new(MonitoringCore::new()),
        )
    }

    #[tokio::test]
    async fn connect_hydrates_a_fresh_player_and_sends_a_snapshot() {
        let mut room = test_room();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connected = room.handle_connect(None, tx).await.unwrap();
        assert!(room.state.players.contains_key(&connected.account_id));
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, OutboundMessage::Snapshot { .. }));
    }

    #[tokio::test]
    async fn reconnect_supersedes_previous_session() {
        let mut room = test_room();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let first = room.handle_connect(Some("11111111-1111-1111-1111-111111111111".into()), tx1).await.unwrap();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        room.handle_connect(Some("11111111-1111-1111-1111-111111111111".into()), tx2).await.unwrap();

        let closed = first.close_rx.await.unwrap();
        assert_eq!(closed, CloseCode::Admin);
    }
}
