//! One handler per `InboundMessage` variant: validate, then mutate or
//! reject with a typed reply. Every handler is reached only through
//! `Room::dispatch`'s `RoomCommand::Inbound` arm, so `account_id` here has
//! already been resolved from a live session.

use std::time::{Duration, Instant};

use nexus_core::ids::{AccountId, DungeonId, EntityId, GuildId, TradeId};
use nexus_core::vector::Vector3;
use nexus_protocol::inbound::{Emote, InboundMessage};
use nexus_protocol::outbound::{OutboundMessage, TradeErrorKind};
use nexus_registry::quest::QuestEventKind;
use nexus_repository::{DungeonCompletionRecord, DungeonProgressRecord};
use nexus_trading::{ConfirmOutcome, TradeError};
use nexus_world::dungeon::DungeonError;
use nexus_world::{GuildError, Projectile};
use rand::Rng;

use super::Room;

const SPELL_CAST_COOLDOWN: Duration = Duration::from_millis(500);
const SPELL_MANA_COST: i64 = 10;
const PROJECTILE_SPEED: f64 = 20.0;
const PROJECTILE_TTL_MS: i64 = 2_000;
const LOOT_PICKUP_RANGE: f64 = 2.0;

impl Room {
    pub(super) async fn handle_message(&mut self, account_id: AccountId, message: InboundMessage) {
        match message {
            InboundMessage::Move { x, y, z, rotation } => self.handle_move(account_id, x, y, z, rotation),
            InboundMessage::CastSpell {
                spell_id,
                position,
                rotation,
            } => self.handle_cast_spell(account_id, spell_id, Vector3::new(position.x, position.y, position.z), rotation),
            InboundMessage::Chat { text } => self.handle_chat(account_id, text),
            InboundMessage::PickupLoot { loot_id } => self.handle_pickup_loot(account_id, &loot_id),
            InboundMessage::CreateGuild { name, tag } => self.handle_create_guild(account_id, name, tag),
            InboundMessage::JoinGuild { guild_id } => self.handle_join_guild(account_id, guild_id),
            InboundMessage::LeaveGuild { guild_id } => self.handle_leave_guild(account_id, guild_id),
            InboundMessage::GuildChat { text } => self.handle_guild_chat(account_id, text),
            InboundMessage::Whisper { target_id, text } => self.handle_whisper(account_id, &target_id, text),
            InboundMessage::Emote { emote } => self.handle_emote(account_id, emote),
            InboundMessage::AcceptQuest { quest_id } => self.handle_quest_event(account_id, QuestEventKind::Accept, quest_id).await,
            InboundMessage::CompleteQuest { quest_id } => {
                self.handle_quest_event(account_id, QuestEventKind::Complete, quest_id).await
            }
            InboundMessage::ClaimBattlePassReward { .. }
            | InboundMessage::UnlockBattlePassPremium
            | InboundMessage::RequestBattlePassProgress => {
                self.state.send_to(
                    account_id,
                    OutboundMessage::BattlePassError {
                        reason: "battle pass tiers and reward catalogs are managed outside this room".into(),
                    },
                );
            }
            InboundMessage::RequestAchievementProgress => {
                log::debug!("{account_id} requested achievement progress, which this room does not track");
            }
            InboundMessage::CreateDungeon { difficulty, level } => self.handle_create_dungeon(account_id, difficulty, level),
            InboundMessage::EnterDungeon { dungeon_id } => self.handle_enter_dungeon(account_id, &dungeon_id),
            InboundMessage::ExitDungeon { .. } => self.state.dungeons.exit(account_id),
            InboundMessage::RequestDungeonProgress { dungeon_id } => self.handle_request_dungeon_progress(account_id, &dungeon_id),
            InboundMessage::DefeatDungeonEntity { dungeon_id, entity_id } => {
                self.handle_defeat_dungeon_entity(account_id, &dungeon_id, &entity_id).await
            }
            InboundMessage::InitiateTrade { target_id } => self.handle_initiate_trade(account_id, &target_id),
            InboundMessage::AddTradeItem { trade_id, item, qty } => self.handle_add_trade_item(account_id, &trade_id, &item, qty),
            InboundMessage::RemoveTradeItem { trade_id, item, qty } => {
                self.handle_remove_trade_item(account_id, &trade_id, &item, qty)
            }
            InboundMessage::SetTradeCredits { trade_id, credits } => self.handle_set_trade_credits(account_id, &trade_id, credits),
            InboundMessage::ConfirmTrade { trade_id } => self.handle_confirm_trade(account_id, &trade_id),
            InboundMessage::CancelTrade { trade_id } => self.handle_cancel_trade(account_id, &trade_id),
        }
    }

    fn handle_move(&mut self, account_id: AccountId, x: f64, y: f64, z: f64, rotation: f64) {
        let to = Vector3::new(x, y, z);
        let now = Instant::now();
        if self.state.validator.validate_movement(account_id, to, now) {
            if let Some(player) = self.state.players.get_mut(&account_id) {
                player.position = to;
                player.heading = rotation;
            }
            return;
        }
        let corrected = self.state.validator.last_position(account_id).unwrap_or(to);
        self.state.send_to(
            account_id,
            OutboundMessage::PositionCorrection {
                x: corrected.x,
                y: corrected.y,
                z: corrected.z,
            },
        );
    }

    fn handle_cast_spell(&mut self, account_id: AccountId, spell_id: String, target: Vector3, rotation: f64) {
        let Some(player) = self.state.players.get(&account_id) else {
            return;
        };
        if player.position.distance_to(target) > self.config.game.spell_cast_range {
            self.state.send_to(account_id, OutboundMessage::SpellCastRejected { reason: "target out of range".into() });
            return;
        }
        let now = Instant::now();
        if !self.state.validator.validate_spell_cast(account_id, &spell_id, SPELL_CAST_COOLDOWN, now) {
            self.state.send_to(account_id, OutboundMessage::SpellCastRejected { reason: "spell on cooldown".into() });
            return;
        }
        let Some(player) = self.state.players.get_mut(&account_id) else {
            return;
        };
        if player.mana < SPELL_MANA_COST {
            self.state.send_to(account_id, OutboundMessage::SpellCastRejected { reason: "insufficient mana".into() });
            return;
        }
        player.mana -= SPELL_MANA_COST;
        player.heading = rotation;
        let origin = player.position;

        let id = self.state.ids.next();
        let projectile = Projectile::new(id, spell_id, account_id, origin, target.sub(origin), PROJECTILE_SPEED, PROJECTILE_TTL_MS);
        self.state.projectiles.insert(id, projectile);
    }

    fn handle_chat(&mut self, account_id: AccountId, text: String) {
        let from = self.state.players.get(&account_id).map_or_else(|| account_id.to_string(), |p| p.name.clone());
        self.state.broadcast(&OutboundMessage::Chat { from, text });
    }

    fn handle_pickup_loot(&mut self, account_id: AccountId, loot_id: &str) {
        let Ok(raw) = loot_id.parse::<u64>() else {
            return;
        };
        let id = EntityId(raw);
        let Some(player) = self.state.players.get(&account_id) else {
            return;
        };
        let Some(drop) = self.state.loot.get(&id) else {
            return;
        };
        if !drop.can_be_picked_up_by(account_id) {
            return;
        }
        if player.position.distance_to(drop.position) > LOOT_PICKUP_RANGE {
            return;
        }
        let Some(drop) = self.state.loot.remove(&id) else {
            return;
        };
        if let Some(record) = self.state.records.get_mut(&account_id) {
            nexus_trading::inventory_ops::adjust_item(&mut record.inventory, &drop.item, 1);
        }
        self.replication.batcher.remove("loot", &id.to_string());
    }

    fn handle_create_guild(&mut self, account_id: AccountId, name: String, tag: String) {
        if !nexus_core::text::is_valid_guild_name(&name) {
            self.state.send_to(account_id, OutboundMessage::GuildError { reason: "guild name must be 3-20 characters".into() });
            return;
        }
        if !nexus_core::text::is_valid_guild_tag(&tag) {
            self.state.send_to(account_id, OutboundMessage::GuildError { reason: "guild tag must be 2-4 alphanumeric characters".into() });
            return;
        }
        match self.state.guilds.create(name, tag, account_id) {
            Ok(guild_id) => {
                if let Some(player) = self.state.players.get_mut(&account_id) {
                    player.guild_id = Some(guild_id);
                }
            }
            Err(err) => self.send_guild_error(account_id, err),
        }
    }

    fn handle_join_guild(&mut self, account_id: AccountId, guild_id: Option<String>) {
        let Some(id) = guild_id.as_deref().and_then(|s| s.parse::<GuildId>().ok()) else {
            self.state.send_to(account_id, OutboundMessage::GuildError { reason: "missing or invalid guild id".into() });
            return;
        };
        match self.state.guilds.join(id, account_id) {
            Ok(()) => {
                if let Some(player) = self.state.players.get_mut(&account_id) {
                    player.guild_id = Some(id);
                }
            }
            Err(err) => self.send_guild_error(account_id, err),
        }
    }

    fn handle_leave_guild(&mut self, account_id: AccountId, guild_id: Option<String>) {
        let current = self.state.players.get(&account_id).and_then(|p| p.guild_id);
        let Some(id) = guild_id.as_deref().and_then(|s| s.parse::<GuildId>().ok()).or(current) else {
            self.state.send_to(account_id, OutboundMessage::GuildError { reason: "not in a guild".into() });
            return;
        };
        match self.state.guilds.leave(id, account_id) {
            Ok(()) => {
                if let Some(player) = self.state.players.get_mut(&account_id) {
                    if player.guild_id == Some(id) {
                        player.guild_id = None;
                    }
                }
            }
            Err(err) => self.send_guild_error(account_id, err),
        }
    }

    fn handle_guild_chat(&mut self, account_id: AccountId, text: String) {
        let Some(player) = self.state.players.get(&account_id) else {
            return;
        };
        let Some(guild_id) = player.guild_id else {
            return;
        };
        let Some(guild) = self.state.guilds.get(guild_id) else {
            return;
        };
        let from = player.name.clone();
        for member in guild.members.clone() {
            self.state.send_to(member, OutboundMessage::GuildChat { from: from.clone(), text: text.clone() });
        }
    }

    fn handle_whisper(&mut self, account_id: AccountId, target_id: &str, text: String) {
        let Ok(target) = target_id.parse::<AccountId>() else {
            return;
        };
        if !self.state.players.contains_key(&target) {
            return;
        }
        let from = self.state.players.get(&account_id).map_or_else(|| account_id.to_string(), |p| p.name.clone());
        self.state.send_to(target, OutboundMessage::Whisper { from, text });
    }

    fn handle_emote(&mut self, account_id: AccountId, emote: Emote) {
        let from = self.state.players.get(&account_id).map_or_else(|| account_id.to_string(), |p| p.name.clone());
        self.state.broadcast(&OutboundMessage::Emote { from, emote: emote_wire_name(emote).into() });
    }

    async fn handle_quest_event(&mut self, account_id: AccountId, kind: QuestEventKind, quest_id: String) {
        if let Err(reason) = self.quests.handle_event(account_id, kind, &quest_id, 1).await {
            self.state.send_to(account_id, OutboundMessage::QuestError { reason });
        }
    }

    fn handle_create_dungeon(&mut self, account_id: AccountId, difficulty: u32, level: u32) {
        let seed: u64 = rand::thread_rng().gen();
        let dungeon_id = self.state.dungeons.create(seed, difficulty, level);
        match self.state.dungeons.enter(account_id, dungeon_id, time::OffsetDateTime::now_utc()) {
            Ok(()) => self.send_dungeon_progress(account_id, dungeon_id),
            Err(err) => self.send_dungeon_error(account_id, err),
        }
    }

    fn handle_enter_dungeon(&mut self, account_id: AccountId, dungeon_id: &str) {
        let Ok(id) = dungeon_id.parse::<DungeonId>() else {
            self.state.send_to(account_id, OutboundMessage::DungeonError { reason: "invalid dungeon id".into() });
            return;
        };
        match self.state.dungeons.enter(account_id, id, time::OffsetDateTime::now_utc()) {
            Ok(()) => self.send_dungeon_progress(account_id, id),
            Err(err) => self.send_dungeon_error(account_id, err),
        }
    }

    fn handle_request_dungeon_progress(&mut self, account_id: AccountId, dungeon_id: &str) {
        let Ok(id) = dungeon_id.parse::<DungeonId>() else {
            self.state.send_to(account_id, OutboundMessage::DungeonError { reason: "invalid dungeon id".into() });
            return;
        };
        self.send_dungeon_progress(account_id, id);
    }

    fn send_dungeon_progress(&mut self, account_id: AccountId, dungeon_id: DungeonId) {
        match self.state.dungeons.progress_for(account_id, dungeon_id) {
            Some(progress) => self.state.send_to(
                account_id,
                OutboundMessage::DungeonProgress {
                    dungeon_id: dungeon_id.to_string(),
                    current_floor: progress.current_floor,
                    rooms_cleared: progress.rooms_cleared.len(),
                },
            ),
            None => self.state.send_to(account_id, OutboundMessage::DungeonError { reason: "not bound to this dungeon".into() }),
        }
    }

    fn send_dungeon_error(&mut self, account_id: AccountId, err: DungeonError) {
        self.state.send_to(account_id, OutboundMessage::DungeonError { reason: err.to_string() });
    }

    /// Reports a dungeon entity defeated (`defeatEntity`), persists the
    /// resulting progress row, and completes the instance once every
    /// non-start room is cleared.
    async fn handle_defeat_dungeon_entity(&mut self, account_id: AccountId, dungeon_id: &str, entity_id: &str) {
        let Ok(id) = dungeon_id.parse::<DungeonId>() else {
            self.state.send_to(account_id, OutboundMessage::DungeonError { reason: "invalid dungeon id".into() });
            return;
        };
        let Ok(raw_entity) = entity_id.parse::<u64>() else {
            self.state.send_to(account_id, OutboundMessage::DungeonError { reason: "invalid entity id".into() });
            return;
        };
        if let Err(err) = self.state.dungeons.defeat_entity(id, EntityId(raw_entity), account_id) {
            self.send_dungeon_error(account_id, err);
            return;
        }
        self.send_dungeon_progress(account_id, id);

        if let Some(progress) = self.state.dungeons.progress_for(account_id, id) {
            self.repository.save_dungeon_progress(DungeonProgressRecord {
                account_id,
                dungeon_id: id,
                current_floor: progress.current_floor,
                rooms_cleared: progress.rooms_cleared.iter().map(ToString::to_string).collect(),
                entities_defeated: progress.entities_defeated.iter().map(ToString::to_string).collect(),
                started_at: progress.started_at,
            });
        }

        self.maybe_complete_dungeon(id).await;
    }

    /// Completes `dungeon_id` once every non-start room is cleared,
    /// splitting the reward across every bound player (`complete`).
    async fn maybe_complete_dungeon(&mut self, dungeon_id: DungeonId) {
        let Some(instance) = self.state.dungeons.get(dungeon_id) else {
            return;
        };
        if instance.completed || !instance.is_fully_cleared() {
            return;
        }
        let participants = instance.player_ids.clone();

        let reward = match self.state.dungeons.complete(dungeon_id) {
            Ok(reward) => reward,
            Err(_) => return,
        };

        let participant_count = participants.len();
        for participant in participants {
            #[cfg(feature = "redis-advisory")]
            self.publish_advisory(crate::redis_advisory::AdvisoryEvent::DungeonCompleted {
                account_id: participant,
                dungeon_id,
            });
            if let Some(record) = self.state.records.get_mut(&participant) {
                record.credits += reward.credits;
                if reward.crystals > 0 {
                    nexus_trading::inventory_ops::adjust_item(&mut record.inventory, "quantum_crystal", reward.crystals as i64);
                }
            }
            let _ = self.battle_pass.add_xp(participant, reward.xp).await;
            let outcome = self.achievements.handle_event(participant, "dungeon_complete").await;
            if outcome.unlocked {
                if let Some(definition) = outcome.definition {
                    self.state.send_to(participant, OutboundMessage::AchievementUnlocked { achievement: definition });
                }
            }
            self.repository.record_dungeon_completion(DungeonCompletionRecord {
                account_id: participant,
                dungeon_id,
                xp: reward.xp,
                credits: reward.credits,
                crystals: reward.crystals,
                completed_at: time::OffsetDateTime::now_utc(),
            });
        }
        log::info!("dungeon {dungeon_id} completed, reward split across {participant_count} participants");
    }

    fn send_guild_error(&mut self, account_id: AccountId, err: GuildError) {
        self.state.send_to(account_id, OutboundMessage::GuildError { reason: err.to_string() });
    }

    fn handle_initiate_trade(&mut self, account_id: AccountId, target_id: &str) {
        let Ok(target) = target_id.parse::<AccountId>() else {
            self.state.send_to(account_id, OutboundMessage::TradeError { trade_id: None, kind: TradeErrorKind::NotFound });
            return;
        };
        let Some(origin) = self.state.players.get(&account_id).map(|p| p.position) else {
            return;
        };
        let Some(target_pos) = self.state.players.get(&target).map(|p| p.position) else {
            self.state.send_to(account_id, OutboundMessage::TradeError { trade_id: None, kind: TradeErrorKind::NotFound });
            return;
        };
        match self.state.trades.initiate(account_id, origin, target, target_pos, time::OffsetDateTime::now_utc()) {
            Ok(id) => {
                for participant in [account_id, target] {
                    self.state
                        .send_to(participant, OutboundMessage::TradeUpdate { trade_id: id.to_string(), status: "pending".into() });
                }
            }
            Err(err) => self.state.send_to(account_id, OutboundMessage::TradeError { trade_id: None, kind: trade_error_kind(&err) }),
        }
    }

    fn handle_add_trade_item(&mut self, account_id: AccountId, trade_id: &str, item: &str, qty: u32) {
        let Ok(id) = trade_id.parse::<TradeId>() else {
            return;
        };
        if let Err(err) = self.state.trades.add_item(id, account_id, item, qty) {
            self.send_trade_error(account_id, id, err);
        }
    }

    fn handle_remove_trade_item(&mut self, account_id: AccountId, trade_id: &str, item: &str, qty: u32) {
        let Ok(id) = trade_id.parse::<TradeId>() else {
            return;
        };
        if let Err(err) = self.state.trades.remove_item(id, account_id, item, qty) {
            self.send_trade_error(account_id, id, err);
        }
    }

    fn handle_set_trade_credits(&mut self, account_id: AccountId, trade_id: &str, credits: u64) {
        let Ok(id) = trade_id.parse::<TradeId>() else {
            return;
        };
        if let Err(err) = self.state.trades.set_credits(id, account_id, credits) {
            self.send_trade_error(account_id, id, err);
        }
    }

    fn handle_confirm_trade(&mut self, account_id: AccountId, trade_id: &str) {
        let Ok(id) = trade_id.parse::<TradeId>() else {
            return;
        };
        match self.state.trades.toggle_confirmation(id, account_id) {
            Ok(ConfirmOutcome::WaitingOnOther) => {
                self.state.send_to(account_id, OutboundMessage::TradeUpdate { trade_id: id.to_string(), status: "pending".into() });
            }
            Ok(ConfirmOutcome::BothConfirmed) => self.execute_trade(id),
            Err(err) => self.send_trade_error(account_id, id, err),
        }
    }

    /// Pulls both participants' records out of `state.records` (so both
    /// sides can be mutated at once without two live `&mut` borrows into the
    /// same map), executes, then puts them back regardless of outcome.
    fn execute_trade(&mut self, id: TradeId) {
        let Some(session) = self.state.trades.session(id) else {
            return;
        };
        let (p1, p2) = (session.p1, session.p2);
        let (Some(mut record1), Some(mut record2)) = (self.state.records.remove(&p1), self.state.records.remove(&p2)) else {
            return;
        };

        let result = self.state.trades.execute(id, p1, &mut record1, p2, &mut record2);
        self.state.records.insert(p1, record1);
        self.state.records.insert(p2, record2);

        match result {
            Ok(()) => {
                for participant in [p1, p2] {
                    self.state
                        .send_to(participant, OutboundMessage::TradeUpdate { trade_id: id.to_string(), status: "completed".into() });
                }
            }
            Err(err) => {
                let kind = trade_error_kind(&err);
                for participant in [p1, p2] {
                    self.state.send_to(participant, OutboundMessage::TradeError { trade_id: Some(id.to_string()), kind });
                }
            }
        }
    }

    fn handle_cancel_trade(&mut self, account_id: AccountId, trade_id: &str) {
        let Ok(id) = trade_id.parse::<TradeId>() else {
            return;
        };
        let participants = self.state.trades.session(id).map(|s| (s.p1, s.p2));
        match self.state.trades.cancel(id, account_id) {
            Ok(()) => {
                if let Some((p1, p2)) = participants {
                    for participant in [p1, p2] {
                        self.state
                            .send_to(participant, OutboundMessage::TradeUpdate { trade_id: id.to_string(), status: "cancelled".into() });
                    }
                }
            }
            Err(err) => self.send_trade_error(account_id, id, err),
        }
    }

    fn send_trade_error(&mut self, account_id: AccountId, id: TradeId, err: TradeError) {
        self.state
            .send_to(account_id, OutboundMessage::TradeError { trade_id: Some(id.to_string()), kind: trade_error_kind(&err) });
    }
}

/// `nexus-protocol`'s wire error kinds don't carry a `NotAParticipant`
/// variant (that's an authorization detail of this crate's trade manager,
/// not something the original wire catalog distinguishes) — mapped onto
/// `InvalidState` instead (see DESIGN.md).
fn trade_error_kind(err: &TradeError) -> TradeErrorKind {
    match err {
        TradeError::NotFound => TradeErrorKind::NotFound,
        TradeError::TooFarApart(_) => TradeErrorKind::TooFarApart,
        TradeError::AlreadyTrading => TradeErrorKind::AlreadyTrading,
        TradeError::InvalidState | TradeError::NotAParticipant => TradeErrorKind::InvalidState,
        TradeError::InsufficientCredits => TradeErrorKind::InsufficientFunds,
        TradeError::InsufficientItems => TradeErrorKind::InsufficientItems,
        TradeError::Expired => TradeErrorKind::Expired,
    }
}

fn emote_wire_name(emote: Emote) -> &'static str {
    match emote {
        Emote::Wave => "wave",
        Emote::Dance => "dance",
        Emote::Flex => "flex",
        Emote::Bow => "bow",
        Emote::Laugh => "laugh",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nexus_core::ids::CharacterId;
    use nexus_registry::{AlwaysAllowVerifier, NoopAchievementSystem, NoopBattlePass, NoopQuestSystem};
    use nexus_repository::{MemoryStore, PlayerRepository};
    use nexus_world::Player;

    use crate::config::Config;
    use crate::monitoring::MonitoringCore;

    use super::*;

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

    fn seat_player(room: &mut Room) -> AccountId {
        let account_id = AccountId::new();
        let player = Player::new(account_id, CharacterId::new(), "Tester".into(), "human".into(), Vector3::ZERO);
        room.state.player_grid.insert(account_id, player.position);
        room.state.players.insert(account_id, player);
        let record = nexus_repository::PlayerRecord::new(account_id, "Tester".into(), "human".into());
        room.state.records.insert(account_id, record);
        account_id
    }

    #[tokio::test]
    async fn valid_move_updates_player_position() {
        let mut room = test_room();
        let account_id = seat_player(&mut room);
        room.handle_message(account_id, InboundMessage::Move { x: 1.0, y: 0.0, z: 0.0, rotation: 0.0 })
            .await;
        assert_eq!(room.state.players[&account_id].position, Vector3::new(1.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn cast_spell_out_of_range_is_rejected_without_spawning_a_projectile() {
        let mut room = test_room();
        let account_id = seat_player(&mut room);
        room.handle_message(
            account_id,
            InboundMessage::CastSpell {
                spell_id: "fireball".into(),
                position: nexus_protocol::inbound::WirePosition { x: 1000.0, y: 0.0, z: 0.0 },
                rotation: 0.0,
            },
        )
        .await;
        assert!(room.state.projectiles.is_empty());
    }

    #[tokio::test]
    async fn create_then_join_guild_round_trips() {
        let mut room = test_room();
        let leader = seat_player(&mut room);
        let member = seat_player(&mut room);

        room.handle_message(leader, InboundMessage::CreateGuild { name: "Alpha".into(), tag: "ALP".into() }).await;
        let guild_id = room.state.players[&leader].guild_id.expect("guild created");

        room.handle_message(member, InboundMessage::JoinGuild { guild_id: Some(guild_id.to_string()) }).await;
        assert_eq!(room.state.players[&member].guild_id, Some(guild_id));
        assert_eq!(room.state.guilds.get(guild_id).unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn pickup_loot_transfers_item_into_record_inventory() {
        let mut room = test_room();
        let account_id = seat_player(&mut room);
        let loot_id = room.state.ids.next();
        room.state.loot.insert(
            loot_id,
            nexus_world::LootDrop {
                id: loot_id,
                item: "gold".into(),
                position: Vector3::ZERO,
                owner_id: None,
                expires_at: std::time::Instant::now() + std::time::Duration::from_secs(60),
            },
        );
        room.handle_message(account_id, InboundMessage::PickupLoot { loot_id: loot_id.to_string() }).await;
        assert!(room.state.loot.is_empty());
        assert_eq!(nexus_trading::inventory_ops::item_qty(&room.state.records[&account_id].inventory, "gold"), 1);
    }

    #[tokio::test]
    async fn defeat_dungeon_entity_records_progress() {
        let mut room = test_room();
        let account_id = seat_player(&mut room);
        let dungeon_id = room.state.dungeons.create(1, 0, 1);
        room.state.dungeons.enter(account_id, dungeon_id, time::OffsetDateTime::now_utc()).unwrap();

        let entity_id = room.state.dungeons.get(dungeon_id).unwrap().dungeon.entities[0].id;
        room.handle_message(
            account_id,
            InboundMessage::DefeatDungeonEntity {
                dungeon_id: dungeon_id.to_string(),
                entity_id: entity_id.to_string(),
            },
        )
        .await;

        let progress = room.state.dungeons.progress_for(account_id, dungeon_id).unwrap();
        assert!(progress.entities_defeated.contains(&entity_id));
    }

    #[tokio::test]
    async fn defeating_every_entity_completes_the_dungeon_and_credits_the_reward() {
        let mut room = test_room();
        let account_id = seat_player(&mut room);
        let dungeon_id = room.state.dungeons.create(7, 0, 1);
        room.state.dungeons.enter(account_id, dungeon_id, time::OffsetDateTime::now_utc()).unwrap();

        let entity_ids: Vec<_> = room
            .state
            .dungeons
            .get(dungeon_id)
            .unwrap()
            .dungeon
            .entities
            .iter()
            .map(|e| e.id)
            .collect();
        for entity_id in entity_ids {
            room.handle_message(
                account_id,
                InboundMessage::DefeatDungeonEntity {
                    dungeon_id: dungeon_id.to_string(),
                    entity_id: entity_id.to_string(),
                },
            )
            .await;
        }

        assert!(room.state.dungeons.get(dungeon_id).unwrap().completed);
        assert!(room.state.records[&account_id].credits > 0);
    }
}
