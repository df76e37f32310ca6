//! The 60 Hz authoritative tick: spatial re-index, projectile
//! advance, projectile/enemy collision, enemy death and rewards, aggro AI,
//! the every-5th-tick delta broadcast, and per-tick loot pruning. Also homes
//! the two slower world-population timers `Room::run`'s select loop drives
//! (`spawn_enemies`, `maybe_spawn_world_boss`).

use std::collections::HashMap;
use std::time::Instant;

use nexus_core::constants::{DELTA_BROADCAST_INTERVAL_TICKS, LOOT_EXPIRY, MAX_ENEMIES, TICK_DURATION};
use nexus_core::ids::{AccountId, EntityId};
use nexus_core::vector::Vector3;
use nexus_protocol::inbound::WirePosition;
use nexus_protocol::OutboundMessage;
use nexus_registry::quest::QuestEventKind;
use nexus_world::{Enemy, LootDrop};
use rand::Rng;
use serde_json::json;

use super::Room;

const PROJECTILE_HIT_RADIUS: f64 = 1.0;
const PROJECTILE_QUERY_RADIUS: f64 = 2.0;
const BASE_SPELL_DAMAGE: f64 = 50.0;
const CRIT_CHANCE: f64 = 0.1;
const CRIT_MULTIPLIER: f64 = 2.0;

const AGGRO_RANGE: f64 = 10.0;
const HOME_LEASH_RANGE: f64 = 20.0;
const AGGRO_STEP: f64 = 0.05;
const HOME_STEP: f64 = 0.03;
const DRIFT_STEP: f64 = 0.02;

const SPAWN_RING_MIN: f64 = 15.0;
const SPAWN_RING_MAX: f64 = 40.0;

const WORLD_BOSS_HP: i64 = 10_000;
const WORLD_BOSS_LEVEL: u32 = 50;
const WORLD_BOSS_XP_REWARD: u64 = 500;
const WORLD_BOSS_CREDIT_REWARD: u64 = 250;

const TICK_TIME_SAMPLE_CAP: usize = 100;

struct ProjectileHit {
    projectile_id: EntityId,
    enemy_id: EntityId,
    damage: i64,
    crit: bool,
}

impl Room {
    /// One authoritative step, driven by `Room::run`'s tick timer.
    pub(super) async fn tick(&mut self) {
        let start = Instant::now();
        self.state.tick_count += 1;

        self.reindex_spatial_grids();
        self.advance_projectiles();

        let hits = self.resolve_projectile_hits();
        let killed = self.apply_projectile_hits(hits);
        for (enemy_id, killer_id) in killed {
            self.on_enemy_killed(enemy_id, killer_id).await;
        }

        self.advance_enemy_ai();

        if self.state.tick_count % DELTA_BROADCAST_INTERVAL_TICKS == 0 {
            if let Some(message) = self.replication.emit_delta(&self.state) {
                self.state.broadcast(&message);
            }
        }

        let now = Instant::now();
        self.state.loot.retain(|_, drop| !drop.is_expired(now));

        self.record_tick_time(start.elapsed().as_millis() as u64);
    }

    fn reindex_spatial_grids(&mut self) {
        for (account, player) in &self.state.players {
            self.state.player_grid.move_entity(*account, player.position);
        }
        for (id, enemy) in &self.state.enemies {
            self.state.enemy_grid.move_entity(*id, enemy.position);
        }
    }

    fn advance_projectiles(&mut self) {
        let dt_ms = TICK_DURATION.as_millis() as i64;
        for projectile in self.state.projectiles.values_mut() {
            projectile.advance(dt_ms);
        }
        let expired: Vec<EntityId> = self
            .state
            .projectiles
            .values()
            .filter(|p| p.expired())
            .map(|p| p.id)
            .collect();
        for id in expired {
            self.state.projectiles.remove(&id);
        }
    }

    /// First pass: find hits without mutating `enemies`/`projectiles`, so
    /// the query against `enemy_grid` never races a borrow of `enemies`.
    fn resolve_projectile_hits(&self) -> Vec<ProjectileHit> {
        let now = Instant::now();
        let mut hits = Vec::new();
        for projectile in self.state.projectiles.values() {
            let candidates: Vec<EntityId> = self
                .state
                .enemy_grid
                .query(projectile.position, PROJECTILE_QUERY_RADIUS)
                .collect();
            for enemy_id in candidates {
                let Some(enemy) = self.state.enemies.get(&enemy_id) else {
                    continue;
                };
                if enemy.is_dead() {
                    continue;
                }
                if projectile.position.distance_to(enemy.position) > PROJECTILE_HIT_RADIUS {
                    continue;
                }
                let crit = rand::thread_rng().gen_bool(CRIT_CHANCE);
                let multiplier = self.state.combos.current_multiplier(projectile.caster_id, now);
                let mut damage = BASE_SPELL_DAMAGE * multiplier;
                if crit {
                    damage *= CRIT_MULTIPLIER;
                }
                hits.push(ProjectileHit {
                    projectile_id: projectile.id,
                    enemy_id,
                    damage: damage.floor() as i64,
                    crit,
                });
                break;
            }
        }
        hits
    }

    /// Second pass: spends each hit's projectile, validates its damage,
    /// applies it, and broadcasts the result, returning enemies that died
    /// this tick for the caller to hand to `on_enemy_killed`.
    fn apply_projectile_hits(&mut self, hits: Vec<ProjectileHit>) -> Vec<(EntityId, AccountId)> {
        let mut killed = Vec::new();
        for hit in hits {
            let Some(projectile) = self.state.projectiles.remove(&hit.projectile_id) else {
                continue;
            };
            if !self.state.validator.validate_damage(projectile.caster_id, hit.damage) {
                continue;
            }
            let Some(enemy) = self.state.enemies.get_mut(&hit.enemy_id) else {
                continue;
            };
            enemy.hp -= hit.damage;
            let hp = enemy.hp;
            let dead = enemy.is_dead();
            self.state.broadcast(&OutboundMessage::DamageNumber {
                target_id: hit.enemy_id.to_string(),
                caster_id: projectile.caster_id.to_string(),
                damage: hit.damage.max(0) as u32,
                crit: hit.crit,
            });
            self.replication.batcher.upsert("enemy", &hit.enemy_id.to_string(), json!({ "hp": hp }));
            if dead {
                killed.push((hit.enemy_id, projectile.caster_id));
            }
        }
        killed
    }

    /// Kill rewards: combo registration, a loot drop, the `Kill` broadcast,
    /// and the quest/achievement/battle-pass fan-out. World-boss kills
    /// additionally split a flat reward across everyone online (see
    /// DESIGN.md).
    async fn on_enemy_killed(&mut self, enemy_id: EntityId, killer_id: AccountId) {
        let Some(enemy) = self.state.enemies.remove(&enemy_id) else {
            return;
        };
        self.state.enemy_grid.remove(enemy_id);
        self.replication.batcher.remove("enemy", &enemy_id.to_string());

        let now = Instant::now();
        let combo = self.state.combos.register_kill(killer_id, now);

        self.state.broadcast(&OutboundMessage::Kill {
            enemy_id: enemy_id.to_string(),
            killer_id: killer_id.to_string(),
            combo_multiplier: combo.multiplier,
        });
        #[cfg(feature = "redis-advisory")]
        self.publish_advisory(crate::redis_advisory::AdvisoryEvent::Kill { killer: killer_id, enemy: enemy_id });

        let loot_id = self.state.ids.next();
        self.state.loot.insert(
            loot_id,
            LootDrop {
                id: loot_id,
                item: format!("{}-trophy", enemy.enemy_type),
                position: enemy.position,
                owner_id: Some(killer_id),
                expires_at: now + LOOT_EXPIRY,
            },
        );

        let _ = self
            .quests
            .handle_event(killer_id, QuestEventKind::Progress, &enemy.enemy_type, 1)
            .await;
        let outcome = self.achievements.handle_event(killer_id, "kill").await;
        if outcome.unlocked {
            if let Some(definition) = outcome.definition {
                self.state
                    .send_to(killer_id, OutboundMessage::AchievementUnlocked { achievement: definition });
            }
        }
        let _ = self.battle_pass.add_xp(killer_id, 10).await;

        if self.state.world_boss_id == Some(enemy_id) {
            self.distribute_world_boss_reward(killer_id).await;
        }
    }

    async fn distribute_world_boss_reward(&mut self, killer_id: AccountId) {
        self.state.world_boss_id = None;
        let participants: Vec<AccountId> = self.state.players.keys().copied().collect();
        for account in &participants {
            if let Some(record) = self.state.records.get_mut(account) {
                record.credits += WORLD_BOSS_CREDIT_REWARD;
            }
            let _ = self.battle_pass.add_xp(*account, WORLD_BOSS_XP_REWARD).await;
        }
        log::info!(
            "world boss defeated by {killer_id}, rewards split across {} participants",
            participants.len()
        );
    }

    /// Chase the nearest player within [`AGGRO_RANGE`]; otherwise drift or
    /// bias back toward `spawn_anchor`.
    fn advance_enemy_ai(&mut self) {
        let player_positions: Vec<Vector3> = self.state.players.values().map(|p| p.position).collect();

        for (id, enemy) in self.state.enemies.iter_mut() {
            if enemy.is_dead() {
                continue;
            }

            let nearest = player_positions
                .iter()
                .map(|pos| (*pos, enemy.position.distance_to(*pos)))
                .filter(|(_, distance)| *distance <= AGGRO_RANGE)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let (target, step) = match nearest {
                Some((pos, _)) => (pos, AGGRO_STEP),
                None if enemy.position.distance_to(enemy.spawn_anchor) > HOME_LEASH_RANGE => {
                    (enemy.spawn_anchor, HOME_STEP)
                }
                None => (enemy.spawn_anchor, DRIFT_STEP),
            };

            if enemy.position.distance_to(target) < f64::EPSILON {
                continue;
            }
            enemy.heading = enemy.position.heading_to(target);
            enemy.position = enemy.position.add(Vector3::from_heading(enemy.heading).scale(step));
            self.replication.batcher.upsert(
                "enemy",
                &id.to_string(),
                json!({
                    "position": [enemy.position.x, enemy.position.y, enemy.position.z],
                    "heading": enemy.heading,
                }),
            );
        }
    }

    fn record_tick_time(&mut self, elapsed_ms: u64) {
        self.state.tick_times_ms.push_back(elapsed_ms);
        if self.state.tick_times_ms.len() > TICK_TIME_SAMPLE_CAP {
            self.state.tick_times_ms.pop_front();
        }
        self.monitoring.record_metric("tick_time_ms", elapsed_ms as f64, &HashMap::new());
    }

    /// Ring-spawn around the origin up to [`MAX_ENEMIES`] while any client
    /// is connected, seeding a small batch the first time the room goes
    /// non-empty and trickling one in per timer fire after that
    /// (`enemySpawnIntervalMs`).
    pub(super) fn spawn_enemies(&mut self) {
        let clients = self.state.client_count();
        if clients == 0 || self.state.enemies.len() >= MAX_ENEMIES {
            return;
        }
        let to_spawn = if self.state.enemies.is_empty() {
            (clients / 2).clamp(1, 5)
        } else {
            1
        };
        for _ in 0..to_spawn {
            if self.state.enemies.len() >= MAX_ENEMIES {
                break;
            }
            self.spawn_one_enemy();
        }
    }

    fn spawn_one_enemy(&mut self) {
        let mut rng = rand::thread_rng();
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let radius = rng.gen_range(SPAWN_RING_MIN..SPAWN_RING_MAX);
        let position = Vector3::new(radius * angle.sin(), 0.0, radius * angle.cos());
        let level = rng.gen_range(1..=5);
        let hp = 100 + i64::from(level) * 20;

        let id = self.state.ids.next();
        let enemy = Enemy::new(id, "grunt", position, level, hp);
        self.state.enemy_grid.insert(id, position);
        self.state.enemies.insert(id, enemy);
    }

    /// Spawns the single world boss for this fire of the timer if none is
    /// currently alive (`worldBossIntervalMs`; per-participant reward
    /// distribution on defeat resolved in DESIGN.md).
    pub(super) fn maybe_spawn_world_boss(&mut self) {
        if self.state.world_boss_id.is_some() || self.state.client_count() == 0 {
            return;
        }

        let id = self.state.ids.next();
        let enemy = Enemy::new(id, "world_boss", Vector3::ZERO, WORLD_BOSS_LEVEL, WORLD_BOSS_HP);
        self.state.enemy_grid.insert(id, enemy.position);
        self.state.world_boss_id = Some(id);
        self.state.enemies.insert(id, enemy);

        self.state.broadcast(&OutboundMessage::BossSpawn {
            enemy_id: id.to_string(),
            position: WirePosition { x: 0.0, y: 0.0, z: 0.0 },
        });
        log::info!("world boss {id} spawned");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nexus_registry::{AlwaysAllowVerifier, NoopAchievementSystem, NoopBattlePass, NoopQuestSystem};
    use nexus_repository::{MemoryStore, PlayerRepository};

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

    #[tokio::test]
    async fn tick_advances_and_expires_projectiles() {
        let mut room = test_room();
        let caster = AccountId::new();
        let id = room.state.ids.next();
        room.state.projectiles.insert(
            id,
            nexus_world::Projectile::new(id, "bolt", caster, Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0), 1.0, 10),
        );
        room.tick().await;
        assert!(room.state.projectiles.is_empty());
        assert_eq!(room.state.tick_count, 1);
        assert_eq!(room.state.tick_times_ms.len(), 1);
    }

    #[tokio::test]
    async fn projectile_kills_enemy_and_drops_loot() {
        let mut room = test_room();
        let caster = AccountId::new();

        let enemy_id = room.state.ids.next();
        room.state.enemies.insert(enemy_id, Enemy::new(enemy_id, "grunt", Vector3::ZERO, 1, 1));
        room.state.enemy_grid.insert(enemy_id, Vector3::ZERO);

        let projectile_id = room.state.ids.next();
        room.state.projectiles.insert(
            projectile_id,
            nexus_world::Projectile::new(
                projectile_id,
                "bolt",
                caster,
                Vector3::ZERO,
                Vector3::new(1.0, 0.0, 0.0),
                0.0,
                10_000,
            ),
        );

        room.tick().await;
        assert!(room.state.enemies.is_empty());
        assert_eq!(room.state.loot.len(), 1);
    }

    #[test]
    fn spawn_enemies_is_a_noop_with_no_clients() {
        let mut room = test_room();
        room.spawn_enemies();
        assert!(room.state.enemies.is_empty());
    }

    #[test]
    fn world_boss_does_not_double_spawn() {
        let mut room = test_room();
        let account = AccountId::new();
        room.state.players.insert(
            account,
            nexus_world::Player::new(account, nexus_core::ids::CharacterId::new(), "A".into(), "human".into(), Vector3::ZERO),
        );
        room.maybe_spawn_world_boss();
        assert!(room.state.world_boss_id.is_some());
        let boss_count_before = room.state.enemies.len();
        room.maybe_spawn_world_boss();
        assert_eq!(room.state.enemies.len(), boss_count_before);
    }
}
