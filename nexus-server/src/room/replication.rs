//! Maps `nexus-world`'s internal entity types onto `nexus-protocol`'s wire
//! schema and implements the three replication layers: the update batcher,
//! the delta compressor, and the full-state snapshot. This is the one place
//! the two crates' types meet — everywhere else in `nexus-server` stays on
//! one side or the other.

use std::collections::HashMap;

use nexus_protocol::outbound::{BatchedEntityDelta, DeltaRecord, OutboundMessage};
use nexus_world::{Enemy, Guild, LootDrop, Player, Projectile};
use serde_json::{json, Value};

use super::state::RoomState;

/// Collects per-`(entity_type, entity_id)` field deltas as the tick
/// produces them; a 10 Hz timer drains them into one `BatchUpdate`. Later
/// writes in the window win, and a removal marker always wins over any
/// upsert queued before it.
#[derive(Default)]
pub struct UpdateBatcher {
    pending: HashMap<(String, String), Value>,
}

impl UpdateBatcher {
    pub fn upsert(&mut self, entity_type: &str, entity_id: &str, fields: Value) {
        let key = (entity_type.to_string(), entity_id.to_string());
        match self.pending.get_mut(&key) {
            Some(existing) => merge_fields(existing, fields),
            None => {
                self.pending.insert(key, fields);
            }
        }
    }

    pub fn remove(&mut self, entity_type: &str, entity_id: &str) {
        self.pending.insert(
            (entity_type.to_string(), entity_id.to_string()),
            json!({"removed": true}),
        );
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains the pending set into one batch message, or `None` if nothing
    /// changed this window.
    pub fn flush(&mut self) -> Option<OutboundMessage> {
        if self.pending.is_empty() {
            return None;
        }
        let deltas = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((entity_type, entity_id), fields)| BatchedEntityDelta {
                entity_type,
                entity_id,
                fields,
            })
            .collect();
        Some(OutboundMessage::BatchUpdate { deltas })
    }
}

fn merge_fields(existing: &mut Value, incoming: Value) {
    if let (Value::Object(existing_map), Value::Object(incoming_map)) = (existing, incoming) {
        for (field, value) in incoming_map {
            existing_map.insert(field, value);
        }
    }
}

/// Diffs a reduced snapshot of replicated state against the previous diff
/// cycle's snapshot, emitting one [`DeltaRecord`] per changed field. Runs
/// at ~300 ms cadence, driven by the tick loop's every-5th-tick check.
#[derive(Default)]
pub struct DeltaCompressor {
    previous: HashMap<(String, String), Value>,
}

impl DeltaCompressor {
    pub fn diff(&mut self, state: &RoomState) -> Vec<DeltaRecord> {
        let mut current: HashMap<(String, String), Value> = HashMap::new();
        for (account, player) in &state.players {
            current.insert(("player".into(), account.to_string()), reduced_player(player));
        }
        for (id, enemy) in &state.enemies {
            current.insert(("enemy".into(), id.to_string()), reduced_enemy(enemy));
        }
        for (id, projectile) in &state.projectiles {
            current.insert(("projectile".into(), id.to_string()), reduced_projectile(projectile));
        }

        let mut records = Vec::new();
        for (key, value) in &current {
            match (self.previous.get(key), value) {
                (Some(Value::Object(prev_map)), Value::Object(cur_map)) => {
                    for (field, field_value) in cur_map {
                        if prev_map.get(field) != Some(field_value) {
                            records.push(DeltaRecord {
                                entity_id: key.1.clone(),
                                changed_field: field.clone(),
                                new_value: field_value.clone(),
                            });
                        }
                    }
                }
                (None, Value::Object(cur_map)) => {
                    for (field, field_value) in cur_map {
                        records.push(DeltaRecord {
                            entity_id: key.1.clone(),
                            changed_field: field.clone(),
                            new_value: field_value.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        for key in self.previous.keys() {
            if !current.contains_key(key) {
                records.push(DeltaRecord {
                    entity_id: key.1.clone(),
                    changed_field: "removed".into(),
                    new_value: json!(true),
                });
            }
        }

        self.previous = current;
        records
    }
}

fn reduced_player(player: &Player) -> Value {
    json!({
        "position": [player.position.x, player.position.y, player.position.z],
        "heading": player.heading,
        "hp": player.hp,
        "mana": player.mana,
    })
}

fn reduced_enemy(enemy: &Enemy) -> Value {
    json!({
        "position": [enemy.position.x, enemy.position.y, enemy.position.z],
        "heading": enemy.heading,
        "hp": enemy.hp,
    })
}

fn reduced_projectile(projectile: &Projectile) -> Value {
    json!({
        "position": [projectile.position.x, projectile.position.y, projectile.position.z],
    })
}

fn full_player(player: &Player) -> Value {
    json!({
        "characterId": player.character_id.to_string(),
        "name": player.name,
        "race": player.race,
        "position": [player.position.x, player.position.y, player.position.z],
        "heading": player.heading,
        "hp": player.hp,
        "maxHp": player.max_hp,
        "mana": player.mana,
        "maxMana": player.max_mana,
        "level": player.level,
        "guildId": player.guild_id.map(|id| id.to_string()),
    })
}

fn full_enemy(enemy: &Enemy) -> Value {
    json!({
        "enemyType": enemy.enemy_type,
        "position": [enemy.position.x, enemy.position.y, enemy.position.z],
        "heading": enemy.heading,
        "hp": enemy.hp,
        "maxHp": enemy.max_hp,
        "level": enemy.level,
    })
}

fn full_loot(drop: &LootDrop) -> Value {
    json!({
        "item": drop.item,
        "position": [drop.position.x, drop.position.y, drop.position.z],
        "ownerId": drop.owner_id.map(|id| id.to_string()),
    })
}

fn full_guild(guild: &Guild) -> Value {
    json!({
        "name": guild.name,
        "tag": guild.tag,
        "leaderId": guild.leader_id.to_string(),
        "members": guild.members.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}

/// Builds the full schema-mirrored snapshot sent once on join.
#[must_use]
pub fn build_snapshot(state: &RoomState) -> OutboundMessage {
    let mut players = serde_json::Map::new();
    for (account, player) in &state.players {
        players.insert(account.to_string(), full_player(player));
    }
    let mut enemies = serde_json::Map::new();
    for (id, enemy) in &state.enemies {
        enemies.insert(id.to_string(), full_enemy(enemy));
    }
    let mut loot = serde_json::Map::new();
    for (id, drop) in &state.loot {
        loot.insert(id.to_string(), full_loot(drop));
    }
    let mut projectiles = serde_json::Map::new();
    for (id, projectile) in &state.projectiles {
        projectiles.insert(id.to_string(), reduced_projectile(projectile));
    }
    let mut guilds = serde_json::Map::new();
    for guild in state.guilds.iter() {
        guilds.insert(guild.id.to_string(), full_guild(guild));
    }

    OutboundMessage::Snapshot {
        players: Value::Object(players),
        enemies: Value::Object(enemies),
        loot: Value::Object(loot),
        projectiles: Value::Object(projectiles),
        guilds: Value::Object(guilds),
    }
}

/// Ties the batcher and the delta compressor together as the one
/// replication pipeline a room owns.
#[derive(Default)]
pub struct ReplicationPipeline {
    pub batcher: UpdateBatcher,
    compressor: DeltaCompressor,
}

impl ReplicationPipeline {
    pub fn emit_delta(&mut self, state: &RoomState) -> Option<OutboundMessage> {
        let changes = self.compressor.diff(state);
        if changes.is_empty() {
            None
        } else {
            Some(OutboundMessage::DeltaUpdate { changes })
        }
    }

    pub fn flush_batch(&mut self) -> Option<OutboundMessage> {
        self.batcher.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batcher_merges_newer_writes_for_same_key() {
        let mut batcher = UpdateBatcher::default();
        batcher.upsert("enemy", "1", json!({"hp": 80}));
        batcher.upsert("enemy", "1", json!({"position": [1.0, 0.0, 0.0]}));
        let OutboundMessage::BatchUpdate { deltas } = batcher.flush().unwrap() else {
            panic!("expected BatchUpdate");
        };
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].fields["hp"], 80);
        assert_eq!(deltas[0].fields["position"][0], 1.0);
    }

    #[test]
    fn flush_on_empty_batch_returns_none() {
        let mut batcher = UpdateBatcher::default();
        assert!(batcher.flush().is_none());
    }
}
