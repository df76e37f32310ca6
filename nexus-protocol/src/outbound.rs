//! Outbound message catalog. Carries either a room-scoped snapshot/delta or
//! one of the typed error replies sent back when an action is rejected.

use nexus_macros::WireTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inbound::WirePosition;

/// One changed field produced by the delta compressor:
/// `{entity_id, changed_field, new_value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub entity_id: String,
    pub changed_field: String,
    pub new_value: Value,
}

/// A single entity's merged delta inside a batched update.
/// `fields` carries only the fields that changed during
/// the batch window; `entity_type` disambiguates the `(type, id)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedEntityDelta {
    pub entity_type: String,
    pub entity_id: String,
    pub fields: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeErrorKind {
    NotFound,
    TooFarApart,
    AlreadyTrading,
    InvalidState,
    InsufficientFunds,
    InsufficientItems,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, WireTag)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OutboundMessage {
    /// Full schema-mirrored state, sent once on join.
    Snapshot {
        players: Value,
        enemies: Value,
        loot: Value,
        projectiles: Value,
        guilds: Value,
    },
    /// 10 Hz batcher flush.
    BatchUpdate {
        deltas: Vec<BatchedEntityDelta>,
    },
    /// ~300 ms delta-compressor diff.
    DeltaUpdate {
        changes: Vec<DeltaRecord>,
    },
    DamageNumber {
        target_id: String,
        caster_id: String,
        damage: u32,
        crit: bool,
    },
    Kill {
        enemy_id: String,
        killer_id: String,
        combo_multiplier: f64,
    },
    BossSpawn {
        enemy_id: String,
        position: WirePosition,
    },
    PositionCorrection {
        x: f64,
        y: f64,
        z: f64,
    },
    Chat {
        from: String,
        text: String,
    },
    GuildChat {
        from: String,
        text: String,
    },
    Whisper {
        from: String,
        text: String,
    },
    Emote {
        from: String,
        emote: String,
    },
    RateLimitExceeded {
        action: String,
    },
    SpellCastRejected {
        reason: String,
    },
    TradeError {
        trade_id: Option<String>,
        kind: TradeErrorKind,
    },
    QuestError {
        reason: String,
    },
    BattlePassError {
        reason: String,
    },
    DungeonError {
        reason: String,
    },
    GuildError {
        reason: String,
    },
    TradeUpdate {
        trade_id: String,
        status: String,
    },
    DungeonProgress {
        dungeon_id: String,
        current_floor: u32,
        rooms_cleared: usize,
    },
    AchievementUnlocked {
        achievement: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_correction_round_trips() {
        let msg = OutboundMessage::PositionCorrection {
            x: 0.0,
            y: 1.0,
            z: 0.0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "positionCorrection");
        let back: OutboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg, back);
    }
}
