//! Server-side validator and anti-cheat. A pure stateful
//! checker invoked on every inbound state-changing message: it never talks
//! to the network or the repository, only to its own per-account maps.

pub mod suspicion_log;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use nexus_core::ids::AccountId;
use nexus_core::suspicion::SuspicionLevel;
use nexus_core::vector::Vector3;

pub use suspicion_log::{SuspicionEntry, SuspicionKind};

/// Base walk speed used by `validateMovement`'s speed-hack bound
/// (player base speed 5).
pub const PLAYER_BASE_SPEED: f64 = 5.0;
/// Teleport distance bound.
pub const TELEPORT_DISTANCE: f64 = 50.0;
/// `speed > 2.5x base, by more than +50%` — i.e. the hard ceiling is
/// `base * 2.5 * 1.5`.
pub const SPEED_HACK_MULTIPLIER: f64 = 2.5 * 1.5;

const DT_MIN: Duration = Duration::from_millis(16);
const DT_MAX: Duration = Duration::from_secs(1);

const DAMAGE_MAX: u32 = 10_000;
const INVENTORY_QTY_MAX: i64 = 10_000;
const CHEATING_WINDOW: Duration = Duration::from_secs(60);
const CHEATING_ACTION_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOp {
    Add,
    Remove,
}

#[derive(Debug, Default)]
struct AccountState {
    last_position: Option<(Vector3, Instant)>,
    cooldowns: HashMap<String, Instant>,
    recent_actions: Vec<Instant>,
    suspicion: Vec<SuspicionEntry>,
}

/// Server-side validator. One instance per room; internally sharded by
/// account via `DashMap` so the tick loop and per-connection message
/// handlers can both reach it without a room-wide lock.
#[derive(Default)]
pub struct Validator {
    accounts: DashMap<AccountId, AccountState>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `validateMovement(account, from, to, ts)`. `to` is compared against
    /// the last *server-accepted* position, not the client-claimed `from`.
    pub fn validate_movement(&self, account: AccountId, to: Vector3, now: Instant) -> bool {
        let mut state = self.accounts.entry(account).or_default();
        let Some((last_pos, last_ts)) = state.last_position else {
            state.last_position = Some((to, now));
            return true;
        };

        let dt = now
            .checked_duration_since(last_ts)
            .unwrap_or(Duration::ZERO)
            .clamp(DT_MIN, DT_MAX);
        let distance = last_pos.planar_distance_to(to);
        let speed = distance / dt.as_secs_f64();

        if distance > TELEPORT_DISTANCE {
            state.suspicion.push(SuspicionEntry::now(
                SuspicionKind::Teleport,
                nexus_core::suspicion::SuspicionLevel::High,
            ));
            return false;
        }
        if speed > PLAYER_BASE_SPEED * SPEED_HACK_MULTIPLIER {
            state.suspicion.push(SuspicionEntry::now(
                SuspicionKind::SpeedHack,
                nexus_core::suspicion::SuspicionLevel::Medium,
            ));
            return false;
        }

        state.last_position = Some((to, now));
        true
    }

    /// Returns the last server-accepted position for `account`, if any.
    /// Used by the room to build a `positionCorrection` reply on rejection.
    #[must_use]
    pub fn last_position(&self, account: AccountId) -> Option<Vector3> {
        self.accounts
            .get(&account)
            .and_then(|s| s.last_position.map(|(p, _)| p))
    }

    pub fn validate_damage(&self, account: AccountId, amount: i64) -> bool {
        if amount <= 0 {
            self.log_suspicion(account, SuspicionKind::InvalidDamage, SuspicionLevel::Low);
            return false;
        }
        if amount > i64::from(DAMAGE_MAX) {
            self.log_suspicion(account, SuspicionKind::InvalidDamage, SuspicionLevel::High);
            return false;
        }
        true
    }

    /// `validateSpellCast(account, spell, cooldown_ms)`. Records `now` as
    /// the new cast time on success.
    pub fn validate_spell_cast(
        &self,
        account: AccountId,
        spell: &str,
        cooldown: Duration,
        now: Instant,
    ) -> bool {
        let mut state = self.accounts.entry(account).or_default();
        if let Some(last_cast) = state.cooldowns.get(spell) {
            if now.duration_since(*last_cast) < cooldown {
                drop(state);
                self.log_suspicion(account, SuspicionKind::SpellCooldown, SuspicionLevel::Medium);
                return false;
            }
        }
        state.cooldowns.insert(spell.to_string(), now);
        true
    }

    pub fn validate_inventory_change(&self, account: AccountId, qty: i64, op: InventoryOp) -> bool {
        if qty <= 0 || qty > INVENTORY_QTY_MAX {
            self.log_suspicion(
                account,
                SuspicionKind::InvalidInventoryChange,
                SuspicionLevel::Medium,
            );
            return false;
        }
        if op == InventoryOp::Remove && qty < 0 {
            self.log_suspicion(
                account,
                SuspicionKind::InvalidInventoryChange,
                SuspicionLevel::High,
            );
            return false;
        }
        true
    }

    /// `detectCheating(account, action)`: sliding 60s action-rate window,
    /// independent of the suspicion-entry-derived level computed by
    /// [`Self::current_suspicion`].
    pub fn detect_cheating(&self, account: AccountId, now: Instant) -> bool {
        let mut state = self.accounts.entry(account).or_default();
        state
            .recent_actions
            .retain(|t| now.duration_since(*t) < CHEATING_WINDOW);
        state.recent_actions.push(now);
        if state.recent_actions.len() > CHEATING_ACTION_LIMIT {
            drop(state);
            self.log_suspicion(account, SuspicionKind::ActionRate, SuspicionLevel::High);
            return true;
        }
        false
    }

    /// Current suspicion level derived from entries logged in the last
    /// minute: `≥3 low, ≥5 medium, ≥10 high, ≥20 critical`.
    #[must_use]
    pub fn current_suspicion(&self, account: AccountId, now: Instant) -> SuspicionLevel {
        let mut state = self.accounts.entry(account).or_default();
        state
            .suspicion
            .retain(|entry| now.duration_since(entry.at) < Duration::from_secs(60));
        SuspicionLevel::from_recent_count(state.suspicion.len())
    }

    fn log_suspicion(&self, account: AccountId, kind: SuspicionKind, level: SuspicionLevel) {
        log::warn!("suspicious activity: account={account} kind={kind:?} level={level:?}");
        self.accounts
            .entry(account)
            .or_default()
            .suspicion
            .push(SuspicionEntry::now(kind, level));
    }

    /// Clears all per-session bookkeeping for `account` on leave. Suspicion
    /// history is intentionally retained since it persists across the session,
    /// so only positions/cooldowns/rate counters reset.
    pub fn clear_session(&self, account: AccountId) {
        if let Some(mut state) = self.accounts.get_mut(&account) {
            state.last_position = None;
            state.cooldowns.clear();
            state.recent_actions.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc() -> AccountId {
        AccountId::new()
    }

    #[test]
    fn first_movement_is_always_accepted() {
        let v = Validator::new();
        let now = Instant::now();
        assert!(v.validate_movement(acc(), Vector3::new(0.0, 1.0, 0.0), now));
    }

    #[test]
    fn teleport_is_rejected() {
        let v = Validator::new();
        let a = acc();
        let t0 = Instant::now();
        assert!(v.validate_movement(a, Vector3::new(0.0, 1.0, 0.0), t0));
        let t1 = t0 + Duration::from_millis(16);
        assert!(!v.validate_movement(a, Vector3::new(100.0, 1.0, 100.0), t1));
        assert_eq!(v.last_position(a), Some(Vector3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn reasonable_walk_speed_is_accepted() {
        let v = Validator::new();
        let a = acc();
        let t0 = Instant::now();
        assert!(v.validate_movement(a, Vector3::ZERO, t0));
        let t1 = t0 + Duration::from_millis(100);
        // 0.4 units in 100ms = 4 u/s, under base speed 5.
        assert!(v.validate_movement(a, Vector3::new(0.4, 0.0, 0.0), t1));
    }

    #[test]
    fn speed_hack_is_rejected_but_teleport_bound_not_hit() {
        let v = Validator::new();
        let a = acc();
        let t0 = Instant::now();
        assert!(v.validate_movement(a, Vector3::ZERO, t0));
        let t1 = t0 + Duration::from_millis(16);
        // 1 unit in 16ms = 62.5 u/s, far past the speed-hack bound but
        // within the teleport distance bound (50 units).
        assert!(!v.validate_movement(a, Vector3::new(1.0, 0.0, 0.0), t1));
    }

    #[test]
    fn spell_cooldown_blocks_repeat_cast() {
        let v = Validator::new();
        let a = acc();
        let t0 = Instant::now();
        assert!(v.validate_spell_cast(a, "fireball", Duration::from_secs(5), t0));
        assert!(!v.validate_spell_cast(
            a,
            "fireball",
            Duration::from_secs(5),
            t0 + Duration::from_secs(1)
        ));
        assert!(v.validate_spell_cast(
            a,
            "fireball",
            Duration::from_secs(5),
            t0 + Duration::from_secs(6)
        ));
    }

    #[test]
    fn damage_bounds_are_enforced() {
        let v = Validator::new();
        let a = acc();
        assert!(!v.validate_damage(a, 0));
        assert!(!v.validate_damage(a, 10_001));
        assert!(v.validate_damage(a, 50));
    }

    #[test]
    fn suspicion_thresholds_escalate() {
        let v = Validator::new();
        let a = acc();
        let now = Instant::now();
        for _ in 0..3 {
            v.validate_damage(a, 0);
        }
        assert_eq!(v.current_suspicion(a, now), SuspicionLevel::Low);
    }

    #[test]
    fn clear_session_resets_positions_and_cooldowns_not_suspicion() {
        let v = Validator::new();
        let a = acc();
        let now = Instant::now();
        v.validate_movement(a, Vector3::ZERO, now);
        for _ in 0..3 {
            v.validate_damage(a, 0);
        }
        v.clear_session(a);
        assert!(v.last_position(a).is_none());
        // Suspicion history persists across a session reset.
        assert_eq!(v.current_suspicion(a, now), SuspicionLevel::Low);
    }
}
