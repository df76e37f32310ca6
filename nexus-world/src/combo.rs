//! Per-account kill combo tracking. A combo decays after
//! [`COMBO_WINDOW`] of no kills; the multiplier is read by damage
//! resolution *before* the triggering kill is registered, so a killing
//! blow benefits from the multiplier the combo had going into it, not the
//! one after.

use std::collections::HashMap;
use std::time::Instant;

use nexus_core::constants::{COMBO_MULTIPLIER_CAP, COMBO_WINDOW};
use nexus_core::ids::AccountId;

#[derive(Debug, Clone, Copy)]
pub struct ComboState {
    pub kills: u32,
    pub multiplier: f64,
    pub window_start: Instant,
}

#[derive(Debug, Default)]
pub struct ComboRegistry {
    combos: HashMap<AccountId, ComboState>,
}

impl ComboRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The multiplier currently in effect for `account`, or `1.0` if the
    /// account has no combo or its window has lapsed.
    #[must_use]
    pub fn current_multiplier(&self, account: AccountId, now: Instant) -> f64 {
        match self.combos.get(&account) {
            Some(state) if now.duration_since(state.window_start) <= COMBO_WINDOW => state.multiplier,
            _ => 1.0,
        }
    }

    /// Registers a kill, resetting the combo if the window had already
    /// lapsed, and returns the resulting state.
    pub fn register_kill(&mut self, account: AccountId, now: Instant) -> ComboState {
        let state = self.combos.entry(account).or_insert(ComboState {
            kills: 0,
            multiplier: 1.0,
            window_start: now,
        });
        if now.duration_since(state.window_start) > COMBO_WINDOW {
            state.kills = 0;
            state.window_start = now;
        }
        state.kills += 1;
        state.multiplier = Self::multiplier_for(state.kills);
        *state
    }

    /// `1 + max(0, kills - 2) * 0.1`, capped at [`COMBO_MULTIPLIER_CAP`].
    #[must_use]
    pub fn multiplier_for(kills: u32) -> f64 {
        (1.0 + f64::from(kills.saturating_sub(2)) * 0.1).min(COMBO_MULTIPLIER_CAP)
    }

    /// Drops combo entries whose window lapsed more than `ttl` ago, called
    /// from the room's periodic memory-hygiene pass.
    pub fn prune(&mut self, now: Instant, ttl: std::time::Duration) {
        self.combos
            .retain(|_, state| now.duration_since(state.window_start) <= COMBO_WINDOW + ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_kills_within_window_yields_documented_multiplier() {
        let mut registry = ComboRegistry::new();
        let account = AccountId::new();
        let now = Instant::now();
        registry.register_kill(account, now);
        registry.register_kill(account, now);
        let state = registry.register_kill(account, now);
        assert_eq!(state.kills, 3);
        assert!((state.multiplier - 1.1).abs() < 1e-9);
        assert!((registry.current_multiplier(account, now) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn multiplier_caps_at_three() {
        assert!((ComboRegistry::multiplier_for(100) - COMBO_MULTIPLIER_CAP).abs() < 1e-9);
    }

    #[test]
    fn window_expiry_resets_combo() {
        let mut registry = ComboRegistry::new();
        let account = AccountId::new();
        let t0 = Instant::now();
        registry.register_kill(account, t0);
        let later = t0 + COMBO_WINDOW + std::time::Duration::from_millis(1);
        let state = registry.register_kill(account, later);
        assert_eq!(state.kills, 1);
        assert!((state.multiplier - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_account_defaults_to_one() {
        let registry = ComboRegistry::new();
        assert!((registry.current_multiplier(AccountId::new(), Instant::now()) - 1.0).abs() < 1e-9);
    }
}
