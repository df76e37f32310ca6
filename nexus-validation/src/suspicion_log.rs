use std::time::Instant;

use nexus_core::suspicion::SuspicionLevel;

/// Which validator rejected the action; kept distinct from the resulting
/// [`SuspicionLevel`] so the room can log a human-readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionKind {
    Teleport,
    SpeedHack,
    InvalidDamage,
    SpellCooldown,
    InvalidInventoryChange,
    ActionRate,
}

#[derive(Debug, Clone, Copy)]
pub struct SuspicionEntry {
    pub kind: SuspicionKind,
    pub level: SuspicionLevel,
    pub at: Instant,
}

impl SuspicionEntry {
    #[must_use]
    pub fn now(kind: SuspicionKind, level: SuspicionLevel) -> Self {
        Self {
            kind,
            level,
            at: Instant::now(),
        }
    }
}
