use std::collections::VecDeque;

use nexus_core::ids::TradeId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::trade::TradeStatus;

pub const AUDIT_LOG_CAP: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub trade_id: TradeId,
    pub status: TradeStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub detail: String,
}

/// A bounded, append-only log of every trade transition, for moderation.
/// Oldest entries are evicted once the cap is reached.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade_id: TradeId, status: TradeStatus, detail: impl Into<String>) {
        if self.entries.len() >= AUDIT_LOG_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back(AuditEntry {
            trade_id,
            status,
            at: OffsetDateTime::now_utc(),
            detail: detail.into(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> &VecDeque<AuditEntry> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut log = AuditLog::new();
        for i in 0..(AUDIT_LOG_CAP + 10) {
            log.record(TradeId::new(), TradeStatus::Pending, format!("entry {i}"));
        }
        assert_eq!(log.entries().len(), AUDIT_LOG_CAP);
    }
}
