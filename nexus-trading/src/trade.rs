use nexus_core::ids::{AccountId, TradeId};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::offer::Offer;

pub const TRADE_EXPIRY: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl TradeStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A two-party trade session: `pending -> confirmed -> completed` on
/// success, or `pending|confirmed -> cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSession {
    pub id: TradeId,
    pub p1: AccountId,
    pub p2: AccountId,
    pub offer1: Offer,
    pub offer2: Offer,
    pub conf1: bool,
    pub conf2: bool,
    pub status: TradeStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl TradeSession {
    #[must_use]
    pub fn new(p1: AccountId, p2: AccountId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: TradeId::new(),
            p1,
            p2,
            offer1: Offer::default(),
            offer2: Offer::default(),
            conf1: false,
            conf2: false,
            status: TradeStatus::Pending,
            created_at: now,
            expires_at: now + TRADE_EXPIRY,
        }
    }

    #[must_use]
    pub fn has_participant(&self, account: AccountId) -> bool {
        self.p1 == account || self.p2 == account
    }

    #[must_use]
    pub fn other(&self, account: AccountId) -> Option<AccountId> {
        if account == self.p1 {
            Some(self.p2)
        } else if account == self.p2 {
            Some(self.p1)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Any mutation resets both participants' confirmations.
    pub fn reset_confirmations(&mut self) {
        self.conf1 = false;
        self.conf2 = false;
        self.status = TradeStatus::Pending;
    }

    /// Toggles `account`'s confirmation flag. Returns `true` if this toggle
    /// brought both sides to confirmed (the caller should then attempt
    /// execution).
    pub fn toggle_confirmation(&mut self, account: AccountId) -> bool {
        if account == self.p1 {
            self.conf1 = !self.conf1;
        } else if account == self.p2 {
            self.conf2 = !self.conf2;
        }
        let both_confirmed = self.conf1 && self.conf2;
        if both_confirmed {
            self.status = TradeStatus::Confirmed;
        }
        both_confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_both_confirmations_marks_confirmed() {
        let mut trade = TradeSession::new(AccountId::new(), AccountId::new());
        assert!(!trade.toggle_confirmation(trade.p1));
        assert!(trade.toggle_confirmation(trade.p2));
        assert_eq!(trade.status, TradeStatus::Confirmed);
    }

    #[test]
    fn reset_confirmations_clears_both_flags() {
        let mut trade = TradeSession::new(AccountId::new(), AccountId::new());
        trade.toggle_confirmation(trade.p1);
        trade.reset_confirmations();
        assert!(!trade.conf1);
        assert!(!trade.conf2);
        assert_eq!(trade.status, TradeStatus::Pending);
    }
}
