//! Two-party trade session state machine. `TradeManager` is room-private,
//! single-threaded state, mirroring `nexus-validation`'s "pure stateful
//! component" shape: no network or repository I/O happens in here
//! directly. `execute` takes already-loaded `PlayerRecord`s so the room
//! decides when/how those records are fetched and persisted, keeping this
//! crate ignorant of account->character binding (that lookup is a room
//! concern, not a trade concern).

pub mod audit;
pub mod error;
pub mod inventory_ops;
pub mod offer;
pub mod trade;

use std::collections::HashMap;

use nexus_core::ids::{AccountId, TradeId};
use nexus_core::vector::Vector3;
use nexus_repository::PlayerRecord;
use time::OffsetDateTime;

pub use audit::{AuditEntry, AuditLog};
pub use error::TradeError;
pub use offer::Offer;
pub use trade::{TradeSession, TradeStatus, TRADE_EXPIRY};

/// Maximum planar/3-D distance between participants at `initiate` time.
pub const MAX_INITIATE_DISTANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    WaitingOnOther,
    BothConfirmed,
}

#[derive(Default)]
pub struct TradeManager {
    sessions: HashMap<TradeId, TradeSession>,
    active_by_account: HashMap<AccountId, TradeId>,
    audit: AuditLog,
}

impl TradeManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self, id: TradeId) -> Option<&TradeSession> {
        self.sessions.get(&id)
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// `initiate`: both participants must be within
    /// [`MAX_INITIATE_DISTANCE`] world units and neither may already hold a
    /// non-terminal session.
    pub fn initiate(
        &mut self,
        p1: AccountId,
        p1_pos: Vector3,
        p2: AccountId,
        p2_pos: Vector3,
        now: OffsetDateTime,
    ) -> Result<TradeId, TradeError> {
        if self.active_by_account.contains_key(&p1) || self.active_by_account.contains_key(&p2) {
            return Err(TradeError::AlreadyTrading);
        }
        let distance = p1_pos.distance_to(p2_pos);
        if distance > MAX_INITIATE_DISTANCE {
            return Err(TradeError::TooFarApart(MAX_INITIATE_DISTANCE));
        }

        let mut session = TradeSession::new(p1, p2);
        session.created_at = now;
        session.expires_at = now + TRADE_EXPIRY;
        let id = session.id;

        self.active_by_account.insert(p1, id);
        self.active_by_account.insert(p2, id);
        self.audit.record(id, session.status, "trade initiated");
        self.sessions.insert(id, session);
        Ok(id)
    }

    fn require_active(
        &mut self,
        id: TradeId,
        account: AccountId,
    ) -> Result<&mut TradeSession, TradeError> {
        let session = self.sessions.get_mut(&id).ok_or(TradeError::NotFound)?;
        if !session.has_participant(account) {
            return Err(TradeError::NotAParticipant);
        }
        if session.status.is_terminal() {
            return Err(TradeError::InvalidState);
        }
        Ok(session)
    }

    pub fn add_item(
        &mut self,
        id: TradeId,
        account: AccountId,
        item: &str,
        qty: u32,
    ) -> Result<(), TradeError> {
        let session = self.require_active(id, account)?;
        let offer = session.offer_mut(account);
        offer.add_item(item, qty);
        session.reset_confirmations();
        self.audit.record(
            id,
            TradeStatus::Pending,
            format!("{account} offered {qty}x {item}"),
        );
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        id: TradeId,
        account: AccountId,
        item: &str,
        qty: u32,
    ) -> Result<(), TradeError> {
        let session = self.require_active(id, account)?;
        let offer = session.offer_mut(account);
        if !offer.remove_item(item, qty) {
            return Err(TradeError::InsufficientItems);
        }
        session.reset_confirmations();
        self.audit.record(
            id,
            TradeStatus::Pending,
            format!("{account} withdrew {qty}x {item}"),
        );
        Ok(())
    }

    pub fn set_credits(
        &mut self,
        id: TradeId,
        account: AccountId,
        credits: u64,
    ) -> Result<(), TradeError> {
        let session = self.require_active(id, account)?;
        session.offer_mut(account).set_credits(credits);
        session.reset_confirmations();
        self.audit.record(
            id,
            TradeStatus::Pending,
            format!("{account} set credits to {credits}"),
        );
        Ok(())
    }

    /// Toggles `account`'s confirmation flag. When both participants are
    /// confirmed the caller must follow up with [`Self::execute`]; this
    /// method alone never touches player records.
    pub fn toggle_confirmation(
        &mut self,
        id: TradeId,
        account: AccountId,
    ) -> Result<ConfirmOutcome, TradeError> {
        let session = self.require_active(id, account)?;
        let both = session.toggle_confirmation(account);
        let status = session.status;
        self.audit
            .record(id, status, format!("{account} toggled confirmation"));
        Ok(if both {
            ConfirmOutcome::BothConfirmed
        } else {
            ConfirmOutcome::WaitingOnOther
        })
    }

    pub fn cancel(&mut self, id: TradeId, account: AccountId) -> Result<(), TradeError> {
        let session = self.require_active(id, account)?;
        session.status = TradeStatus::Cancelled;
        self.audit
            .record(id, TradeStatus::Cancelled, format!("cancelled by {account}"));
        self.release(id);
        Ok(())
    }

    /// Atomically executes a confirmed trade: revalidates quantities/
    /// credits against the two records the caller just loaded
    /// from the repository, deducts from both sides, credits the other
    /// side. On any validation failure the session moves to `cancelled`
    /// and neither record is mutated (validation happens before any
    /// mutation, so there is no partial-apply state to unwind).
    pub fn execute(
        &mut self,
        id: TradeId,
        account_a: AccountId,
        record_a: &mut PlayerRecord,
        account_b: AccountId,
        record_b: &mut PlayerRecord,
    ) -> Result<(), TradeError> {
        let session = self.sessions.get(&id).ok_or(TradeError::NotFound)?;
        if session.status != TradeStatus::Confirmed {
            return Err(TradeError::InvalidState);
        }
        let (a_offer, b_offer) = match (
            account_a == session.p1 && account_b == session.p2,
            account_a == session.p2 && account_b == session.p1,
        ) {
            (true, _) => (session.offer1.clone(), session.offer2.clone()),
            (_, true) => (session.offer2.clone(), session.offer1.clone()),
            _ => return Err(TradeError::NotAParticipant),
        };

        if let Err(err) = Self::apply(record_a, record_b, &a_offer, &b_offer) {
            let session = self.sessions.get_mut(&id).expect("checked above");
            session.status = TradeStatus::Cancelled;
            self.audit
                .record(id, TradeStatus::Cancelled, format!("execution failed: {err}"));
            self.release(id);
            return Err(err);
        }

        let session = self.sessions.get_mut(&id).expect("checked above");
        session.status = TradeStatus::Completed;
        self.audit.record(id, TradeStatus::Completed, "trade executed");
        self.release(id);
        Ok(())
    }

    /// Checks both sides can cover their offer, then transfers atomically.
    fn apply(
        record_a: &mut PlayerRecord,
        record_b: &mut PlayerRecord,
        a_offer: &Offer,
        b_offer: &Offer,
    ) -> Result<(), TradeError> {
        if record_a.credits < a_offer.credits || record_b.credits < b_offer.credits {
            return Err(TradeError::InsufficientCredits);
        }
        for (item, qty) in &a_offer.items {
            if inventory_ops::item_qty(&record_a.inventory, item) < u64::from(*qty) {
                return Err(TradeError::InsufficientItems);
            }
        }
        for (item, qty) in &b_offer.items {
            if inventory_ops::item_qty(&record_b.inventory, item) < u64::from(*qty) {
                return Err(TradeError::InsufficientItems);
            }
        }

        record_a.credits -= a_offer.credits;
        record_b.credits += a_offer.credits;
        record_b.credits -= b_offer.credits;
        record_a.credits += b_offer.credits;

        for (item, qty) in &a_offer.items {
            inventory_ops::adjust_item(&mut record_a.inventory, item, -i64::from(*qty));
            inventory_ops::adjust_item(&mut record_b.inventory, item, i64::from(*qty));
        }
        for (item, qty) in &b_offer.items {
            inventory_ops::adjust_item(&mut record_b.inventory, item, -i64::from(*qty));
            inventory_ops::adjust_item(&mut record_a.inventory, item, i64::from(*qty));
        }
        Ok(())
    }

    /// Removes expired, still-pending/confirmed sessions (background
    /// cleanup). Returns the ids that were expired so the caller can notify
    /// connected clients.
    pub fn cleanup_expired(&mut self, now: OffsetDateTime) -> Vec<TradeId> {
        let expired: Vec<TradeId> = self
            .sessions
            .values()
            .filter(|s| !s.status.is_terminal() && s.is_expired(now))
            .map(|s| s.id)
            .collect();
        for id in &expired {
            if let Some(session) = self.sessions.get_mut(id) {
                session.status = TradeStatus::Cancelled;
            }
            self.audit.record(*id, TradeStatus::Cancelled, "expired");
            self.release(*id);
        }
        expired
    }

    /// Clears a trade's account bindings so its participants may start a
    /// new trade. Called whenever a session reaches a terminal state.
    fn release(&mut self, id: TradeId) {
        if let Some(session) = self.sessions.get(&id) {
            self.active_by_account.remove(&session.p1);
            self.active_by_account.remove(&session.p2);
        }
    }

    /// Drops all state for `account` (session disconnect): cancels any
    /// non-terminal trade it holds.
    pub fn on_disconnect(&mut self, account: AccountId) {
        if let Some(id) = self.active_by_account.get(&account).copied() {
            let _ = self.cancel(id, account);
        }
    }
}

impl trade::TradeSession {
    fn offer_mut(&mut self, account: AccountId) -> &mut Offer {
        if account == self.p1 {
            &mut self.offer1
        } else {
            &mut self.offer2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::ids::AccountId;
    use serde_json::json;

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn make_record(account: AccountId, credits: u64, items: serde_json::Value) -> PlayerRecord {
        let mut record = PlayerRecord::new(account, "P".into(), "human".into());
        record.credits = credits;
        record.inventory = items;
        record
    }

    #[test]
    fn initiate_rejects_too_far_apart() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let err = mgr
            .initiate(p1, Vector3::ZERO, p2, Vector3::new(10.0, 0.0, 0.0), now())
            .unwrap_err();
        assert!(matches!(err, TradeError::TooFarApart(_)));
    }

    #[test]
    fn initiate_rejects_second_session_for_same_account() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let p3 = AccountId::new();
        mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, now()).unwrap();
        let err = mgr.initiate(p1, Vector3::ZERO, p3, Vector3::ZERO, now()).unwrap_err();
        assert!(matches!(err, TradeError::AlreadyTrading));
    }

    #[test]
    fn mutation_resets_confirmations_and_execute_conserves_totals() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let id = mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, now()).unwrap();

        mgr.add_item(id, p1, "sword", 1).unwrap();
        mgr.set_credits(id, p2, 50).unwrap();

        assert_eq!(mgr.toggle_confirmation(id, p1).unwrap(), ConfirmOutcome::WaitingOnOther);
        // p2 mutating after p1 confirmed resets p1's confirmation.
        mgr.set_credits(id, p2, 50).unwrap();
        assert!(!mgr.session(id).unwrap().conf1);

        assert_eq!(mgr.toggle_confirmation(id, p1).unwrap(), ConfirmOutcome::WaitingOnOther);
        assert_eq!(mgr.toggle_confirmation(id, p2).unwrap(), ConfirmOutcome::BothConfirmed);

        let mut r1 = make_record(p1, 100, json!([{"item": "sword", "qty": 1}]));
        let mut r2 = make_record(p2, 100, json!([]));

        let before_total_credits = r1.credits + r2.credits;

        mgr.execute(id, p1, &mut r1, p2, &mut r2).unwrap();

        assert_eq!(r1.credits + r2.credits, before_total_credits);
        assert_eq!(r1.credits, 150);
        assert_eq!(r2.credits, 50);
        assert_eq!(inventory_ops::item_qty(&r1.inventory, "sword"), 0);
        assert_eq!(inventory_ops::item_qty(&r2.inventory, "sword"), 1);
        assert_eq!(mgr.session(id).unwrap().status, TradeStatus::Completed);
    }

    #[test]
    fn execute_fails_closed_on_insufficient_credits() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let id = mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, now()).unwrap();
        mgr.set_credits(id, p1, 1000).unwrap();
        mgr.toggle_confirmation(id, p1).unwrap();
        mgr.toggle_confirmation(id, p2).unwrap();

        let mut r1 = make_record(p1, 10, json!([]));
        let mut r2 = make_record(p2, 10, json!([]));
        let err = mgr.execute(id, p1, &mut r1, p2, &mut r2).unwrap_err();
        assert!(matches!(err, TradeError::InsufficientCredits));
        assert_eq!(mgr.session(id).unwrap().status, TradeStatus::Cancelled);
        assert_eq!(r1.credits, 10);
    }

    #[test]
    fn cleanup_expired_releases_participants() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let t0 = now();
        mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, t0).unwrap();
        let expired = mgr.cleanup_expired(t0 + TRADE_EXPIRY + time::Duration::seconds(1));
        assert_eq!(expired.len(), 1);
        // Participants freed up: a fresh initiate now succeeds.
        mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, t0).unwrap();
    }

    #[test]
    fn audit_log_records_every_transition() {
        let mut mgr = TradeManager::new();
        let p1 = AccountId::new();
        let p2 = AccountId::new();
        let id = mgr.initiate(p1, Vector3::ZERO, p2, Vector3::ZERO, now()).unwrap();
        mgr.add_item(id, p1, "sword", 1).unwrap();
        mgr.cancel(id, p1).unwrap();
        assert!(mgr.audit().entries().iter().any(|e| e.trade_id == id
            && e.status == TradeStatus::Cancelled));
    }
}
