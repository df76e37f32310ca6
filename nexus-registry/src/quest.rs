use async_trait::async_trait;
use nexus_core::ids::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestEventKind {
    Accept,
    Complete,
    Progress,
}

/// `QuestSystem.handleEvent(account, kind, target, qty)`. Quest content
/// itself is out of scope; the room only needs somewhere to forward
/// `acceptQuest`/`completeQuest` and kill/harvest progress events.
#[async_trait]
pub trait QuestSystem: Send + Sync {
    async fn handle_event(
        &self,
        account: AccountId,
        kind: QuestEventKind,
        target: &str,
        qty: u32,
    ) -> Result<(), String>;
}

pub struct NoopQuestSystem;

#[async_trait]
impl QuestSystem for NoopQuestSystem {
    async fn handle_event(
        &self,
        _account: AccountId,
        _kind: QuestEventKind,
        _target: &str,
        _qty: u32,
    ) -> Result<(), String> {
        Ok(())
    }
}
