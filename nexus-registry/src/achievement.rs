use async_trait::async_trait;
use nexus_core::ids::AccountId;

#[derive(Debug, Clone)]
pub struct AchievementOutcome {
    pub unlocked: bool,
    pub definition: Option<String>,
}

/// `AchievementSystem.handleEvent(account, event) -> {unlocked?,
/// definition?}`. Fired by the tick loop on kills and by the dungeon
/// instance manager on `complete`.
#[async_trait]
pub trait AchievementSystem: Send + Sync {
    async fn handle_event(&self, account: AccountId, event: &str) -> AchievementOutcome;
}

pub struct NoopAchievementSystem;

#[async_trait]
impl AchievementSystem for NoopAchievementSystem {
    async fn handle_event(&self, _account: AccountId, _event: &str) -> AchievementOutcome {
        AchievementOutcome {
            unlocked: false,
            definition: None,
        }
    }
}
