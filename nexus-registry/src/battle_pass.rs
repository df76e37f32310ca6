use async_trait::async_trait;
use nexus_core::ids::AccountId;

/// `BattlePass.addXP(account, n)`. Tiers, tracks, and reward catalogs are
/// out of scope; the tick loop only needs to push XP earned from kills and
/// dungeon completions somewhere.
#[async_trait]
pub trait BattlePass: Send + Sync {
    async fn add_xp(&self, account: AccountId, n: u64) -> Result<(), String>;
}

pub struct NoopBattlePass;

#[async_trait]
impl BattlePass for NoopBattlePass {
    async fn add_xp(&self, _account: AccountId, _n: u64) -> Result<(), String> {
        Ok(())
    }
}
