//! Collaborator trait contracts: every external system the room talks to
//! but does not own. Concrete production implementations live outside this
//! crate (or in `nexus-repository` for the store); this crate only defines
//! the seam plus a no-op/in-memory default useful for tests, keeping
//! registry *contracts* separate from registry *data*.

pub mod achievement;
pub mod battle_pass;
pub mod monitoring;
pub mod quest;
pub mod token_verifier;

pub use achievement::{AchievementOutcome, AchievementSystem, NoopAchievementSystem};
pub use battle_pass::{BattlePass, NoopBattlePass};
pub use monitoring::{AlertOp, LogLevel, Monitoring};
pub use quest::{NoopQuestSystem, QuestSystem};
pub use token_verifier::{AlwaysAllowVerifier, TokenVerifier, VerifiedIdentity};
