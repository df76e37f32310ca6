//! Plain entity/session storage for one room. No behavior lives here
//! beyond simple accessors; the tick loop and message handlers (in sibling
//! modules, both `impl Room`) own the actual logic.

use std::collections::{HashMap, VecDeque};

use nexus_core::ids::{AccountId, CharacterId, EntityId, EntityIdAllocator, SessionId};
use nexus_protocol::{CloseCode, OutboundMessage};
use nexus_repository::PlayerRecord;
use nexus_spatial::SpatialGrid;
use nexus_trading::TradeManager;
use nexus_validation::Validator;
use nexus_world::dungeon::DungeonManager;
use nexus_world::{ComboRegistry, Enemy, GuildRegistry, LootDrop, Player, Projectile};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

pub struct SessionHandle {
    pub session_id: SessionId,
    pub outbound: UnboundedSender<OutboundMessage>,
    /// Fired to tell the transport task to close this connection, used when
    /// a newer session for the same account supersedes it.
    pub close: oneshot::Sender<CloseCode>,
}

#[derive(Default)]
pub struct RoomState {
    pub players: HashMap<AccountId, Player>,
    /// Full persisted record backing each online player, kept alongside the
    /// session-scoped [`Player`] view so a save can round-trip the
    /// collaborator-owned JSON blobs this view never touches.
    pub records: HashMap<AccountId, PlayerRecord>,
    pub enemies: HashMap<EntityId, Enemy>,
    pub projectiles: HashMap<EntityId, Projectile>,
    pub loot: HashMap<EntityId, LootDrop>,

    pub guilds: GuildRegistry,
    pub combos: ComboRegistry,
    pub dungeons: DungeonManager,
    pub trades: TradeManager,
    pub validator: Validator,

    pub player_grid: SpatialGrid<AccountId>,
    pub enemy_grid: SpatialGrid<EntityId>,

    pub ids: EntityIdAllocator,

    /// `account_id -> active session`, with single-session-per-account
    /// discipline enforced by [`crate::room::Room::connect`].
    pub sessions: HashMap<AccountId, SessionHandle>,
    pub character_of: HashMap<AccountId, CharacterId>,

    pub tick_count: u64,
    pub tick_times_ms: VecDeque<u64>,
    pub world_boss_id: Option<EntityId>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.players.len()
    }

    pub fn send_to(&self, account: AccountId, message: OutboundMessage) {
        if let Some(handle) = self.sessions.get(&account) {
            let _ = handle.outbound.send(message);
        }
    }

    pub fn broadcast(&self, message: &OutboundMessage) {
        for handle in self.sessions.values() {
            let _ = handle.outbound.send(message.clone());
        }
    }

    #[must_use]
    pub fn account_for_session(&self, session_id: SessionId) -> Option<AccountId> {
        self.sessions
            .iter()
            .find(|(_, handle)| handle.session_id == session_id)
            .map(|(account, _)| *account)
    }
}
