//! Black-box session-lifecycle tests against the room runtime's public API
//! only (`Room::new`/`spawn`, `RoomHandle`) — no access to `Room`'s private
//! dispatch methods, the way a real transport client would see it.

use std::sync::Arc;

use nexus_protocol::{CloseCode, InboundMessage, OutboundMessage};
use nexus_registry::{AlwaysAllowVerifier, NoopAchievementSystem, NoopBattlePass, NoopQuestSystem};
use nexus_repository::{MemoryStore, PlayerRepository};
use nexus_server::config::Config;
use nexus_server::monitoring::MonitoringCore;
use nexus_server::Room;
use tokio::sync::mpsc;

fn spawn_room() -> nexus_server::RoomHandle {
    let room = Room::new(
        Config::default(),
        Arc::new(PlayerRepository::new(Arc::new(MemoryStore::new()))),
        Arc::new(AlwaysAllowVerifier),
        Arc::new(NoopQuestSystem),
        Arc::new(NoopAchievementSystem),
        Arc::new(NoopBattlePass),
        Arc::new(MonitoringCore::new()),
    );
    room.spawn()
}

/// Scenario: a fresh connection receives a full-state snapshot on join.
#[tokio::test]
async fn connecting_receives_a_snapshot() {
    let handle = spawn_room();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connected = handle.connect(None, tx).await.expect("connect should succeed with no verifier configured");

    let first = rx.recv().await.expect("a snapshot should arrive immediately after connect");
    assert!(matches!(first, OutboundMessage::Snapshot { .. }));
    assert_ne!(connected.account_id.to_string(), "");
}

/// A teleport-sized move is corrected, not applied.
#[tokio::test]
async fn a_teleport_sized_move_is_corrected() {
    let handle = spawn_room();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connected = handle.connect(None, tx).await.unwrap();
    let _snapshot = rx.recv().await.unwrap();

    // Establishes a baseline accepted position: the validator has no prior
    // position for a just-connected account and accepts the first move
    // unconditionally, so the teleport bound only applies from here on.
    handle
        .inbound(connected.session_id, InboundMessage::Move { x: 0.0, y: 1.0, z: 0.0, rotation: 0.0 })
        .await;

    handle
        .inbound(
            connected.session_id,
            InboundMessage::Move {
                x: 100.0,
                y: 1.0,
                z: 100.0,
                rotation: 0.0,
            },
        )
        .await;

    let reply = rx.recv().await.expect("a rejected move should trigger a position correction");
    match reply {
        OutboundMessage::PositionCorrection { x, y, z } => {
            assert_eq!((x, y, z), (0.0, 1.0, 0.0), "correction should snap back to the player's spawn position");
        }
        other => panic!("expected a position correction, got {other:?}"),
    }
}

/// A second session for the same account supersedes the first, which is
/// closed with the admin close code.
#[tokio::test]
async fn a_second_session_for_the_same_account_supersedes_the_first() {
    let handle = spawn_room();
    let token = Some("22222222-2222-2222-2222-222222222222".to_string());

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let first = handle.connect(token.clone(), tx1).await.unwrap();

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let second = handle.connect(token, tx2).await.unwrap();

    assert_eq!(first.account_id, second.account_id);
    let closed = first.close_rx.await.expect("superseded session's close channel should fire");
    assert_eq!(closed, CloseCode::Admin);
}

/// Disconnecting one session leaves the room free to accept a fresh one for
/// the same account rather than treating it as still occupied.
#[tokio::test]
async fn disconnecting_frees_the_account_for_a_new_session() {
    let handle = spawn_room();
    let token = Some("33333333-3333-3333-3333-333333333333".to_string());

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let first = handle.connect(token.clone(), tx1).await.unwrap();
    handle.disconnect(first.session_id).await;

    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let second = handle.connect(token, tx2).await.unwrap();
    assert_eq!(first.account_id, second.account_id);
    assert!(matches!(rx2.recv().await.unwrap(), OutboundMessage::Snapshot { .. }));
}
