#![allow(clippy::float_cmp)]

use sketch::model::{AttachedRef, TokenItem, TooltipPlacement};
use tokio::time::{Duration, timeout};

use super::*;
use crate::state::test_helpers;

fn token(owner: Option<Uuid>, x: f64) -> TokenItem {
    TokenItem {
        id: Uuid::new_v4(),
        index: 0,
        color: "#e53935".into(),
        attached_data: owner.map(|user_id| AttachedRef {
            user_id,
            user_name: "Ana".into(),
            character_id: None,
            character_name: None,
        }),
        x,
        y: 50.0,
        tooltip_placement: TooltipPlacement::Top,
    }
}

/// Snapshot with one token attached to `player` and one unattached token.
fn table(player: Uuid) -> SketchSnapshot {
    let mut mine = token(Some(player), 50.0);
    let mut free = token(None, 110.0);
    mine.index = 0;
    free.index = 1;
    SketchSnapshot { displayed: true, tokens: vec![mine, free], ..Default::default() }
}

async fn recv(rx: &mut mpsc::Receiver<Envelope>) -> Envelope {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("envelope receive timed out")
        .expect("channel closed")
}

async fn assert_empty(rx: &mut mpsc::Receiver<Envelope>) {
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err(), "expected no envelope");
}

/// Relay `message` from a connection that is not registered in the room.
async fn submit(state: &AppState, room_id: Uuid, actor: &Actor, message: SyncMessage) -> Result<(), RoomError> {
    relay(state, room_id, Uuid::new_v4(), actor, &Envelope::new(Some(*actor), message)).await
}

// =============================================================
// Join / part
// =============================================================

#[tokio::test]
async fn join_returns_latest_snapshot() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(4);

    let first = join_room(&state, room_id, Uuid::new_v4(), Actor::master(Uuid::new_v4()), tx.clone()).await;
    assert_eq!(first.unwrap(), None);

    let snapshot = table(Uuid::new_v4());
    test_helpers::seed_snapshot(&state, room_id, snapshot.clone()).await;
    let late = join_room(&state, room_id, Uuid::new_v4(), Actor::player(Uuid::new_v4()), tx).await;
    assert_eq!(late.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn second_master_is_refused() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let holder = Actor::master(Uuid::new_v4());
    let (tx, _rx) = mpsc::channel(4);
    join_room(&state, room_id, Uuid::new_v4(), holder, tx.clone()).await.unwrap();

    let rival = Actor::master(Uuid::new_v4());
    assert!(!can_join(&state, room_id, &rival).await);
    let err = join_room(&state, room_id, Uuid::new_v4(), rival, tx.clone()).await.unwrap_err();
    assert!(matches!(err, RoomError::MasterTaken(id) if id == room_id));
    assert_eq!(err.error_code(), "E_MASTER_TAKEN");

    assert!(can_join(&state, room_id, &holder).await, "the holder may reconnect");
    assert!(can_join(&state, room_id, &Actor::player(Uuid::new_v4())).await);
}

#[tokio::test]
async fn part_releases_seat_and_evicts_empty_room() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let master = Actor::master(Uuid::new_v4());
    let (master_conn, _m) = test_helpers::seed_client(&state, room_id, master).await;
    let (player_conn, _p) = test_helpers::seed_client(&state, room_id, Actor::player(Uuid::new_v4())).await;

    part_room(&state, room_id, master_conn).await;
    assert!(can_join(&state, room_id, &Actor::master(Uuid::new_v4())).await);
    assert!(state.rooms.read().await.contains_key(&room_id));

    part_room(&state, room_id, player_conn).await;
    assert!(!state.rooms.read().await.contains_key(&room_id));
}

#[tokio::test]
async fn seat_held_while_holder_has_another_connection() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let master = Actor::master(Uuid::new_v4());
    let (old_conn, _a) = test_helpers::seed_client(&state, room_id, master).await;
    let (_new_conn, _b) = test_helpers::seed_client(&state, room_id, master).await;

    part_room(&state, room_id, old_conn).await;
    assert!(!can_join(&state, room_id, &Actor::master(Uuid::new_v4())).await);
}

// =============================================================
// Accept
// =============================================================

#[tokio::test]
async fn master_snapshot_replaces_authoritative_state() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let master = Actor::master(Uuid::new_v4());
    test_helpers::seed_client(&state, room_id, master).await;

    let snapshot = table(Uuid::new_v4());
    submit(&state, room_id, &master, SyncMessage::SketchUpdate(snapshot.clone())).await.unwrap();
    assert_eq!(state.rooms.read().await[&room_id].snapshot, Some(snapshot));
}

#[tokio::test]
async fn player_snapshot_may_only_move_own_tokens() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let player = Actor::player(Uuid::new_v4());
    let base = table(player.participant_id);
    test_helpers::seed_snapshot(&state, room_id, base.clone()).await;
    test_helpers::seed_client(&state, room_id, player).await;

    let mut moved_own = base.clone();
    moved_own.tokens[0].x = 300.0;
    submit(&state, room_id, &player, SyncMessage::SketchUpdate(moved_own.clone())).await.unwrap();

    let mut moved_foreign = moved_own.clone();
    moved_foreign.tokens[1].x = 400.0;
    let err = submit(&state, room_id, &player, SyncMessage::SketchUpdate(moved_foreign)).await.unwrap_err();
    assert!(matches!(err, RoomError::Forbidden(_)));

    let mut hid_sketch = moved_own.clone();
    hid_sketch.displayed = false;
    assert!(submit(&state, room_id, &player, SyncMessage::SketchUpdate(hid_sketch)).await.is_err());

    assert_eq!(state.rooms.read().await[&room_id].snapshot, Some(moved_own));
}

#[tokio::test]
async fn token_update_folds_into_snapshot() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let player = Actor::player(Uuid::new_v4());
    let base = table(player.participant_id);
    test_helpers::seed_snapshot(&state, room_id, base.clone()).await;
    test_helpers::seed_client(&state, room_id, player).await;

    let mut dragged = base.tokens[0].clone();
    dragged.x = 75.0;
    dragged.index = 9;
    submit(&state, room_id, &player, SyncMessage::TokenUpdate(dragged)).await.unwrap();

    let rooms = state.rooms.read().await;
    let folded = &rooms[&room_id].snapshot.as_ref().unwrap().tokens[0];
    assert_eq!(folded.x, 75.0);
    assert_eq!(folded.index, 0, "index stays with the slot");
}

#[tokio::test]
async fn token_update_for_foreign_or_recolored_token_is_forbidden() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let player = Actor::player(Uuid::new_v4());
    let base = table(player.participant_id);
    test_helpers::seed_snapshot(&state, room_id, base.clone()).await;
    test_helpers::seed_client(&state, room_id, player).await;

    let mut foreign = base.tokens[1].clone();
    foreign.x = 500.0;
    assert!(submit(&state, room_id, &player, SyncMessage::TokenUpdate(foreign)).await.is_err());

    let mut recolored = base.tokens[0].clone();
    recolored.color = "#000000".into();
    assert!(submit(&state, room_id, &player, SyncMessage::TokenUpdate(recolored)).await.is_err());

    assert_eq!(state.rooms.read().await[&room_id].snapshot, Some(base));
}

#[tokio::test]
async fn relay_in_unknown_room_fails() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let msg = SyncMessage::SketchUpdate(SketchSnapshot::default());
    let err = submit(&state, room_id, &Actor::master(Uuid::new_v4()), msg).await.unwrap_err();
    assert!(matches!(err, RoomError::NotJoined(id) if id == room_id));
}

// =============================================================
// Fan-out
// =============================================================

#[tokio::test]
async fn relay_skips_sender() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let master = Actor::master(Uuid::new_v4());
    let (sender, mut sender_rx) = test_helpers::seed_client(&state, room_id, master).await;
    let (_a, mut rx_a) = test_helpers::seed_client(&state, room_id, Actor::player(Uuid::new_v4())).await;
    let (_b, mut rx_b) = test_helpers::seed_client(&state, room_id, Actor::player(Uuid::new_v4())).await;

    let envelope = Envelope::new(Some(master), SyncMessage::SketchUpdate(SketchSnapshot::default()));
    relay(&state, room_id, sender, &master, &envelope).await.unwrap();

    assert_eq!(recv(&mut rx_a).await, envelope);
    assert_eq!(recv(&mut rx_b).await, envelope);
    assert_empty(&mut sender_rx).await;
}

#[tokio::test]
async fn rejected_message_reaches_nobody() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let player = Actor::player(Uuid::new_v4());
    let base = table(player.participant_id);
    test_helpers::seed_snapshot(&state, room_id, base.clone()).await;
    let (sender, _p) = test_helpers::seed_client(&state, room_id, player).await;
    let (_m, mut master_rx) = test_helpers::seed_client(&state, room_id, Actor::master(Uuid::new_v4())).await;

    let mut foreign = base.tokens[1].clone();
    foreign.x = 640.0;
    let envelope = Envelope::new(Some(player), SyncMessage::TokenUpdate(foreign));
    assert!(relay(&state, room_id, sender, &player, &envelope).await.is_err());
    assert_empty(&mut master_rx).await;
}

#[tokio::test]
async fn full_queue_drops_without_failing_the_relay() {
    let state = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let master = Actor::master(Uuid::new_v4());
    let (sender, _m) = test_helpers::seed_client(&state, room_id, master).await;
    let (_slow, mut slow_rx) = test_helpers::seed_client(&state, room_id, Actor::player(Uuid::new_v4())).await;

    let envelope = Envelope::new(Some(master), SyncMessage::SketchUpdate(SketchSnapshot::default()));
    for _ in 0..20 {
        relay(&state, room_id, sender, &master, &envelope).await.unwrap();
    }
    let mut delivered = 0;
    while slow_rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 16);
}
