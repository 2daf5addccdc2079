//! Room service: join/part, authority re-validation, and fan-out.
//!
//! DESIGN
//! ======
//! A room is the relay scope for one shared sketch. Clients never trust each
//! other directly: every inbound message is checked against the room's own
//! authoritative snapshot with the same rules the engine applies locally,
//! and only accepted messages update that snapshot and reach other clients.
//! Late joiners receive the latest snapshot on join.
//!
//! A room has at most one master seat. The participant holding it may open
//! further master connections (a reload racing the old socket's close); any
//! other participant claiming master is refused.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use sketch::authority::{Actor, AuthorityError, authorize_token_update, validate_snapshot_change};
use sketch::error::ErrorCode;
use sketch::model::SketchSnapshot;
use sketch::sync::{Envelope, SyncMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, RoomClient, RoomState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} already has a master")]
    MasterTaken(Uuid),
    #[error("connection is not in room {0}")]
    NotJoined(Uuid),
    #[error(transparent)]
    Forbidden(#[from] AuthorityError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MasterTaken(_) => "E_MASTER_TAKEN",
            Self::NotJoined(_) => "E_NOT_JOINED",
            Self::Forbidden(e) => e.error_code(),
        }
    }
}

fn master_conflict(room: Option<&RoomState>, actor: &Actor) -> bool {
    actor.is_master() && room.and_then(|r| r.master).is_some_and(|holder| holder != actor.participant_id)
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Whether `actor` could join `room_id` right now. Used to refuse a second
/// master before upgrading the connection.
pub async fn can_join(state: &AppState, room_id: Uuid, actor: &Actor) -> bool {
    let rooms = state.rooms.read().await;
    !master_conflict(rooms.get(&room_id), actor)
}

/// Register a connection and return the room's latest snapshot, if any.
///
/// # Errors
///
/// Returns [`RoomError::MasterTaken`] if `actor` claims master while another
/// participant holds the seat.
pub async fn join_room(
    state: &AppState,
    room_id: Uuid,
    connection_id: Uuid,
    actor: Actor,
    tx: mpsc::Sender<Envelope>,
) -> Result<Option<SketchSnapshot>, RoomError> {
    let mut rooms = state.rooms.write().await;
    if master_conflict(rooms.get(&room_id), &actor) {
        return Err(RoomError::MasterTaken(room_id));
    }

    let room = rooms.entry(room_id).or_default();
    if actor.is_master() {
        room.master = Some(actor.participant_id);
    }
    room.clients.insert(connection_id, RoomClient { actor, tx });

    info!(
        %room_id,
        %connection_id,
        participant_id = %actor.participant_id,
        role = ?actor.role,
        clients = room.clients.len(),
        "client joined room"
    );
    Ok(room.snapshot.clone())
}

/// Remove a connection. Frees the master seat when the holder's last master
/// connection leaves, and evicts the room once nobody is left.
pub async fn part_room(state: &AppState, room_id: Uuid, connection_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };

    let Some(client) = room.clients.remove(&connection_id) else {
        return;
    };
    info!(%room_id, %connection_id, remaining = room.clients.len(), "client left room");

    if client.actor.is_master() && room.master == Some(client.actor.participant_id) {
        let still_seated = room.clients.values().any(|c| c.actor == client.actor);
        if !still_seated {
            room.master = None;
            info!(%room_id, "master seat released");
        }
    }

    if room.clients.is_empty() {
        rooms.remove(&room_id);
        info!(%room_id, "evicted room from memory");
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Validate an inbound envelope from `actor`, fold it into the room's
/// authoritative snapshot, and fan it out to every other client.
///
/// Validation, the snapshot update and the fan-out happen under one write
/// guard, so peers receive messages in the order the snapshot absorbed them.
/// Fan-out is best-effort: a client whose queue is full misses the message
/// and catches up on the next full `sketchUpdate`.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the room is gone, or
/// [`RoomError::Forbidden`] if the change exceeds the actor's authority.
pub async fn relay(
    state: &AppState,
    room_id: Uuid,
    connection_id: Uuid,
    actor: &Actor,
    envelope: &Envelope,
) -> Result<(), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&room_id).ok_or(RoomError::NotJoined(room_id))?;

    fold(room, actor, &envelope.message)?;
    fan_out(room_id, room, envelope, connection_id);
    Ok(())
}

fn fold(room: &mut RoomState, actor: &Actor, message: &SyncMessage) -> Result<(), RoomError> {
    match message {
        SyncMessage::SketchUpdate(next) => {
            let empty = SketchSnapshot::default();
            let previous = room.snapshot.as_ref().unwrap_or(&empty);
            validate_snapshot_change(actor, previous, next)?;
            room.snapshot = Some(next.clone());
        }
        SyncMessage::TokenUpdate(token) => {
            let current = room.snapshot.as_ref().and_then(|s| s.tokens.iter().find(|t| t.id == token.id));
            authorize_token_update(actor, current, token)?;
            let slot = room.snapshot.as_mut().and_then(|s| s.tokens.iter_mut().find(|t| t.id == token.id));
            if let Some(slot) = slot {
                let index = slot.index;
                *slot = token.clone();
                slot.index = index;
            }
        }
    }
    Ok(())
}

fn fan_out(room_id: Uuid, room: &RoomState, envelope: &Envelope, exclude: Uuid) {
    for (connection_id, client) in &room.clients {
        if *connection_id == exclude {
            continue;
        }
        match client.tx.try_send(envelope.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(%room_id, %connection_id, "client queue full; message dropped"),
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
