//! WebSocket handler: per-room sketch relay.
//!
//! DESIGN
//! ======
//! The connection URL names the room and the caller's participant id and
//! role; identity is established upstream and fixed for the connection.
//! On upgrade the handler joins the room and enters a `select!` loop:
//! - Incoming client text → decode envelope → stamp sender → validate →
//!   fold into the room snapshot → relay to the other clients
//! - Envelopes relayed by room peers → forward to client
//!
//! Rejected or undecodable messages are dropped with a warning. The sender
//! gets no error frame; its own state is corrected by the next full update
//! it receives.
//!
//! LIFECYCLE
//! =========
//! 1. `GET /api/rooms/{room_id}/ws?participant_id=…&role=master|player`
//! 2. A master claim on a room whose seat is held elsewhere → 409
//! 3. Upgrade → join → send the latest `sketchUpdate` if the room has one
//! 4. Relay until close → part

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use sketch::authority::{Actor, Role};
use sketch::error::ErrorCode;
use sketch::sync::{Envelope, SyncMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room::{self, RoomError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub participant_id: Uuid,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
enum InboundError {
    #[error("invalid envelope: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl ErrorCode for InboundError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_INVALID_ENVELOPE",
            Self::Room(e) => e.error_code(),
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let actor = Actor { participant_id: params.participant_id, role: params.role };
    if !room::can_join(&state, room_id, &actor).await {
        info!(%room_id, participant_id = %actor.participant_id, "ws: master seat taken");
        return (StatusCode::CONFLICT, "room already has a master").into_response();
    }
    ws.on_upgrade(move |socket| run_ws(socket, state, room_id, actor))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, room_id: Uuid, actor: Actor) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for envelopes relayed by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Envelope>(state.config.room_channel_capacity);

    let latest = match room::join_room(&state, room_id, connection_id, actor, client_tx).await {
        Ok(latest) => latest,
        Err(e) => {
            // Lost the race for the master seat after the pre-upgrade check.
            warn!(%room_id, error = %e, code = e.error_code(), "ws: join refused");
            if let Err(e) = socket.send(Message::Close(None)).await {
                debug!(error = %e, "ws: close after refused join failed");
            }
            return;
        }
    };

    info!(%room_id, %connection_id, participant_id = %actor.participant_id, "ws: client connected");

    let joined = match latest {
        Some(snapshot) => send_envelope(&mut socket, &Envelope::new(None, SyncMessage::SketchUpdate(snapshot))).await,
        None => Ok(()),
    };

    if joined.is_ok() {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(text) => {
                            if let Err(e) = process_inbound_text(&state, room_id, connection_id, &actor, &text).await {
                                warn!(
                                    %room_id,
                                    %connection_id,
                                    participant_id = %actor.participant_id,
                                    error = %e,
                                    code = e.error_code(),
                                    "ws: inbound message dropped"
                                );
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Some(envelope) = client_rx.recv() => {
                    if send_envelope(&mut socket, &envelope).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    room::part_room(&state, room_id, connection_id).await;
    info!(%room_id, %connection_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode one inbound text frame, stamp the sender, validate it against the
/// room, and relay it to the other clients.
///
/// Any `from` supplied by the client is overwritten.
async fn process_inbound_text(
    state: &AppState,
    room_id: Uuid,
    connection_id: Uuid,
    actor: &Actor,
    text: &str,
) -> Result<Envelope, InboundError> {
    let mut envelope = Envelope::decode(text)?;
    envelope.from = Some(*actor);

    room::relay(state, room_id, connection_id, actor, &envelope).await?;
    debug!(%room_id, %connection_id, kind = envelope.message.kind(), "ws: relay");
    Ok(envelope)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), ()> {
    let json = match envelope.encode() {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize envelope");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "ws: send failed");
    })
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
