//! Sync layer: wire messages, the transport seam, and the session that ties
//! the store to its peers.
//!
//! DESIGN
//! ======
//! Every local mutation follows one path: authorize, apply to the store,
//! then emit. Emission is fire-and-forget. While the connection is down the
//! mutation still applies locally; emission is skipped and a resync is
//! marked pending, which the next `Reconnected` (or an explicit `resync()`)
//! settles by pushing the state this client is responsible for.
//!
//! Inbound messages are re-validated against the sender's role, applied with
//! emission suppressed, and never logged, so undo only ever reverses local
//! actions.
//!
//! Wire format is JSON: `{"kind": "sketchUpdate" | "tokenUpdate", "payload": ...}`,
//! optionally with a relay-stamped `from` actor alongside.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authority::{Actor, AuthorityError, Mutation, authorize, authorize_token_update};
use crate::error::ErrorCode;
use crate::events::SketchEvent;
use crate::geometry::Bounds;
use crate::model::{
    AttachedRef, DrawingPath, ImageItem, ItemId, Participant, SketchSnapshot, SketchState, TokenItem,
    TooltipPlacement,
};
use crate::store::{SketchStore, StoreError};
use crate::surface::Point;

// =============================================================================
// WIRE
// =============================================================================

/// A message exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Full-state replace.
    SketchUpdate(SketchSnapshot),
    /// Live position of one token during a drag.
    TokenUpdate(TokenItem),
}

impl SyncMessage {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SketchUpdate(_) => "sketchUpdate",
            Self::TokenUpdate(_) => "tokenUpdate",
        }
    }
}

/// A message plus the actor that sent it.
///
/// `from` is stamped by the relay from the authenticated connection; clients
/// never set it. A message with no sender originates from the relay itself
/// (e.g. the latest state sent on join) and is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Actor>,
    #[serde(flatten)]
    pub message: SyncMessage,
}

impl Envelope {
    #[must_use]
    pub fn new(from: Option<Actor>, message: SyncMessage) -> Self {
        Self { from, message }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("send failed: {0}")]
    Send(String),
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "E_NOT_CONNECTED",
            Self::Encode(_) => "E_ENCODE",
            Self::Send(_) => "E_SEND",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

/// Outbound half of the peer connection, injected into the session.
pub trait Transport {
    /// Hand a message to the connection. Fire and forget.
    fn emit(&mut self, message: &SyncMessage) -> Result<(), TransportError>;
}

/// Transport that buffers messages for the host to drain and send.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: Vec<SyncMessage>,
}

impl OutboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything emitted since the last call.
    pub fn take_outgoing(&mut self) -> Vec<SyncMessage> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Transport for OutboundQueue {
    fn emit(&mut self, message: &SyncMessage) -> Result<(), TransportError> {
        self.pending.push(message.clone());
        Ok(())
    }
}

// =============================================================================
// CONNECTION LIFECYCLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Lifecycle notifications from the connection owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    Connected,
    Reconnecting,
    Reconnected,
    Disconnect,
}

impl ConnectionStatus {
    /// Next status for `event`, or `None` if the transition is invalid.
    #[must_use]
    pub fn next(self, event: ConnectionEvent) -> Option<Self> {
        match (self, event) {
            (Self::Disconnected, ConnectionEvent::Connect) => Some(Self::Connecting),
            (Self::Connecting | Self::Reconnecting, ConnectionEvent::Connected)
            | (Self::Reconnecting, ConnectionEvent::Reconnected) => Some(Self::Connected),
            (Self::Connecting | Self::Connected, ConnectionEvent::Reconnecting) => Some(Self::Reconnecting),
            (Self::Connecting | Self::Connected | Self::Reconnecting, ConnectionEvent::Disconnect) => {
                Some(Self::Disconnected)
            }
            _ => None,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Forbidden(#[from] AuthorityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(err) => err.error_code(),
            Self::Store(err) => err.error_code(),
        }
    }
}

/// One client's view of a shared sketch.
pub struct SketchSession<T: Transport> {
    store: SketchStore,
    actor: Actor,
    transport: T,
    status: ConnectionStatus,
    resync_pending: bool,
}

impl<T: Transport> SketchSession<T> {
    #[must_use]
    pub fn new(actor: Actor, transport: T) -> Self {
        Self::with_store(actor, SketchStore::new(), transport)
    }

    #[must_use]
    pub fn with_store(actor: Actor, store: SketchStore, transport: T) -> Self {
        Self { store, actor, transport, status: ConnectionStatus::Disconnected, resync_pending: false }
    }

    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn is_resync_pending(&self) -> bool {
        self.resync_pending
    }

    #[must_use]
    pub fn store(&self) -> &SketchStore {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> &SketchState {
        self.store.state()
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Check a mutation against the local actor without applying it.
    #[must_use]
    pub fn can(&self, mutation: &Mutation) -> bool {
        authorize(&self.actor, mutation, self.store.state()).is_ok()
    }

    // --- lifecycle ---

    /// Advance the connection state machine. Reconnecting, or connecting
    /// with unsent changes, triggers a resync.
    pub fn on_connection_event(&mut self, event: ConnectionEvent) {
        let Some(next) = self.status.next(event) else {
            debug!(status = ?self.status, ?event, "ignoring invalid connection transition");
            return;
        };
        info!(from = ?self.status, to = ?next, "connection status changed");
        self.status = next;

        let resync = match event {
            ConnectionEvent::Reconnected => true,
            ConnectionEvent::Connected => self.resync_pending,
            _ => false,
        };
        if resync {
            self.resync();
        }
    }

    /// Push the state this client is responsible for: the full sketch for
    /// the master, the positions of their own tokens for a player.
    pub fn resync(&mut self) {
        if self.status != ConnectionStatus::Connected {
            self.resync_pending = true;
            return;
        }
        self.resync_pending = false;
        if self.actor.is_master() {
            self.send(SyncMessage::SketchUpdate(self.store.snapshot()));
        } else {
            let own: Vec<TokenItem> = self.store.state().tokens_attached_to(self.actor.participant_id).cloned().collect();
            for token in own {
                self.send(SyncMessage::TokenUpdate(token));
            }
        }
    }

    fn send(&mut self, message: SyncMessage) {
        if self.status != ConnectionStatus::Connected {
            debug!(kind = message.kind(), "offline, emission deferred to resync");
            self.resync_pending = true;
            return;
        }
        if let Err(err) = self.transport.emit(&message) {
            warn!(kind = message.kind(), error = %err, code = err.error_code(), "emit failed");
            self.resync_pending = true;
        }
    }

    fn publish_state(&mut self) {
        self.send(SyncMessage::SketchUpdate(self.store.snapshot()));
    }

    fn authorize(&self, mutation: Mutation) -> Result<(), SessionError> {
        authorize(&self.actor, &mutation, self.store.state()).map_err(|err| {
            debug!(error = %err, "mutation refused");
            SessionError::Forbidden(err)
        })
    }

    /// Downgrade a store failure to a logged no-op for the caller.
    fn settle<R>(result: Result<R, StoreError>) -> Result<R, SessionError> {
        result.map_err(|err| {
            warn!(error = %err, code = err.error_code(), "store rejected mutation");
            SessionError::Store(err)
        })
    }

    // --- drawings ---

    pub fn add_drawing(&mut self, path: DrawingPath) -> Result<ItemId, SessionError> {
        self.authorize(Mutation::AddDrawing)?;
        let id = self.store.add_drawing(path);
        self.publish_state();
        Ok(id)
    }

    pub fn delete_drawing(&mut self, id: ItemId) -> Result<(), SessionError> {
        self.authorize(Mutation::DeleteDrawing(id))?;
        Self::settle(self.store.delete_drawing(id))?;
        self.publish_state();
        Ok(())
    }

    pub fn clear_drawings(&mut self) -> Result<(), SessionError> {
        self.authorize(Mutation::ClearDrawings)?;
        self.store.clear_drawings();
        self.publish_state();
        Ok(())
    }

    // --- images ---

    pub fn add_image(&mut self, url: impl Into<String>) -> Result<ItemId, SessionError> {
        self.authorize(Mutation::AddImage)?;
        let id = self.store.add_image(url);
        self.publish_state();
        Ok(id)
    }

    /// Record an image's natural size. Every client derives the same height
    /// from the image itself, so only the master broadcasts the result.
    pub fn resolve_image_height(
        &mut self,
        id: ItemId,
        natural_width: f64,
        natural_height: f64,
    ) -> Result<f64, SessionError> {
        let already = self.store.state().image(id).and_then(|i| i.height);
        let height = Self::settle(self.store.resolve_image_height(id, natural_width, natural_height))?;
        if already.is_none() && self.actor.is_master() {
            self.publish_state();
        }
        Ok(height)
    }

    /// Live geometry during a drag or resize. Local only.
    pub fn preview_image(&mut self, id: ItemId, bounds: Bounds) -> Result<(), SessionError> {
        self.authorize(Mutation::MoveImage(id))?;
        Self::settle(self.store.preview_image(id, bounds))
    }

    pub fn move_image(&mut self, image: ImageItem, previous: ImageItem) -> Result<(), SessionError> {
        self.authorize(Mutation::MoveImage(image.id))?;
        Self::settle(self.store.move_image(image, previous))?;
        self.publish_state();
        Ok(())
    }

    pub fn resize_image(&mut self, image: ImageItem, previous: ImageItem) -> Result<(), SessionError> {
        self.authorize(Mutation::ResizeImage(image.id))?;
        Self::settle(self.store.resize_image(image, previous))?;
        self.publish_state();
        Ok(())
    }

    pub fn delete_image(&mut self, id: ItemId) -> Result<(), SessionError> {
        self.authorize(Mutation::DeleteImage(id))?;
        Self::settle(self.store.delete_image(id))?;
        self.publish_state();
        Ok(())
    }

    /// Returns whether the image moved; nothing is emitted at the top.
    pub fn forward_image(&mut self, id: ItemId) -> Result<bool, SessionError> {
        self.authorize(Mutation::ReorderImage(id))?;
        let moved = Self::settle(self.store.forward_image(id))?;
        if moved {
            self.publish_state();
        }
        Ok(moved)
    }

    pub fn backward_image(&mut self, id: ItemId) -> Result<bool, SessionError> {
        self.authorize(Mutation::ReorderImage(id))?;
        let moved = Self::settle(self.store.backward_image(id))?;
        if moved {
            self.publish_state();
        }
        Ok(moved)
    }

    // --- tokens ---

    pub fn add_token(&mut self) -> Result<ItemId, SessionError> {
        self.authorize(Mutation::AddToken)?;
        let id = self.store.add_token();
        self.publish_state();
        Ok(id)
    }

    pub fn add_user_tokens(&mut self, participants: &[Participant]) -> Result<Vec<ItemId>, SessionError> {
        self.authorize(Mutation::AddUserTokens)?;
        let ids = self.store.add_user_tokens(participants);
        if !ids.is_empty() {
            self.publish_state();
        }
        Ok(ids)
    }

    /// Intermediate drag position: applied locally and streamed as a
    /// `tokenUpdate`. Not logged; the release commits via [`move_token`](Self::move_token).
    pub fn drag_token(&mut self, id: ItemId, at: Point) -> Result<(), SessionError> {
        self.authorize(Mutation::MoveToken(id))?;
        Self::settle(self.store.preview_token(id, at))?;
        if let Some(token) = self.store.state().token(id).cloned() {
            self.send(SyncMessage::TokenUpdate(token));
        }
        Ok(())
    }

    pub fn move_token(&mut self, token: TokenItem, previous: TokenItem) -> Result<(), SessionError> {
        self.authorize(Mutation::MoveToken(token.id))?;
        Self::settle(self.store.move_token(token, previous))?;
        self.publish_state();
        Ok(())
    }

    pub fn attach_token(&mut self, id: ItemId, attached: AttachedRef) -> Result<(), SessionError> {
        self.authorize(Mutation::AttachToken(id))?;
        Self::settle(self.store.attach_token(id, attached))?;
        self.publish_state();
        Ok(())
    }

    pub fn unattach_token(&mut self, id: ItemId) -> Result<(), SessionError> {
        self.authorize(Mutation::AttachToken(id))?;
        Self::settle(self.store.unattach_token(id))?;
        self.publish_state();
        Ok(())
    }

    pub fn duplicate_token(&mut self, id: ItemId) -> Result<ItemId, SessionError> {
        self.authorize(Mutation::DuplicateToken(id))?;
        let new_id = Self::settle(self.store.duplicate_token(id))?;
        self.publish_state();
        Ok(new_id)
    }

    pub fn change_token_color(&mut self, id: ItemId, color: impl Into<String>) -> Result<(), SessionError> {
        self.authorize(Mutation::ChangeTokenColor(id))?;
        Self::settle(self.store.change_token_color(id, color))?;
        self.publish_state();
        Ok(())
    }

    pub fn set_token_tooltip(&mut self, id: ItemId, placement: TooltipPlacement) -> Result<(), SessionError> {
        self.authorize(Mutation::SetTokenTooltip(id))?;
        Self::settle(self.store.set_token_tooltip(id, placement))?;
        self.publish_state();
        Ok(())
    }

    pub fn delete_token(&mut self, id: ItemId) -> Result<(), SessionError> {
        self.authorize(Mutation::DeleteToken(id))?;
        Self::settle(self.store.delete_token(id))?;
        self.publish_state();
        Ok(())
    }

    pub fn clear_tokens(&mut self) -> Result<(), SessionError> {
        self.authorize(Mutation::ClearTokens)?;
        self.store.clear_tokens();
        self.publish_state();
        Ok(())
    }

    // --- whole sketch ---

    pub fn clear_sketch(&mut self) -> Result<(), SessionError> {
        self.authorize(Mutation::ClearSketch)?;
        self.store.clear_sketch();
        self.publish_state();
        Ok(())
    }

    pub fn set_displayed(&mut self, displayed: bool) -> Result<(), SessionError> {
        self.authorize(Mutation::SetDisplayed)?;
        self.store.set_displayed(displayed);
        self.publish_state();
        Ok(())
    }

    /// Reverse the most recent local mutation and publish the result.
    pub fn undo(&mut self) -> Result<Option<SketchEvent>, SessionError> {
        self.authorize(Mutation::Undo)?;
        let reverted = Self::settle(self.store.undo())?;
        if reverted.is_some() {
            self.publish_state();
        }
        Ok(reverted)
    }

    // --- inbound ---

    /// Apply a message from a peer. Nothing is emitted or logged.
    pub fn receive(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        let Envelope { from, message } = envelope;
        debug!(kind = message.kind(), from = ?from.map(|a| a.participant_id), "inbound");
        match message {
            SyncMessage::SketchUpdate(snapshot) => match from {
                Some(sender) if !sender.is_master() => self.merge_player_snapshot(&sender, &snapshot),
                _ => {
                    self.store.replace_from_remote(snapshot);
                    Ok(())
                }
            },
            SyncMessage::TokenUpdate(token) => {
                if let Some(sender) = from {
                    authorize_token_update(&sender, self.store.state().token(token.id), &token).map_err(|err| {
                        warn!(error = %err, "dropping unauthorized tokenUpdate");
                        SessionError::Forbidden(err)
                    })?;
                }
                Self::settle(self.store.apply_remote_token(token))
            }
        }
    }

    /// A player's full state can only move that player's own tokens, so
    /// only those positions are taken from it.
    fn merge_player_snapshot(&mut self, sender: &Actor, snapshot: &SketchSnapshot) -> Result<(), SessionError> {
        for incoming in snapshot.tokens.iter().filter(|t| t.is_attached_to(sender.participant_id)) {
            let current = self.store.state().token(incoming.id);
            if authorize_token_update(sender, current, incoming).is_err() {
                warn!(participant_id = %sender.participant_id, token_id = %incoming.id, "ignoring foreign token change");
                continue;
            }
            Self::settle(self.store.preview_token(incoming.id, incoming.origin()))?;
        }
        Ok(())
    }
}
