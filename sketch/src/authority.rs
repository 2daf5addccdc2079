//! Who may change what.
//!
//! The master may perform any mutation. A player may only move tokens
//! attached to them, and undo such a move. The same rules run on the
//! initiating client before anything is emitted and again on every receiver,
//! including the relay, which checks full-state updates against its own
//! authoritative snapshot.

#[cfg(test)]
#[path = "authority_test.rs"]
mod authority_test;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::events::SketchEvent;
use crate::model::{ItemId, SketchSnapshot, SketchState, TokenItem};

/// Connection role, fixed when the connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Player,
}

/// The participant behind a local session or an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub participant_id: ItemId,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn master(participant_id: ItemId) -> Self {
        Self { participant_id, role: Role::Master }
    }

    #[must_use]
    pub fn player(participant_id: ItemId) -> Self {
        Self { participant_id, role: Role::Player }
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }
}

/// A mutation an actor is about to perform, named by its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    AddDrawing,
    DeleteDrawing(ItemId),
    ClearDrawings,
    AddImage,
    MoveImage(ItemId),
    ResizeImage(ItemId),
    DeleteImage(ItemId),
    ReorderImage(ItemId),
    AddToken,
    AddUserTokens,
    MoveToken(ItemId),
    AttachToken(ItemId),
    DuplicateToken(ItemId),
    ChangeTokenColor(ItemId),
    SetTokenTooltip(ItemId),
    DeleteToken(ItemId),
    ClearTokens,
    ClearSketch,
    SetDisplayed,
    Undo,
}

impl Mutation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddDrawing => "addDrawing",
            Self::DeleteDrawing(_) => "deleteDrawing",
            Self::ClearDrawings => "clearDrawings",
            Self::AddImage => "addImage",
            Self::MoveImage(_) => "moveImage",
            Self::ResizeImage(_) => "resizeImage",
            Self::DeleteImage(_) => "deleteImage",
            Self::ReorderImage(_) => "reorderImage",
            Self::AddToken => "addToken",
            Self::AddUserTokens => "addUserTokens",
            Self::MoveToken(_) => "moveToken",
            Self::AttachToken(_) => "attachToken",
            Self::DuplicateToken(_) => "duplicateToken",
            Self::ChangeTokenColor(_) => "changeTokenColor",
            Self::SetTokenTooltip(_) => "setTokenTooltip",
            Self::DeleteToken(_) => "deleteToken",
            Self::ClearTokens => "clearTokens",
            Self::ClearSketch => "clearSketch",
            Self::SetDisplayed => "setDisplayed",
            Self::Undo => "undo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    #[error("participant {participant_id} may not {action}")]
    Forbidden { participant_id: ItemId, action: &'static str },
}

impl ErrorCode for AuthorityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "E_FORBIDDEN",
        }
    }
}

fn forbidden(actor: &Actor, action: &'static str) -> AuthorityError {
    AuthorityError::Forbidden { participant_id: actor.participant_id, action }
}

/// Check a local mutation against the current state.
pub fn authorize(actor: &Actor, mutation: &Mutation, state: &SketchState) -> Result<(), AuthorityError> {
    if actor.is_master() {
        return Ok(());
    }
    let allowed = match mutation {
        Mutation::MoveToken(id) => state.token(*id).is_some_and(|t| t.is_attached_to(actor.participant_id)),
        Mutation::Undo => matches!(
            state.events.last(),
            Some(SketchEvent::TokenMove { previous }) if previous.is_attached_to(actor.participant_id)
        ),
        _ => false,
    };
    if allowed { Ok(()) } else { Err(forbidden(actor, mutation.name())) }
}

/// Check an inbound `tokenUpdate` against the receiver's copy of the token.
///
/// A player's update must target a token attached to them and may only
/// change its position.
pub fn authorize_token_update(
    actor: &Actor,
    current: Option<&TokenItem>,
    incoming: &TokenItem,
) -> Result<(), AuthorityError> {
    if actor.is_master() {
        return Ok(());
    }
    let Some(current) = current else {
        return Err(forbidden(actor, "tokenUpdate"));
    };
    if current.is_attached_to(actor.participant_id) && only_position_changed(current, incoming) {
        Ok(())
    } else {
        Err(forbidden(actor, "tokenUpdate"))
    }
}

/// Check a full-state update against the previous authoritative snapshot.
///
/// Anything goes for the master. From a player the only accepted
/// differences are position changes of tokens attached to that player.
pub fn validate_snapshot_change(
    actor: &Actor,
    previous: &SketchSnapshot,
    next: &SketchSnapshot,
) -> Result<(), AuthorityError> {
    if actor.is_master() {
        return Ok(());
    }
    let structure_unchanged = previous.displayed == next.displayed
        && previous.paths == next.paths
        && previous.images == next.images
        && previous.tokens.len() == next.tokens.len();
    if !structure_unchanged {
        return Err(forbidden(actor, "sketchUpdate"));
    }

    let tokens_ok = previous.tokens.iter().zip(&next.tokens).all(|(before, after)| {
        before == after
            || (before.is_attached_to(actor.participant_id) && only_position_changed(before, after))
    });
    if tokens_ok { Ok(()) } else { Err(forbidden(actor, "sketchUpdate")) }
}

/// Same token, same everything except `x`/`y` (and the derived `index`).
fn only_position_changed(before: &TokenItem, after: &TokenItem) -> bool {
    before.id == after.id
        && before.color == after.color
        && before.attached_data == after.attached_data
        && before.tooltip_placement == after.tooltip_placement
}
