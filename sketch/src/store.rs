//! Sketch state store: the only place `SketchState` is mutated.
//!
//! DESIGN
//! ======
//! Each logged operation validates its target, applies the change in place,
//! and appends one [`SketchEvent`] holding an owned copy of whatever undo
//! needs. Because events own their data, mutating the live vectors can never
//! invalidate history. Broadcasting is left to the caller.
//!
//! Index maintenance is a post-condition: every structural change ends in
//! `SketchState::reindex`, and tests assert `indices_consistent` after each
//! operation.
//!
//! Non-logged operations cover cosmetic state (display flag, token color,
//! tooltip, attachment), live drag previews that a later `move_*` commits,
//! and inbound remote state.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use tracing::debug;
use uuid::Uuid;

use crate::consts::{
    DEFAULT_IMAGE_POSITION, DEFAULT_IMAGE_WIDTH, DEFAULT_TOKEN_POSITION, DUPLICATE_TOKEN_OFFSET, SURFACE_HEIGHT,
    SURFACE_WIDTH, TOKEN_SIZE, USER_TOKEN_SPACING,
};
use crate::error::ErrorCode;
use crate::events::{EventCategory, EventLog, SketchEvent};
use crate::geometry::{Bounds, bring_forward, pick_next_color, send_backward};
use crate::model::{
    AttachedRef, DrawingPath, ImageItem, ItemId, Participant, SketchSnapshot, SketchState, TokenItem, TooltipPlacement,
};
use crate::surface::Point;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("drawing not found: {0}")]
    DrawingNotFound(ItemId),
    #[error("image not found: {0}")]
    ImageNotFound(ItemId),
    #[error("token not found: {0}")]
    TokenNotFound(ItemId),
    #[error("image height not resolved: {0}")]
    ImageHeightUnknown(ItemId),
    #[error("invalid natural size {width}x{height} for image {id}")]
    InvalidNaturalSize { id: ItemId, width: f64, height: f64 },
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DrawingNotFound(_) => "E_DRAWING_NOT_FOUND",
            Self::ImageNotFound(_) => "E_IMAGE_NOT_FOUND",
            Self::TokenNotFound(_) => "E_TOKEN_NOT_FOUND",
            Self::ImageHeightUnknown(_) => "E_IMAGE_HEIGHT_UNKNOWN",
            Self::InvalidNaturalSize { .. } => "E_INVALID_NATURAL_SIZE",
        }
    }
}

/// Owner of one [`SketchState`] and its undo log.
#[derive(Debug, Clone, Default)]
pub struct SketchStore {
    state: SketchState,
}

impl SketchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a persisted or received snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: SketchSnapshot) -> Self {
        Self { state: SketchState::from_snapshot(snapshot) }
    }

    #[must_use]
    pub fn state(&self) -> &SketchState {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> SketchSnapshot {
        self.state.snapshot()
    }

    /// Read-only view of the undo log.
    #[must_use]
    pub fn events(&self) -> &[SketchEvent] {
        &self.state.events
    }

    fn log(&mut self) -> EventLog<'_> {
        EventLog::new(&mut self.state.events)
    }

    fn image_position(&self, id: ItemId) -> Result<usize, StoreError> {
        self.state.images.iter().position(|i| i.id == id).ok_or(StoreError::ImageNotFound(id))
    }

    fn token_position(&self, id: ItemId) -> Result<usize, StoreError> {
        self.state.tokens.iter().position(|t| t.id == id).ok_or(StoreError::TokenNotFound(id))
    }

    fn path_position(&self, id: ItemId) -> Result<usize, StoreError> {
        self.state.paths.iter().position(|p| p.id == id).ok_or(StoreError::DrawingNotFound(id))
    }

    // =========================================================================
    // DRAWINGS
    // =========================================================================

    /// Append a committed stroke.
    pub fn add_drawing(&mut self, path: DrawingPath) -> ItemId {
        let id = path.id;
        self.state.paths.push(path.clone());
        self.log().append(SketchEvent::DrawAdd { path });
        id
    }

    pub fn delete_drawing(&mut self, id: ItemId) -> Result<DrawingPath, StoreError> {
        let index = self.path_position(id)?;
        let path = self.state.paths.remove(index);
        self.log().append(SketchEvent::DrawDelete { path: path.clone(), index });
        Ok(path)
    }

    /// Remove every stroke. Drawing history is dropped, so this is final.
    pub fn clear_drawings(&mut self) {
        self.state.paths.clear();
        self.log().prune(EventCategory::Drawing);
    }

    // =========================================================================
    // IMAGES
    // =========================================================================

    /// Place a new image on top of the stack at the default position.
    ///
    /// Height stays unknown until [`resolve_image_height`](Self::resolve_image_height).
    pub fn add_image(&mut self, url: impl Into<String>) -> ItemId {
        let (x, y) = DEFAULT_IMAGE_POSITION;
        let image = ImageItem {
            id: Uuid::new_v4(),
            index: self.state.images.len(),
            url: url.into(),
            x,
            y,
            width: DEFAULT_IMAGE_WIDTH,
            height: None,
        };
        let id = image.id;
        self.state.images.push(image.clone());
        self.log().append(SketchEvent::ImageAdd { image });
        id
    }

    /// Fix an image's height from its natural size. Only the first call has
    /// an effect; later calls return the height already stored.
    pub fn resolve_image_height(
        &mut self,
        id: ItemId,
        natural_width: f64,
        natural_height: f64,
    ) -> Result<f64, StoreError> {
        let pos = self.image_position(id)?;
        if let Some(height) = self.state.images[pos].height {
            return Ok(height);
        }
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return Err(StoreError::InvalidNaturalSize { id, width: natural_width, height: natural_height });
        }
        let image = &mut self.state.images[pos];
        let height = image.width * natural_height / natural_width;
        image.height = Some(height);
        Ok(height)
    }

    /// Commit a move. `image` is the final geometry, `previous` the item as
    /// it was when the drag started.
    pub fn move_image(&mut self, image: ImageItem, previous: ImageItem) -> Result<(), StoreError> {
        self.replace_image(image)?;
        self.log().append(SketchEvent::ImageMove { previous });
        Ok(())
    }

    /// Commit a resize. Same contract as [`move_image`](Self::move_image).
    pub fn resize_image(&mut self, image: ImageItem, previous: ImageItem) -> Result<(), StoreError> {
        self.replace_image(image)?;
        self.log().append(SketchEvent::ImageResize { previous });
        Ok(())
    }

    fn replace_image(&mut self, mut image: ImageItem) -> Result<(), StoreError> {
        let pos = self.image_position(image.id)?;
        image.index = pos;
        self.state.images[pos] = image;
        Ok(())
    }

    /// Live geometry while a drag or resize is in progress. Not logged.
    pub fn preview_image(&mut self, id: ItemId, bounds: Bounds) -> Result<(), StoreError> {
        let pos = self.image_position(id)?;
        let image = &mut self.state.images[pos];
        image.x = bounds.x;
        image.y = bounds.y;
        image.width = bounds.width;
        if image.height.is_some() {
            image.height = Some(bounds.height);
        }
        Ok(())
    }

    pub fn delete_image(&mut self, id: ItemId) -> Result<ImageItem, StoreError> {
        let index = self.image_position(id)?;
        let image = self.state.images.remove(index);
        self.state.reindex();
        self.log().append(SketchEvent::ImageDelete { image: image.clone(), index });
        Ok(image)
    }

    /// Swap an image with the one above it. `Ok(false)` when already on top.
    pub fn forward_image(&mut self, id: ItemId) -> Result<bool, StoreError> {
        let pos = self.image_position(id)?;
        if pos + 1 >= self.state.images.len() {
            return Ok(false);
        }
        self.state.images = bring_forward(std::mem::take(&mut self.state.images), pos);
        self.state.reindex();
        self.log().append(SketchEvent::ImageForward { id });
        Ok(true)
    }

    /// Swap an image with the one below it. `Ok(false)` when already at the bottom.
    pub fn backward_image(&mut self, id: ItemId) -> Result<bool, StoreError> {
        let pos = self.image_position(id)?;
        if pos == 0 {
            return Ok(false);
        }
        self.state.images = send_backward(std::mem::take(&mut self.state.images), pos);
        self.state.reindex();
        self.log().append(SketchEvent::ImageBackward { id });
        Ok(true)
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// Add an unattached token at the default position with the next palette color.
    pub fn add_token(&mut self) -> ItemId {
        let (x, y) = DEFAULT_TOKEN_POSITION;
        self.push_token(None, Point::new(x, y))
    }

    /// Add one attached token per participant that does not already have one.
    ///
    /// New tokens are laid out in rows from the default token position.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn add_user_tokens(&mut self, participants: &[Participant]) -> Vec<ItemId> {
        let (start_x, start_y) = DEFAULT_TOKEN_POSITION;
        let per_row = (((SURFACE_WIDTH - start_x - TOKEN_SIZE) / USER_TOKEN_SPACING).floor() as usize + 1).max(1);

        let pending: Vec<&Participant> = participants
            .iter()
            .filter(|p| self.state.tokens_attached_to(p.id).next().is_none())
            .collect();

        let mut ids = Vec::with_capacity(pending.len());
        for (slot, participant) in pending.into_iter().enumerate() {
            let column = (slot % per_row) as f64;
            let row = (slot / per_row) as f64;
            let at = Point::new(start_x + column * USER_TOKEN_SPACING, start_y + row * USER_TOKEN_SPACING);
            ids.push(self.push_token(Some(AttachedRef::for_participant(participant)), at));
        }
        ids
    }

    fn push_token(&mut self, attached_data: Option<AttachedRef>, at: Point) -> ItemId {
        let token = TokenItem {
            id: Uuid::new_v4(),
            index: self.state.tokens.len(),
            color: pick_next_color(&self.state.tokens).to_string(),
            attached_data,
            x: at.x,
            y: at.y,
            tooltip_placement: TooltipPlacement::default(),
        };
        let id = token.id;
        self.state.tokens.push(token.clone());
        self.log().append(SketchEvent::TokenAdd { token });
        id
    }

    /// Commit a token move. `previous` is the token before the drag.
    pub fn move_token(&mut self, token: TokenItem, previous: TokenItem) -> Result<(), StoreError> {
        self.replace_token(token)?;
        self.log().append(SketchEvent::TokenMove { previous });
        Ok(())
    }

    /// Live token position while dragging. Not logged.
    pub fn preview_token(&mut self, id: ItemId, at: Point) -> Result<(), StoreError> {
        let pos = self.token_position(id)?;
        let token = &mut self.state.tokens[pos];
        token.x = at.x;
        token.y = at.y;
        Ok(())
    }

    pub fn attach_token(&mut self, id: ItemId, attached: AttachedRef) -> Result<(), StoreError> {
        let pos = self.token_position(id)?;
        self.state.tokens[pos].attached_data = Some(attached);
        Ok(())
    }

    pub fn unattach_token(&mut self, id: ItemId) -> Result<(), StoreError> {
        let pos = self.token_position(id)?;
        self.state.tokens[pos].attached_data = None;
        Ok(())
    }

    /// Copy a token's color and tooltip into a new unattached token, offset
    /// down and right when that stays on the surface.
    pub fn duplicate_token(&mut self, id: ItemId) -> Result<ItemId, StoreError> {
        let pos = self.token_position(id)?;
        let source = &self.state.tokens[pos];

        let shifted = Point::new(source.x + DUPLICATE_TOKEN_OFFSET, source.y + DUPLICATE_TOKEN_OFFSET);
        let fits = shifted.x + TOKEN_SIZE <= SURFACE_WIDTH && shifted.y + TOKEN_SIZE <= SURFACE_HEIGHT;
        let at = if fits { shifted } else { source.origin() };

        let token = TokenItem {
            id: Uuid::new_v4(),
            index: self.state.tokens.len(),
            color: source.color.clone(),
            attached_data: None,
            x: at.x,
            y: at.y,
            tooltip_placement: source.tooltip_placement,
        };
        let new_id = token.id;
        self.state.tokens.push(token.clone());
        self.log().append(SketchEvent::TokenAdd { token });
        Ok(new_id)
    }

    pub fn change_token_color(&mut self, id: ItemId, color: impl Into<String>) -> Result<(), StoreError> {
        let pos = self.token_position(id)?;
        self.state.tokens[pos].color = color.into();
        Ok(())
    }

    pub fn set_token_tooltip(&mut self, id: ItemId, placement: TooltipPlacement) -> Result<(), StoreError> {
        let pos = self.token_position(id)?;
        self.state.tokens[pos].tooltip_placement = placement;
        Ok(())
    }

    pub fn delete_token(&mut self, id: ItemId) -> Result<TokenItem, StoreError> {
        let index = self.token_position(id)?;
        let token = self.state.tokens.remove(index);
        self.state.reindex();
        self.log().append(SketchEvent::TokenDelete { token: token.clone(), index });
        Ok(token)
    }

    /// Remove every token. Token history is dropped, so this is final.
    pub fn clear_tokens(&mut self) {
        self.state.tokens.clear();
        self.log().prune(EventCategory::Token);
    }

    fn replace_token(&mut self, mut token: TokenItem) -> Result<(), StoreError> {
        let pos = self.token_position(token.id)?;
        token.index = pos;
        self.state.tokens[pos] = token;
        Ok(())
    }

    // =========================================================================
    // WHOLE SKETCH
    // =========================================================================

    /// Remove all paths, images and tokens and empty the log. The display
    /// flag is left alone.
    pub fn clear_sketch(&mut self) {
        self.state.paths.clear();
        self.state.images.clear();
        self.state.tokens.clear();
        self.log().clear();
    }

    pub fn set_displayed(&mut self, displayed: bool) {
        self.state.displayed = displayed;
    }

    /// Adopt a full remote state. The local undo log is kept; entries whose
    /// targets no longer exist fail harmlessly on undo.
    pub fn replace_from_remote(&mut self, snapshot: SketchSnapshot) {
        let events = std::mem::take(&mut self.state.events);
        self.state = SketchState::from_snapshot(snapshot);
        self.state.events = events;
    }

    /// Adopt a remote token's fields, keeping its local position in the vector.
    pub fn apply_remote_token(&mut self, token: TokenItem) -> Result<(), StoreError> {
        self.replace_token(token)
    }

    // =========================================================================
    // UNDO
    // =========================================================================

    /// Reverse the most recent logged mutation.
    ///
    /// Returns the reversed event, or `Ok(None)` when the log is empty. If the
    /// event's target has vanished the event is still consumed and the
    /// not-found error is returned.
    pub fn undo(&mut self) -> Result<Option<SketchEvent>, StoreError> {
        let Some(event) = self.log().pop_last() else {
            return Ok(None);
        };
        debug!(kind = event.kind(), remaining = self.state.events.len(), "undo");
        self.revert(&event)?;
        Ok(Some(event))
    }

    fn revert(&mut self, event: &SketchEvent) -> Result<(), StoreError> {
        match event {
            SketchEvent::DrawAdd { path } => {
                let pos = self.path_position(path.id)?;
                self.state.paths.remove(pos);
            }
            SketchEvent::DrawDelete { path, index } => {
                let at = (*index).min(self.state.paths.len());
                self.state.paths.insert(at, path.clone());
            }
            SketchEvent::ImageAdd { image } => {
                let pos = self.image_position(image.id)?;
                self.state.images.remove(pos);
                self.state.reindex();
            }
            SketchEvent::ImageMove { previous } | SketchEvent::ImageResize { previous } => {
                self.replace_image(previous.clone())?;
            }
            SketchEvent::ImageDelete { image, index } => {
                let at = (*index).min(self.state.images.len());
                self.state.images.insert(at, image.clone());
                self.state.reindex();
            }
            SketchEvent::ImageForward { id } => {
                let pos = self.image_position(*id)?;
                self.state.images = send_backward(std::mem::take(&mut self.state.images), pos);
                self.state.reindex();
            }
            SketchEvent::ImageBackward { id } => {
                let pos = self.image_position(*id)?;
                self.state.images = bring_forward(std::mem::take(&mut self.state.images), pos);
                self.state.reindex();
            }
            SketchEvent::TokenAdd { token } => {
                let pos = self.token_position(token.id)?;
                self.state.tokens.remove(pos);
                self.state.reindex();
            }
            SketchEvent::TokenMove { previous } => {
                self.replace_token(previous.clone())?;
            }
            SketchEvent::TokenDelete { token, index } => {
                let at = (*index).min(self.state.tokens.len());
                self.state.tokens.insert(at, token.clone());
                self.state.reindex();
            }
        }
        Ok(())
    }
}
