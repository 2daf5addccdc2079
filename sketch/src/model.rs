//! Sketch data model: paths, images, tokens, and the state that owns them.
//!
//! These types are the JSON wire shape as well as the in-memory shape. Field
//! names serialize in camelCase so a [`SketchSnapshot`] produced here is the
//! exact `sketchUpdate` payload peers and the persistence layer expect.

#[cfg(test)]
#[path = "model_test.rs"]
mod model_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::SketchEvent;
use crate::geometry::Bounds;
use crate::surface::Point;

/// Unique identifier for a path, image, token, participant or sketch.
pub type ItemId = Uuid;

/// A committed free-hand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingPath {
    pub id: ItemId,
    /// SVG path data, `"M x y L x y ..."`.
    pub stroke_data: String,
    pub color: String,
    pub width: f64,
}

impl DrawingPath {
    #[must_use]
    pub fn new(stroke_data: impl Into<String>, color: impl Into<String>, width: f64) -> Self {
        Self { id: Uuid::new_v4(), stroke_data: stroke_data.into(), color: color.into(), width }
    }
}

/// A placed image. Later images paint above earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: ItemId,
    /// Position in `SketchState::images`; kept equal to the vector index.
    pub index: usize,
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    /// Unknown until the natural aspect ratio has been reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl ImageItem {
    /// Bounds of the image, or `None` while its height is unresolved.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.height.map(|height| Bounds::new(self.x, self.y, self.width, height))
    }

    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Which side of a token its name tooltip is shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipPlacement {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

/// Weak link from a token to a participant and, optionally, their character.
///
/// Only ids and cached display names are held; the participant may leave or
/// rename without the token noticing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedRef {
    pub user_id: ItemId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

impl AttachedRef {
    /// Build the attachment for a session participant.
    #[must_use]
    pub fn for_participant(participant: &Participant) -> Self {
        Self {
            user_id: participant.id,
            user_name: participant.name.clone(),
            character_id: participant.character.as_ref().map(|c| c.id),
            character_name: participant.character.as_ref().map(|c| c.name.clone()),
        }
    }
}

/// A movable marker on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenItem {
    pub id: ItemId,
    /// Position in `SketchState::tokens`; kept equal to the vector index.
    pub index: usize,
    pub color: String,
    #[serde(default)]
    pub attached_data: Option<AttachedRef>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub tooltip_placement: TooltipPlacement,
}

impl TokenItem {
    /// Whether this token is attached to `participant_id`.
    #[must_use]
    pub fn is_attached_to(&self, participant_id: ItemId) -> bool {
        self.attached_data.as_ref().is_some_and(|a| a.user_id == participant_id)
    }

    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A participant's character, as reported by session membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRef {
    pub id: ItemId,
    pub name: String,
}

/// A session participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub character: Option<CharacterRef>,
}

/// Live state of one sketch, including its local undo log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchState {
    pub displayed: bool,
    pub paths: Vec<DrawingPath>,
    pub images: Vec<ImageItem>,
    pub tokens: Vec<TokenItem>,
    #[serde(skip)]
    pub events: Vec<SketchEvent>,
}

impl SketchState {
    /// Rebuild live state from a snapshot. The log starts empty.
    #[must_use]
    pub fn from_snapshot(snapshot: SketchSnapshot) -> Self {
        let SketchSnapshot { displayed, paths, images, tokens } = snapshot;
        let mut state = Self { displayed, paths, images, tokens, events: Vec::new() };
        state.reindex();
        state
    }

    /// Copy of the shareable part of the state.
    #[must_use]
    pub fn snapshot(&self) -> SketchSnapshot {
        SketchSnapshot {
            displayed: self.displayed,
            paths: self.paths.clone(),
            images: self.images.clone(),
            tokens: self.tokens.clone(),
        }
    }

    /// `images[i].index == i` and `tokens[i].index == i` for every `i`.
    #[must_use]
    pub fn indices_consistent(&self) -> bool {
        self.images.iter().enumerate().all(|(i, image)| image.index == i)
            && self.tokens.iter().enumerate().all(|(i, token)| token.index == i)
    }

    /// Rewrite every `index` field from vector position.
    pub fn reindex(&mut self) {
        for (i, image) in self.images.iter_mut().enumerate() {
            image.index = i;
        }
        for (i, token) in self.tokens.iter_mut().enumerate() {
            token.index = i;
        }
    }

    #[must_use]
    pub fn image(&self, id: ItemId) -> Option<&ImageItem> {
        self.images.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn token(&self, id: ItemId) -> Option<&TokenItem> {
        self.tokens.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn path(&self, id: ItemId) -> Option<&DrawingPath> {
        self.paths.iter().find(|p| p.id == id)
    }

    /// Tokens attached to `participant_id`, in creation order.
    pub fn tokens_attached_to(&self, participant_id: ItemId) -> impl Iterator<Item = &TokenItem> {
        self.tokens.iter().filter(move |t| t.is_attached_to(participant_id))
    }
}

/// Shareable sketch state: everything except the undo log.
///
/// This is the `sketchUpdate` payload and the persisted `data` of a
/// [`UserSketch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchSnapshot {
    #[serde(default)]
    pub displayed: bool,
    #[serde(default)]
    pub paths: Vec<DrawingPath>,
    #[serde(default)]
    pub images: Vec<ImageItem>,
    #[serde(default)]
    pub tokens: Vec<TokenItem>,
}

/// A named snapshot saved by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSketch {
    pub id: ItemId,
    pub user_id: ItemId,
    pub name: String,
    pub data: SketchSnapshot,
}
