//! Undo log: one reversible record per logged mutation.
//!
//! DESIGN
//! ======
//! Every logged store operation appends exactly one [`SketchEvent`] carrying
//! the data needed to reverse it. Undo is strictly LIFO over the one
//! interleaved log, regardless of category. Bulk clears prune the categories
//! they remove so undo can never bring a cleared item back.
//!
//! The log is local. It is skipped when state is serialized and never
//! travels to peers or to storage.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use serde::{Deserialize, Serialize};

use crate::model::{DrawingPath, ImageItem, ItemId, TokenItem};

/// Which part of the sketch an event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Drawing,
    Image,
    Token,
}

/// A reversible mutation record.
///
/// `*Move`/`*Resize` carry the item as it was before the mutation. `*Delete`
/// carry the removed item and its vector position. `ImageForward` and
/// `ImageBackward` carry only the id, since the inverse swap is recomputed
/// from the item's current position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SketchEvent {
    DrawAdd { path: DrawingPath },
    DrawDelete { path: DrawingPath, index: usize },
    ImageAdd { image: ImageItem },
    ImageMove { previous: ImageItem },
    ImageResize { previous: ImageItem },
    ImageDelete { image: ImageItem, index: usize },
    ImageForward { id: ItemId },
    ImageBackward { id: ItemId },
    TokenAdd { token: TokenItem },
    TokenMove { previous: TokenItem },
    TokenDelete { token: TokenItem, index: usize },
}

impl SketchEvent {
    #[must_use]
    pub fn category(&self) -> EventCategory {
        match self {
            Self::DrawAdd { .. } | Self::DrawDelete { .. } => EventCategory::Drawing,
            Self::ImageAdd { .. }
            | Self::ImageMove { .. }
            | Self::ImageResize { .. }
            | Self::ImageDelete { .. }
            | Self::ImageForward { .. }
            | Self::ImageBackward { .. } => EventCategory::Image,
            Self::TokenAdd { .. } | Self::TokenMove { .. } | Self::TokenDelete { .. } => EventCategory::Token,
        }
    }

    /// Wire tag, e.g. `"imageForward"`. Used for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DrawAdd { .. } => "drawAdd",
            Self::DrawDelete { .. } => "drawDelete",
            Self::ImageAdd { .. } => "imageAdd",
            Self::ImageMove { .. } => "imageMove",
            Self::ImageResize { .. } => "imageResize",
            Self::ImageDelete { .. } => "imageDelete",
            Self::ImageForward { .. } => "imageForward",
            Self::ImageBackward { .. } => "imageBackward",
            Self::TokenAdd { .. } => "tokenAdd",
            Self::TokenMove { .. } => "tokenMove",
            Self::TokenDelete { .. } => "tokenDelete",
        }
    }
}

/// Mutable view over a state's event vector.
pub struct EventLog<'a> {
    events: &'a mut Vec<SketchEvent>,
}

impl<'a> EventLog<'a> {
    #[must_use]
    pub fn new(events: &'a mut Vec<SketchEvent>) -> Self {
        Self { events }
    }

    pub fn append(&mut self, event: SketchEvent) {
        self.events.push(event);
    }

    /// Remove and return the most recent event.
    pub fn pop_last(&mut self) -> Option<SketchEvent> {
        self.events.pop()
    }

    /// Drop every event of `category`, keeping the order of the rest.
    pub fn prune(&mut self, category: EventCategory) {
        self.events.retain(|event| event.category() != category);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
