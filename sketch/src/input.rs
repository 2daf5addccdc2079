//! Input model: buttons, UI state, and the three gesture controllers.
//!
//! Each controller is a small `Idle -> Active -> Idle` state machine fed with
//! surface-space pointer positions. Controllers only track gesture context
//! and compute geometry; they never touch the store. `finish` hands back
//! whatever should be committed, and the engine applies it through the
//! session. Pointer-leave finishes exactly like pointer-up.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt::Write as _;

use crate::consts::{DEFAULT_PEN_COLOR, DEFAULT_PEN_WIDTH, TOKEN_SIZE};
use crate::geometry::{Bounds, ResizeHandle, compute_move_target, compute_resize_target};
use crate::model::{ImageItem, TokenItem};
use crate::store::StoreError;
use crate::surface::{Point, Size};

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button.
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Persistent UI settings that shape how pointer input is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Free-hand drawing mode; pointer-down starts a stroke instead of a grab.
    pub free_draw: bool,
    /// CSS color for new strokes.
    pub pen_color: String,
    /// Stroke width in surface units.
    pub pen_width: f64,
}

impl Default for UiState {
    fn default() -> Self {
        Self { free_draw: false, pen_color: DEFAULT_PEN_COLOR.to_string(), pen_width: DEFAULT_PEN_WIDTH }
    }
}

// =============================================================================
// DRAWING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawingState {
    #[default]
    Idle,
    Drawing {
        /// SVG path data accumulated so far.
        stroke: String,
        /// Number of `L` segments appended after the initial `M`.
        segments: usize,
    },
}

/// Accumulates a free-hand stroke between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub struct DrawingController {
    state: DrawingState,
}

impl DrawingController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, DrawingState::Drawing { .. })
    }

    pub fn begin(&mut self, at: Point) {
        self.state = DrawingState::Drawing { stroke: format!("M {:.1} {:.1}", at.x, at.y), segments: 0 };
    }

    /// Append a segment. Returns `false` when no stroke is in progress.
    pub fn extend(&mut self, at: Point) -> bool {
        let DrawingState::Drawing { stroke, segments } = &mut self.state else {
            return false;
        };
        if write!(stroke, " L {:.1} {:.1}", at.x, at.y).is_err() {
            return false;
        }
        *segments += 1;
        true
    }

    /// End the stroke. Returns the path data if at least one segment was drawn.
    pub fn finish(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            DrawingState::Drawing { stroke, segments } if segments > 0 => Some(stroke),
            _ => None,
        }
    }
}

// =============================================================================
// MOVE
// =============================================================================

/// The item a move gesture picked up, as it was at pointer-down.
#[derive(Debug, Clone, PartialEq)]
pub enum Grabbed {
    Image(ImageItem),
    Token(TokenItem),
}

impl Grabbed {
    /// Footprint used to keep the item on the surface. An image whose
    /// height is unknown is treated as zero-height.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Image(image) => Bounds::new(image.x, image.y, image.width, image.height.unwrap_or_default()),
            Self::Token(token) => Bounds::new(token.x, token.y, TOKEN_SIZE, TOKEN_SIZE),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MoveState {
    #[default]
    Idle,
    Moving {
        grabbed: Grabbed,
        /// Pointer position relative to the item's top-left at pointer-down.
        grab_offset: Point,
        /// Last accepted top-left.
        current: Point,
    },
}

/// A finished move: the item before the gesture and where it ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommit {
    pub previous: Grabbed,
    pub to: Point,
}

/// Drags an image or token, rejecting positions that leave the surface.
#[derive(Debug, Clone, Default)]
pub struct MoveController {
    state: MoveState,
}

impl MoveController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &MoveState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, MoveState::Moving { .. })
    }

    pub fn begin(&mut self, grabbed: Grabbed, pointer: Point) {
        let origin = grabbed.bounds().origin();
        let grab_offset = Point::new(pointer.x - origin.x, pointer.y - origin.y);
        self.state = MoveState::Moving { grabbed, grab_offset, current: origin };
    }

    /// New top-left for `pointer`, or `None` if idle, rejected, or unchanged.
    pub fn step(&mut self, pointer: Point, surface: Size) -> Option<Point> {
        let MoveState::Moving { grabbed, grab_offset, current } = &mut self.state else {
            return None;
        };
        let target = compute_move_target(pointer, *grab_offset, grabbed.bounds(), surface)?;
        if target == *current {
            return None;
        }
        *current = target;
        Some(target)
    }

    /// End the gesture. Returns a commit only if the item ended somewhere new.
    pub fn finish(&mut self) -> Option<MoveCommit> {
        let MoveState::Moving { grabbed, current, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        (current != grabbed.bounds().origin()).then_some(MoveCommit { previous: grabbed, to: current })
    }
}

// =============================================================================
// RESIZE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResizeState {
    #[default]
    Idle,
    Resizing {
        /// The image at pointer-down.
        image: ImageItem,
        handle: ResizeHandle,
        initial: Bounds,
        start_pointer: Point,
        /// Last accepted bounds, if any step was accepted.
        current: Option<Bounds>,
    },
}

/// A finished resize: the image before the gesture and its final bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeCommit {
    pub previous: ImageItem,
    pub bounds: Bounds,
}

/// Resizes an image from a corner handle with its aspect ratio locked.
#[derive(Debug, Clone, Default)]
pub struct ResizeController {
    state: ResizeState,
}

impl ResizeController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &ResizeState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, ResizeState::Resizing { .. })
    }

    /// Start resizing. The image's height must already be resolved.
    pub fn begin(&mut self, image: ImageItem, handle: ResizeHandle, pointer: Point) -> Result<(), StoreError> {
        let initial = image.bounds().ok_or(StoreError::ImageHeightUnknown(image.id))?;
        self.state = ResizeState::Resizing { image, handle, initial, start_pointer: pointer, current: None };
        Ok(())
    }

    /// New bounds for `pointer`, or `None` if idle or rejected.
    pub fn step(&mut self, pointer: Point, surface: Size) -> Option<Bounds> {
        let ResizeState::Resizing { handle, initial, start_pointer, current, .. } = &mut self.state else {
            return None;
        };
        let next = compute_resize_target(*handle, *initial, *start_pointer, pointer, surface)?;
        *current = Some(next);
        Some(next)
    }

    /// End the gesture. Returns a commit only if the bounds changed.
    pub fn finish(&mut self) -> Option<ResizeCommit> {
        let ResizeState::Resizing { image, initial, current: Some(bounds), .. } = std::mem::take(&mut self.state)
        else {
            return None;
        };
        (bounds != initial).then_some(ResizeCommit { previous: image, bounds })
    }
}
