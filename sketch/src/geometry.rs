//! Pure geometry helpers: move targets, aspect-locked resize, z-order swaps,
//! and default token colors.
//!
//! Every function here is side-effect free. Rejected input is reported as
//! `None` rather than clamped, so any geometry a caller receives is already
//! fully inside the surface.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MIN_ITEM_HEIGHT, MIN_ITEM_WIDTH, TOKEN_PALETTE};
use crate::model::TokenItem;
use crate::surface::{Point, Size};

/// Axis-aligned rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Top-left corner.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether `point` lies inside or on the edge of the rectangle.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Whether the whole rectangle lies within `[0, surface]` on both axes.
    #[must_use]
    pub fn fits_within(&self, surface: Size) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= surface.width && self.bottom() <= surface.height
    }

    /// Corner position for a resize handle.
    #[must_use]
    pub fn corner(&self, handle: ResizeHandle) -> Point {
        match handle {
            ResizeHandle::Nw => Point::new(self.x, self.y),
            ResizeHandle::Ne => Point::new(self.right(), self.y),
            ResizeHandle::Sw => Point::new(self.x, self.bottom()),
            ResizeHandle::Se => Point::new(self.right(), self.bottom()),
        }
    }
}

/// Corner handle an image is resized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl ResizeHandle {
    /// All handles, in hit-test priority order.
    pub const ALL: [ResizeHandle; 4] = [Self::Nw, Self::Ne, Self::Sw, Self::Se];

    /// Handles on the top edge move the anchor vertically.
    #[must_use]
    pub fn is_north(self) -> bool {
        matches!(self, Self::Nw | Self::Ne)
    }

    /// Handles on the left edge move the anchor horizontally.
    #[must_use]
    pub fn is_west(self) -> bool {
        matches!(self, Self::Nw | Self::Sw)
    }

    /// CSS cursor shown while hovering or dragging this handle.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::Nw | Self::Se => "nwse-resize",
            Self::Ne | Self::Sw => "nesw-resize",
        }
    }
}

/// Candidate top-left for a dragged item so the pointer keeps its grab offset.
///
/// Returns `None` when the item would leave the surface on any side.
#[must_use]
pub fn compute_move_target(pointer: Point, grab_offset: Point, item: Bounds, surface: Size) -> Option<Point> {
    let candidate = Bounds::new(pointer.x - grab_offset.x, pointer.y - grab_offset.y, item.width, item.height);
    candidate.fits_within(surface).then(|| candidate.origin())
}

/// Aspect-locked resize from a corner handle.
///
/// The pointer axis that changed most drives the new size; the other axis is
/// derived from the initial aspect ratio. North and west handles move the
/// anchor so the opposite edge stays put. Returns `None` below the minimum
/// size, when any edge would leave the surface, or when `initial` has no
/// height to take a ratio from.
#[must_use]
pub fn compute_resize_target(
    handle: ResizeHandle,
    initial: Bounds,
    initial_pointer: Point,
    current_pointer: Point,
    surface: Size,
) -> Option<Bounds> {
    if initial.height <= 0.0 || initial.width <= 0.0 {
        return None;
    }
    let ratio = initial.width / initial.height;

    let dx = current_pointer.x - initial_pointer.x;
    let dy = current_pointer.y - initial_pointer.y;
    let width_change = if handle.is_west() { -dx } else { dx };
    let height_change = if handle.is_north() { -dy } else { dy };

    let (width, height) = if dx.abs() >= dy.abs() {
        let width = initial.width + width_change;
        (width, width / ratio)
    } else {
        let height = initial.height + height_change;
        (height * ratio, height)
    };

    if width < MIN_ITEM_WIDTH || height < MIN_ITEM_HEIGHT {
        return None;
    }

    let x = if handle.is_west() { initial.right() - width } else { initial.x };
    let y = if handle.is_north() { initial.bottom() - height } else { initial.y };
    let next = Bounds::new(x, y, width, height);
    next.fits_within(surface).then_some(next)
}

/// Swap the element at `index` with the one above it. No-op at the top.
#[must_use]
pub fn bring_forward<T>(mut list: Vec<T>, index: usize) -> Vec<T> {
    if index + 1 < list.len() {
        list.swap(index, index + 1);
    }
    list
}

/// Swap the element at `index` with the one below it. No-op at the bottom.
#[must_use]
pub fn send_backward<T>(mut list: Vec<T>, index: usize) -> Vec<T> {
    if index > 0 && index < list.len() {
        list.swap(index, index - 1);
    }
    list
}

/// Default color for the next token.
///
/// Rotates through [`TOKEN_PALETTE`] starting at the current token count and
/// returns the first color that is not used more often than the least-used
/// palette color.
#[must_use]
pub fn pick_next_color(existing: &[TokenItem]) -> &'static str {
    let usage = TOKEN_PALETTE.map(|color| existing.iter().filter(|t| t.color == color).count());
    let least = usage.iter().copied().min().unwrap_or_default();
    let start = existing.len() % TOKEN_PALETTE.len();

    (0..TOKEN_PALETTE.len())
        .map(|offset| (start + offset) % TOKEN_PALETTE.len())
        .find(|&i| usage[i] == least)
        .map_or(TOKEN_PALETTE[start], |i| TOKEN_PALETTE[i])
}
