//! Pointer-to-surface coordinate mapping.
//!
//! The sketch surface has a fixed logical size ([`SURFACE_WIDTH`] ×
//! [`SURFACE_HEIGHT`]) regardless of how large it is drawn on screen. The host
//! reports where the surface element sits in CSS pixels and this module maps
//! raw pointer positions into surface units.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use serde::{Deserialize, Serialize};

use crate::consts::{SURFACE_HEIGHT, SURFACE_WIDTH};

/// A point in either screen or surface space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of a surface or item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// The logical sketch surface.
    #[must_use]
    pub fn surface() -> Self {
        Self { width: SURFACE_WIDTH, height: SURFACE_HEIGHT }
    }
}

/// Placement of the surface element on screen.
///
/// `left` / `top` are the CSS-pixel origin of the element; `scale_x` /
/// `scale_y` convert one CSS pixel into surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTransform {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for SurfaceTransform {
    fn default() -> Self {
        Self { left: 0.0, top: 0.0, scale_x: 1.0, scale_y: 1.0 }
    }
}

impl SurfaceTransform {
    /// Build a transform from the element's on-screen bounding rect.
    ///
    /// A degenerate (zero or negative) on-screen size falls back to a 1:1
    /// scale on that axis.
    #[must_use]
    pub fn from_viewport(left: f64, top: f64, width: f64, height: f64) -> Self {
        let scale_x = if width > 0.0 { SURFACE_WIDTH / width } else { 1.0 };
        let scale_y = if height > 0.0 { SURFACE_HEIGHT / height } else { 1.0 };
        Self { left, top, scale_x, scale_y }
    }
}

/// Map a raw pointer position (CSS pixels) into surface coordinates.
#[must_use]
pub fn transform_pointer_to_surface(pointer: Point, transform: &SurfaceTransform) -> Point {
    Point {
        x: (pointer.x - transform.left) * transform.scale_x,
        y: (pointer.y - transform.top) * transform.scale_y,
    }
}
