#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::authority::Actor;
use crate::consts::{HANDLE_RADIUS, TOKEN_SIZE};
use crate::geometry::ResizeHandle;
use crate::model::{ItemId, SketchState, TokenItem};
use crate::surface::Point;

/// What lies under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// A corner handle of an image. Only reported for the master.
    ImageHandle { id: ItemId, handle: ResizeHandle },
    Token(ItemId),
    Image(ItemId),
}

/// Topmost target under `point`, in surface coordinates.
///
/// Resize handles win over everything, then tokens (painted above images,
/// newest first), then images from the top of the stack down. Images whose
/// height is still unknown have no area and are never hit.
#[must_use]
pub fn hit_test(point: Point, state: &SketchState, actor: &Actor) -> Option<HitTarget> {
    if actor.is_master() {
        for image in state.images.iter().rev() {
            let Some(bounds) = image.bounds() else {
                continue;
            };
            for handle in ResizeHandle::ALL {
                if distance(bounds.corner(handle), point) <= HANDLE_RADIUS {
                    return Some(HitTarget::ImageHandle { id: image.id, handle });
                }
            }
        }
    }

    if let Some(token) = state.tokens.iter().rev().find(|t| token_contains(t, point)) {
        return Some(HitTarget::Token(token.id));
    }

    state
        .images
        .iter()
        .rev()
        .find(|image| image.bounds().is_some_and(|b| b.contains(point)))
        .map(|image| HitTarget::Image(image.id))
}

/// Tokens are discs of [`TOKEN_SIZE`] diameter with `(x, y)` at the top-left
/// of their bounding square.
fn token_contains(token: &TokenItem, point: Point) -> bool {
    let radius = TOKEN_SIZE / 2.0;
    let center = Point::new(token.x + radius, token.y + radius);
    distance(center, point) <= radius
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
