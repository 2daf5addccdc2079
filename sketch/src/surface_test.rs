#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn default_transform_is_identity() {
    let t = SurfaceTransform::default();
    let p = transform_pointer_to_surface(Point::new(12.5, 40.0), &t);
    assert_eq!(p, Point::new(12.5, 40.0));
}

#[test]
fn from_viewport_scales_to_logical_surface() {
    let t = SurfaceTransform::from_viewport(0.0, 0.0, 960.0, 540.0);
    assert_eq!(t.scale_x, 2.0);
    assert_eq!(t.scale_y, 2.0);
    let p = transform_pointer_to_surface(Point::new(480.0, 270.0), &t);
    assert_eq!(p, Point::new(960.0, 540.0));
}

#[test]
fn transform_subtracts_element_origin() {
    let t = SurfaceTransform::from_viewport(100.0, 50.0, 1920.0, 1080.0);
    let p = transform_pointer_to_surface(Point::new(100.0, 50.0), &t);
    assert_eq!(p, Point::new(0.0, 0.0));
    let p = transform_pointer_to_surface(Point::new(2020.0, 1130.0), &t);
    assert_eq!(p, Point::new(1920.0, 1080.0));
}

#[test]
fn degenerate_viewport_falls_back_to_unit_scale() {
    let t = SurfaceTransform::from_viewport(0.0, 0.0, 0.0, -10.0);
    assert_eq!(t.scale_x, 1.0);
    assert_eq!(t.scale_y, 1.0);
}

#[test]
fn surface_size_matches_constants() {
    let s = Size::surface();
    assert_eq!(s.width, 1920.0);
    assert_eq!(s.height, 1080.0);
}
