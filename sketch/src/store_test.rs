#![allow(clippy::float_cmp)]

use uuid::Uuid;

use super::*;
use crate::consts::TOKEN_PALETTE;
use crate::geometry::{ResizeHandle, compute_move_target, compute_resize_target};
use crate::surface::Size;

fn participant(name: &str) -> Participant {
    Participant { id: Uuid::new_v4(), name: name.into(), character: None }
}

fn stroke() -> DrawingPath {
    DrawingPath::new("M 10.0 10.0 L 20.0 20.0", "#000000", 3.0)
}

/// Store with two strokes, three sized images and two tokens, log cleared.
fn seeded() -> SketchStore {
    let mut store = SketchStore::new();
    store.add_drawing(stroke());
    store.add_drawing(stroke());
    for i in 0..3 {
        let id = store.add_image(format!("https://cdn.test/{i}.png"));
        store.resolve_image_height(id, 600.0, 400.0).unwrap();
    }
    store.add_token();
    store.add_token();
    store.state.events.clear();
    store
}

fn image_id(store: &SketchStore, index: usize) -> ItemId {
    store.state().images[index].id
}

fn token_id(store: &SketchStore, index: usize) -> ItemId {
    store.state().tokens[index].id
}

fn assert_undo_restores(before: &SketchStore, after: &mut SketchStore) {
    assert!(after.state().indices_consistent());
    assert!(after.undo().unwrap().is_some());
    assert_eq!(after.state(), before.state());
    assert!(after.state().indices_consistent());
}

// =============================================================
// undo inverts exactly one operation
// =============================================================

#[test]
fn undo_add_drawing() {
    let before = seeded();
    let mut s = before.clone();
    s.add_drawing(stroke());
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_delete_drawing_reinserts_at_index() {
    let before = seeded();
    let mut s = before.clone();
    let first = s.state().paths[0].id;
    s.delete_drawing(first).unwrap();
    assert_eq!(s.state().paths.len(), 1);
    assert_undo_restores(&before, &mut s);
    assert_eq!(s.state().paths[0].id, first);
}

#[test]
fn undo_add_image() {
    let before = seeded();
    let mut s = before.clone();
    s.add_image("https://cdn.test/new.png");
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_move_image() {
    let before = seeded();
    let mut s = before.clone();
    let previous = s.state().images[1].clone();
    let mut moved = previous.clone();
    moved.x += 40.0;
    moved.y += 15.0;
    s.move_image(moved, previous).unwrap();
    assert_eq!(s.state().images[1].x, 140.0);
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_resize_image() {
    let before = seeded();
    let mut s = before.clone();
    let previous = s.state().images[0].clone();
    let mut resized = previous.clone();
    resized.width = 450.0;
    resized.height = Some(300.0);
    s.resize_image(resized, previous).unwrap();
    assert_eq!(s.state().images[0].width, 450.0);
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_delete_image_reinserts_at_index() {
    let before = seeded();
    let mut s = before.clone();
    let middle = image_id(&s, 1);
    let removed = s.delete_image(middle).unwrap();
    assert_eq!(removed.index, 1);
    assert_eq!(s.state().images.len(), 2);
    assert!(s.state().indices_consistent());
    assert_undo_restores(&before, &mut s);
    assert_eq!(image_id(&s, 1), middle);
}

#[test]
fn undo_forward_and_backward_image() {
    let before = seeded();

    let mut s = before.clone();
    assert!(s.forward_image(image_id(&before, 0)).unwrap());
    assert_undo_restores(&before, &mut s);

    let mut s = before.clone();
    assert!(s.backward_image(image_id(&before, 2)).unwrap());
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_add_token_and_user_tokens() {
    let before = seeded();
    let mut s = before.clone();
    s.add_token();
    assert_undo_restores(&before, &mut s);

    let mut s = before.clone();
    let ids = s.add_user_tokens(&[participant("Ana"), participant("Bo")]);
    assert_eq!(ids.len(), 2);
    s.undo().unwrap();
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_move_token() {
    let before = seeded();
    let mut s = before.clone();
    let previous = s.state().tokens[0].clone();
    let mut moved = previous.clone();
    moved.x = 400.0;
    s.move_token(moved, previous).unwrap();
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_duplicate_token() {
    let before = seeded();
    let mut s = before.clone();
    s.duplicate_token(token_id(&s, 0)).unwrap();
    assert_undo_restores(&before, &mut s);
}

#[test]
fn undo_delete_token_reinserts_at_index() {
    let before = seeded();
    let mut s = before.clone();
    let first = token_id(&s, 0);
    s.delete_token(first).unwrap();
    assert_eq!(s.state().tokens[0].index, 0);
    assert_undo_restores(&before, &mut s);
    assert_eq!(token_id(&s, 0), first);
}

#[test]
fn undo_on_empty_log_is_noop() {
    let mut s = seeded();
    let before = s.state().clone();
    assert_eq!(s.undo(), Ok(None));
    assert_eq!(s.state(), &before);
}

#[test]
fn undo_is_lifo_across_categories() {
    let mut s = SketchStore::new();
    s.add_drawing(stroke());
    let image = s.add_image("https://cdn.test/a.png");
    s.add_token();

    assert!(matches!(s.undo().unwrap(), Some(SketchEvent::TokenAdd { .. })));
    assert!(matches!(s.undo().unwrap(), Some(SketchEvent::ImageAdd { image: i }) if i.id == image));
    assert!(matches!(s.undo().unwrap(), Some(SketchEvent::DrawAdd { .. })));
    assert_eq!(s.state(), &SketchState::default());
}

#[test]
fn undo_of_vanished_target_consumes_event() {
    let mut s = SketchStore::new();
    s.add_image("https://cdn.test/a.png");
    s.replace_from_remote(SketchSnapshot::default());
    assert_eq!(s.events().len(), 1);
    assert!(matches!(s.undo(), Err(StoreError::ImageNotFound(_))));
    assert!(s.events().is_empty());
}

// =============================================================
// index invariant
// =============================================================

#[test]
fn indices_hold_through_mixed_sequence() {
    let mut s = seeded();
    let a = image_id(&s, 0);
    s.forward_image(a).unwrap();
    assert!(s.state().indices_consistent());
    s.delete_image(image_id(&s, 0)).unwrap();
    assert!(s.state().indices_consistent());
    s.add_image("https://cdn.test/z.png");
    assert!(s.state().indices_consistent());
    s.backward_image(a).unwrap();
    assert!(s.state().indices_consistent());
    s.delete_token(token_id(&s, 0)).unwrap();
    assert!(s.state().indices_consistent());
    s.duplicate_token(token_id(&s, 0)).unwrap();
    assert!(s.state().indices_consistent());
    while s.undo().unwrap().is_some() {
        assert!(s.state().indices_consistent());
    }
}

#[test]
fn move_commit_fixes_stale_index() {
    let mut s = seeded();
    let previous = s.state().images[2].clone();
    let mut moved = previous.clone();
    moved.index = 0;
    moved.x = 500.0;
    s.move_image(moved, previous).unwrap();
    assert_eq!(s.state().images[2].index, 2);
}

// =============================================================
// errors
// =============================================================

#[test]
fn missing_ids_fail_loudly() {
    let mut s = seeded();
    let ghost = Uuid::new_v4();
    let events = s.events().len();
    assert_eq!(s.delete_drawing(ghost), Err(StoreError::DrawingNotFound(ghost)));
    assert_eq!(s.delete_image(ghost), Err(StoreError::ImageNotFound(ghost)));
    assert_eq!(s.forward_image(ghost), Err(StoreError::ImageNotFound(ghost)));
    assert_eq!(s.delete_token(ghost), Err(StoreError::TokenNotFound(ghost)));
    assert_eq!(s.change_token_color(ghost, "#fff"), Err(StoreError::TokenNotFound(ghost)));
    assert_eq!(s.duplicate_token(ghost), Err(StoreError::TokenNotFound(ghost)));
    assert_eq!(s.events().len(), events);
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(StoreError::TokenNotFound(Uuid::nil()).error_code(), "E_TOKEN_NOT_FOUND");
    assert_eq!(StoreError::ImageHeightUnknown(Uuid::nil()).error_code(), "E_IMAGE_HEIGHT_UNKNOWN");
}

#[test]
fn reorder_at_boundary_logs_nothing() {
    let mut s = seeded();
    assert!(!s.forward_image(image_id(&s, 2)).unwrap());
    assert!(!s.backward_image(image_id(&s, 0)).unwrap());
    assert!(s.events().is_empty());
}

// =============================================================
// images
// =============================================================

#[test]
fn add_image_uses_defaults() {
    let mut s = SketchStore::new();
    let id = s.add_image("https://cdn.test/a.png");
    let image = s.state().image(id).unwrap();
    assert_eq!((image.x, image.y, image.width), (100.0, 100.0, 300.0));
    assert_eq!(image.height, None);
}

#[test]
fn resolve_height_is_set_once() {
    let mut s = SketchStore::new();
    let id = s.add_image("https://cdn.test/a.png");
    assert_eq!(s.resolve_image_height(id, 600.0, 400.0), Ok(200.0));
    assert_eq!(s.resolve_image_height(id, 100.0, 100.0), Ok(200.0));
    assert_eq!(s.events().len(), 1);
}

#[test]
fn resolve_height_rejects_degenerate_size() {
    let mut s = SketchStore::new();
    let id = s.add_image("https://cdn.test/a.png");
    assert!(matches!(s.resolve_image_height(id, 0.0, 400.0), Err(StoreError::InvalidNaturalSize { .. })));
    assert_eq!(s.state().image(id).unwrap().height, None);
}

#[test]
fn preview_is_not_logged() {
    let mut s = seeded();
    let id = image_id(&s, 0);
    s.preview_image(id, Bounds::new(10.0, 20.0, 300.0, 200.0)).unwrap();
    assert_eq!(s.state().images[0].x, 10.0);
    assert!(s.events().is_empty());
}

// =============================================================
// tokens
// =============================================================

#[test]
fn add_token_rotates_palette() {
    let mut s = SketchStore::new();
    s.add_token();
    s.add_token();
    assert_eq!(s.state().tokens[0].color, TOKEN_PALETTE[0]);
    assert_eq!(s.state().tokens[1].color, TOKEN_PALETTE[1]);
}

#[test]
fn user_tokens_attach_and_skip_existing() {
    let mut s = SketchStore::new();
    let ana = participant("Ana");
    let bo = participant("Bo");
    s.add_user_tokens(std::slice::from_ref(&ana));
    let ids = s.add_user_tokens(&[ana.clone(), bo.clone()]);
    assert_eq!(ids.len(), 1);
    assert_eq!(s.state().tokens.len(), 2);
    assert!(s.state().tokens[1].is_attached_to(bo.id));
    assert_eq!(s.state().tokens[1].attached_data.as_ref().unwrap().user_name, "Bo");
}

#[test]
fn user_tokens_are_spaced_and_on_surface() {
    let mut s = SketchStore::new();
    let people: Vec<_> = (0..40).map(|i| participant(&format!("p{i}"))).collect();
    s.add_user_tokens(&people);
    let tokens = &s.state().tokens;
    assert_eq!(tokens[1].x - tokens[0].x, USER_TOKEN_SPACING);
    for t in tokens {
        assert!(t.x + TOKEN_SIZE <= SURFACE_WIDTH);
        assert!(t.y + TOKEN_SIZE <= SURFACE_HEIGHT);
    }
}

#[test]
fn duplicate_copies_look_not_owner() {
    let mut s = SketchStore::new();
    let ana = participant("Ana");
    let ids = s.add_user_tokens(std::slice::from_ref(&ana));
    s.change_token_color(ids[0], "#abcdef").unwrap();
    s.set_token_tooltip(ids[0], TooltipPlacement::Left).unwrap();
    let copy = s.duplicate_token(ids[0]).unwrap();
    let original = s.state().token(ids[0]).unwrap().clone();
    let copy = s.state().token(copy).unwrap();
    assert_eq!(copy.color, "#abcdef");
    assert_eq!(copy.tooltip_placement, TooltipPlacement::Left);
    assert_eq!(copy.attached_data, None);
    assert_eq!((copy.x, copy.y), (original.x + 20.0, original.y + 20.0));
}

#[test]
fn duplicate_near_edge_stays_in_place() {
    let mut s = SketchStore::new();
    let id = s.add_token();
    s.preview_token(id, Point::new(SURFACE_WIDTH - TOKEN_SIZE, 10.0)).unwrap();
    let copy = s.duplicate_token(id).unwrap();
    assert_eq!(s.state().token(copy).unwrap().x, SURFACE_WIDTH - TOKEN_SIZE);
}

#[test]
fn attach_and_color_are_not_logged() {
    let mut s = seeded();
    let id = token_id(&s, 0);
    let ana = participant("Ana");
    s.attach_token(id, AttachedRef::for_participant(&ana)).unwrap();
    assert!(s.state().tokens[0].is_attached_to(ana.id));
    s.unattach_token(id).unwrap();
    assert_eq!(s.state().tokens[0].attached_data, None);
    s.change_token_color(id, "#000").unwrap();
    s.set_token_tooltip(id, TooltipPlacement::Bottom).unwrap();
    assert!(s.events().is_empty());
}

#[test]
fn remote_token_keeps_local_position() {
    let mut s = seeded();
    let mut remote = s.state().tokens[1].clone();
    remote.index = 0;
    remote.x = 777.0;
    s.apply_remote_token(remote).unwrap();
    assert_eq!(s.state().tokens[1].x, 777.0);
    assert!(s.state().indices_consistent());
    assert!(s.events().is_empty());
}

// =============================================================
// bulk clears
// =============================================================

#[test]
fn clear_tokens_is_idempotent_and_prunes() {
    let mut s = SketchStore::new();
    s.add_token();
    s.add_image("https://cdn.test/a.png");
    s.add_token();
    s.clear_tokens();
    let once = s.state().tokens.clone();
    s.clear_tokens();
    assert!(once.is_empty());
    assert!(s.state().tokens.is_empty());
    assert!(s.events().iter().all(|e| e.category() != EventCategory::Token));
    assert_eq!(s.events().len(), 1);
}

#[test]
fn clear_sketch_empties_everything_but_display() {
    let mut s = seeded();
    s.set_displayed(true);
    s.add_token();
    s.clear_sketch();
    assert!(s.state().paths.is_empty() && s.state().images.is_empty() && s.state().tokens.is_empty());
    assert!(s.events().is_empty());
    assert!(s.state().displayed);
    assert_eq!(s.undo(), Ok(None));
}

#[test]
fn replace_from_remote_keeps_log() {
    let mut s = SketchStore::new();
    s.add_token();
    let remote = seeded().snapshot();
    s.replace_from_remote(remote.clone());
    assert_eq!(s.snapshot(), remote);
    assert_eq!(s.events().len(), 1);
}

// =============================================================
// scenarios
// =============================================================

#[test]
fn scenario_drag_image_then_undo() {
    let mut s = SketchStore::new();
    let id = s.add_image("https://cdn.test/map.png");
    s.resolve_image_height(id, 900.0, 600.0).unwrap();
    let previous = s.state().image(id).unwrap().clone();
    let bounds = previous.bounds().unwrap();

    let grab = Point::new(30.0, 30.0);
    let pointer = Point::new(previous.x + grab.x + 50.0, previous.y + grab.y + 20.0);
    let target = compute_move_target(pointer, grab, bounds, Size::surface()).unwrap();
    let mut moved = previous.clone();
    moved.x = target.x;
    moved.y = target.y;
    s.move_image(moved, previous).unwrap();

    let image = s.state().image(id).unwrap();
    assert_eq!((image.x, image.y), (150.0, 120.0));
    s.undo().unwrap();
    let image = s.state().image(id).unwrap();
    assert_eq!((image.x, image.y), (100.0, 100.0));
}

#[test]
fn scenario_resize_from_se() {
    let mut s = SketchStore::new();
    let id = s.add_image("https://cdn.test/map.png");
    s.resolve_image_height(id, 300.0, 200.0).unwrap();
    let previous = s.state().image(id).unwrap().clone();
    let initial = previous.bounds().unwrap();
    let start = initial.corner(ResizeHandle::Se);
    let next =
        compute_resize_target(ResizeHandle::Se, initial, start, Point::new(start.x + 90.0, start.y), Size::surface())
            .unwrap();
    let mut resized = previous.clone();
    resized.width = next.width;
    resized.height = Some(next.height);
    s.resize_image(resized, previous.clone()).unwrap();

    let image = s.state().image(id).unwrap();
    assert_eq!(image.width, previous.width + 90.0);
    assert!((image.height.unwrap() - image.width * 2.0 / 3.0).abs() < 1e-9);
    assert_eq!((image.x, image.y), (previous.x, previous.y));
}

#[test]
fn scenario_forward_then_backward() {
    let mut s = SketchStore::new();
    let img0 = s.add_image("https://cdn.test/0.png");
    let img1 = s.add_image("https://cdn.test/1.png");
    s.forward_image(img0).unwrap();
    assert_eq!((image_id(&s, 0), image_id(&s, 1)), (img1, img0));
    s.backward_image(img0).unwrap();
    assert_eq!((image_id(&s, 0), image_id(&s, 1)), (img0, img1));
    assert!(s.state().indices_consistent());
}

#[test]
fn scenario_clear_drawings_drops_history() {
    let mut s = SketchStore::new();
    let token = s.add_token();
    for _ in 0..3 {
        s.add_drawing(stroke());
    }
    s.clear_drawings();
    assert!(s.state().paths.is_empty());
    assert!(s.events().iter().all(|e| e.category() != EventCategory::Drawing));
    // Undo falls through to the token add.
    assert!(matches!(s.undo().unwrap(), Some(SketchEvent::TokenAdd { token: t }) if t.id == token));
    assert!(s.state().tokens.is_empty());
}
