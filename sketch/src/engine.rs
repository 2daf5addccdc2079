use tracing::debug;

use crate::authority::Mutation;
use crate::geometry::Bounds;
use crate::hit::{HitTarget, hit_test};
use crate::input::{
    Button, DrawingController, DrawingState, Grabbed, MoveCommit, MoveController, MoveState, ResizeCommit, ResizeController,
    ResizeState, UiState,
};
use crate::model::DrawingPath;
use crate::surface::{Point, Size, SurfaceTransform, transform_pointer_to_surface};
use crate::sync::{SketchSession, Transport};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RenderNeeded,
    SetCursor(String),
    /// A gesture finished and was committed to the store.
    Committed(Mutation),
}

/// Pointer-driven front end over a [`SketchSession`].
///
/// Owns the surface transform, the UI settings and the three gesture
/// controllers. Only one gesture is active at a time. Refused or stale
/// operations are silent: the gesture simply does not start or commit.
pub struct SketchEngine<T: Transport> {
    session: SketchSession<T>,
    transform: SurfaceTransform,
    pub ui: UiState,
    drawing: DrawingController,
    moving: MoveController,
    resizing: ResizeController,
}

impl<T: Transport> SketchEngine<T> {
    #[must_use]
    pub fn new(session: SketchSession<T>) -> Self {
        Self {
            session,
            transform: SurfaceTransform::default(),
            ui: UiState::default(),
            drawing: DrawingController::new(),
            moving: MoveController::new(),
            resizing: ResizeController::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SketchSession<T> {
        &self.session
    }

    /// Direct access for toolbar commands and inbound messages.
    pub fn session_mut(&mut self) -> &mut SketchSession<T> {
        &mut self.session
    }

    /// Update the on-screen rectangle the surface is drawn into (CSS pixels).
    pub fn set_viewport(&mut self, left: f64, top: f64, width: f64, height: f64) {
        self.transform = SurfaceTransform::from_viewport(left, top, width, height);
    }

    #[must_use]
    pub fn transform(&self) -> SurfaceTransform {
        self.transform
    }

    #[must_use]
    pub fn is_gesture_active(&self) -> bool {
        self.drawing.is_active() || self.moving.is_active() || self.resizing.is_active()
    }

    /// Path data of the stroke being drawn, for live rendering.
    #[must_use]
    pub fn pending_stroke(&self) -> Option<&str> {
        match self.drawing.state() {
            DrawingState::Drawing { stroke, .. } => Some(stroke),
            DrawingState::Idle => None,
        }
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary || self.is_gesture_active() {
            return Vec::new();
        }
        let pt = transform_pointer_to_surface(screen_pt, &self.transform);
        let actor = *self.session.actor();

        if self.ui.free_draw {
            if !actor.is_master() {
                return Vec::new();
            }
            self.drawing.begin(pt);
            return vec![Action::SetCursor("crosshair".into())];
        }

        let state = self.session.state();
        match hit_test(pt, state, &actor) {
            Some(HitTarget::ImageHandle { id, handle }) => {
                let Some(image) = state.image(id).cloned() else {
                    return Vec::new();
                };
                if !self.session.can(&Mutation::ResizeImage(id)) {
                    return Vec::new();
                }
                if let Err(err) = self.resizing.begin(image, handle, pt) {
                    debug!(error = %err, "resize not started");
                    return Vec::new();
                }
                vec![Action::SetCursor(handle.cursor().into())]
            }
            Some(HitTarget::Token(id)) => {
                let Some(token) = state.token(id).cloned() else {
                    return Vec::new();
                };
                if !self.session.can(&Mutation::MoveToken(id)) {
                    return Vec::new();
                }
                self.moving.begin(Grabbed::Token(token), pt);
                vec![Action::SetCursor("grabbing".into())]
            }
            Some(HitTarget::Image(id)) => {
                let Some(image) = state.image(id).cloned() else {
                    return Vec::new();
                };
                if !self.session.can(&Mutation::MoveImage(id)) {
                    return Vec::new();
                }
                self.moving.begin(Grabbed::Image(image), pt);
                vec![Action::SetCursor("grabbing".into())]
            }
            None => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let pt = transform_pointer_to_surface(screen_pt, &self.transform);

        if self.drawing.is_active() {
            return if self.drawing.extend(pt) { vec![Action::RenderNeeded] } else { Vec::new() };
        }

        if self.moving.is_active() {
            let Some(target) = self.moving.step(pt, Size::surface()) else {
                return Vec::new();
            };
            let applied = match self.moving.state() {
                MoveState::Moving { grabbed: Grabbed::Token(token), .. } => {
                    self.session.drag_token(token.id, target).is_ok()
                }
                MoveState::Moving { grabbed: Grabbed::Image(image), .. } => {
                    let bounds = Bounds::new(target.x, target.y, image.width, image.height.unwrap_or_default());
                    self.session.preview_image(image.id, bounds).is_ok()
                }
                MoveState::Idle => false,
            };
            return if applied { vec![Action::RenderNeeded] } else { Vec::new() };
        }

        if self.resizing.is_active() {
            let Some(bounds) = self.resizing.step(pt, Size::surface()) else {
                return Vec::new();
            };
            let id = match self.resizing.state() {
                ResizeState::Resizing { image, .. } => image.id,
                ResizeState::Idle => return Vec::new(),
            };
            return if self.session.preview_image(id, bounds).is_ok() { vec![Action::RenderNeeded] } else { Vec::new() };
        }

        vec![Action::SetCursor(self.hover_cursor(pt).into())]
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        self.finish()
    }

    /// Leaving the surface finalizes the gesture exactly like releasing.
    pub fn on_pointer_leave(&mut self, _screen_pt: Point) -> Vec<Action> {
        self.finish()
    }

    // --- Gesture completion ---

    fn finish(&mut self) -> Vec<Action> {
        if !self.is_gesture_active() {
            return Vec::new();
        }
        let mut actions = vec![Action::SetCursor("default".into()), Action::RenderNeeded];

        let committed = if self.drawing.is_active() {
            self.finish_drawing()
        } else if self.moving.is_active() {
            self.moving.finish().and_then(|commit| self.commit_move(commit))
        } else {
            self.resizing.finish().and_then(|commit| self.commit_resize(commit))
        };

        if let Some(mutation) = committed {
            actions.push(Action::Committed(mutation));
        }
        actions
    }

    fn finish_drawing(&mut self) -> Option<Mutation> {
        let stroke = self.drawing.finish()?;
        let path = DrawingPath::new(stroke, self.ui.pen_color.clone(), self.ui.pen_width);
        self.session.add_drawing(path).is_ok().then_some(Mutation::AddDrawing)
    }

    fn commit_move(&mut self, commit: MoveCommit) -> Option<Mutation> {
        let MoveCommit { previous, to } = commit;
        match previous {
            Grabbed::Token(previous) => {
                let id = previous.id;
                let mut moved = self.session.state().token(id)?.clone();
                moved.x = to.x;
                moved.y = to.y;
                self.session.move_token(moved, previous).is_ok().then_some(Mutation::MoveToken(id))
            }
            Grabbed::Image(previous) => {
                let id = previous.id;
                let mut moved = self.session.state().image(id)?.clone();
                moved.x = to.x;
                moved.y = to.y;
                self.session.move_image(moved, previous).is_ok().then_some(Mutation::MoveImage(id))
            }
        }
    }

    fn commit_resize(&mut self, commit: ResizeCommit) -> Option<Mutation> {
        let ResizeCommit { previous, bounds } = commit;
        let id = previous.id;
        let mut resized = self.session.state().image(id)?.clone();
        resized.x = bounds.x;
        resized.y = bounds.y;
        resized.width = bounds.width;
        resized.height = Some(bounds.height);
        self.session.resize_image(resized, previous).is_ok().then_some(Mutation::ResizeImage(id))
    }

    // --- Queries ---

    fn hover_cursor(&self, pt: Point) -> &'static str {
        if self.ui.free_draw && self.session.actor().is_master() {
            return "crosshair";
        }
        match hit_test(pt, self.session.state(), self.session.actor()) {
            Some(HitTarget::ImageHandle { handle, .. }) => handle.cursor(),
            Some(HitTarget::Token(id)) if self.session.can(&Mutation::MoveToken(id)) => "grab",
            Some(HitTarget::Image(id)) if self.session.can(&Mutation::MoveImage(id)) => "grab",
            _ => "default",
        }
    }
}
