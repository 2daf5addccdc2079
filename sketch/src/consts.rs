//! Shared numeric constants for the sketch crate.

// ── Surface ─────────────────────────────────────────────────────

/// Logical width of the sketch surface, independent of on-screen scaling.
pub const SURFACE_WIDTH: f64 = 1920.0;

/// Logical height of the sketch surface.
pub const SURFACE_HEIGHT: f64 = 1080.0;

// ── Resize ──────────────────────────────────────────────────────

/// Smallest width an image may be resized to, in surface units.
pub const MIN_ITEM_WIDTH: f64 = 100.0;

/// Smallest height an image may be resized to, in surface units.
pub const MIN_ITEM_HEIGHT: f64 = 100.0;

// ── Items ───────────────────────────────────────────────────────

/// Width given to a freshly added image before the user resizes it.
pub const DEFAULT_IMAGE_WIDTH: f64 = 300.0;

/// Top-left corner of a freshly added image.
pub const DEFAULT_IMAGE_POSITION: (f64, f64) = (100.0, 100.0);

/// Top-left corner of a freshly added token.
pub const DEFAULT_TOKEN_POSITION: (f64, f64) = (50.0, 50.0);

/// Offset applied to a duplicated token so it does not hide its source.
pub const DUPLICATE_TOKEN_OFFSET: f64 = 20.0;

/// Horizontal gap between tokens created in bulk for session participants.
pub const USER_TOKEN_SPACING: f64 = 60.0;

/// Token diameter in surface units.
pub const TOKEN_SIZE: f64 = 40.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Radius of the circular grab area around an image corner handle.
pub const HANDLE_RADIUS: f64 = 12.0;

// ── Drawing ─────────────────────────────────────────────────────

/// Default pen color for free-hand strokes.
pub const DEFAULT_PEN_COLOR: &str = "#000000";

/// Default pen width for free-hand strokes.
pub const DEFAULT_PEN_WIDTH: f64 = 3.0;

// ── Tokens ──────────────────────────────────────────────────────

/// Token colors, rotated so consecutive tokens are visually distinct.
pub const TOKEN_PALETTE: [&str; 8] = [
    "#e53935", "#1e88e5", "#43a047", "#fdd835", "#8e24aa", "#fb8c00", "#00acc1", "#6d4c41",
];
