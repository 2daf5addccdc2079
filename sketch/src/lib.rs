//! Collaborative sketch engine for shared tabletop scenes.
//!
//! A sketch is a fixed 1920×1080 surface holding free-hand drawings, images
//! and player tokens. This crate owns everything that runs next to the
//! surface: the item model, the event-sourced store with undo, the
//! master/player authority rules, the sync session that streams state to the
//! relay, and the pointer controllers that turn raw input into committed
//! mutations. The host layer only forwards pointer events and renders the
//! resulting [`engine::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Pointer-driven front end over a sync session |
//! | [`sync`] | Wire messages, transport seam, connection lifecycle, [`sync::SketchSession`] |
//! | [`store`] | Sketch state plus the event log and undo |
//! | [`events`] | Undoable event records and the log wrapper |
//! | [`authority`] | Roles, mutations, and who may perform them |
//! | [`model`] | Drawings, images, tokens, and snapshots |
//! | [`geometry`] | Bounds, move/resize targets, z-order swaps, token palette |
//! | [`surface`] | Pointer-to-surface coordinate mapping |
//! | [`input`] | Buttons, UI state, and the gesture controllers |
//! | [`hit`] | Hit-testing against images, handles, and tokens |
//! | [`error`] | Shared [`error::ErrorCode`] trait |
//! | [`consts`] | Surface size, minimum sizes, defaults, palette |

pub mod authority;
pub mod consts;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod hit;
pub mod input;
pub mod model;
pub mod store;
pub mod surface;
pub mod sync;
