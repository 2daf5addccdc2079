//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the live rooms and the saved-sketch repository. Each room keeps
//! the latest authoritative snapshot, the participant holding the master
//! seat, and one outbound channel per connection. Rooms live only while a
//! connection is open.

use std::collections::HashMap;
use std::sync::Arc;

use sketch::authority::Actor;
use sketch::model::SketchSnapshot;
use sketch::sync::Envelope;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::services::sketches::SketchRepository;

// =============================================================================
// ROOM STATE
// =============================================================================

/// One open websocket in a room.
#[derive(Debug, Clone)]
pub struct RoomClient {
    pub actor: Actor,
    pub tx: mpsc::Sender<Envelope>,
}

/// Per-room live state.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Last accepted `sketchUpdate`, with later `tokenUpdate`s folded in.
    pub snapshot: Option<SketchSnapshot>,
    /// Participant id holding the master seat.
    pub master: Option<Uuid>,
    /// Connected clients keyed by connection id.
    pub clients: HashMap<Uuid, RoomClient>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<Uuid, RoomState>>>,
    pub sketches: Arc<dyn SketchRepository>,
    pub config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(sketches: Arc<dyn SketchRepository>, config: ServerConfig) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), sketches, config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
