//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the saved-sketch REST API and the per-room websocket
//! relay under a single Axum router.

pub mod sketches;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/sketches", get(sketches::list_sketches).post(sketches::create_sketch))
        .route(
            "/api/sketches/{id}",
            get(sketches::get_sketch)
                .patch(sketches::update_sketch)
                .delete(sketches::delete_sketch),
        )
        .route("/api/rooms/{room_id}/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
