//! HTTP and WebSocket routes onto a [`RunManager`](crate::manager::RunManager).
//!
//! Direct structural descendant of the teacher's `phago_web::routes::
//! create_router`: same API-routes-then-websocket-then-state layering,
//! generalized from one implicit run (the teacher's single `Colony`) to
//! many explicit ones addressed by `run_id`.

mod api;
mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::manager::RunManager;

/// Build the full router over a shared [`RunManager`]. `RunManager` is
/// `Clone` (an `Arc` around its registry), so it is used directly as axum
/// state rather than wrapped again.
pub fn build_router(manager: RunManager) -> Router {
    Router::new()
        .route("/sim/start", post(api::start))
        .route("/sim/stop", post(api::stop))
        .route("/sim/status", get(api::status))
        .route("/health", get(api::health))
        .route("/sim/stream/:run_id", get(ws::stream_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}
