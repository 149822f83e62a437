//! Router assembly for the dataflow notebook HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. Cell path segments accept
/// short or long cell ids.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route(
            "/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route("/sessions/{id}", delete(handlers::sessions::delete_session))
        .route(
            "/sessions/{id}/backend",
            put(handlers::sessions::attach_backend).delete(handlers::sessions::detach_backend),
        )
        .route("/sessions/{id}/run", post(handlers::cells::run_cells))
        .route("/sessions/{id}/dirty", get(handlers::cells::dirty_cells))
        // Cells
        .route("/sessions/{id}/cells", post(handlers::cells::register_cell))
        .route(
            "/sessions/{id}/cells/{cell}",
            get(handlers::cells::get_cell).delete(handlers::cells::delete_cell),
        )
        .route(
            "/sessions/{id}/cells/{cell}/code",
            put(handlers::cells::update_code),
        )
        .route(
            "/sessions/{id}/cells/{cell}/execute",
            post(handlers::cells::execute_cell),
        )
        // Dependency views
        .route("/sessions/{id}/graph", get(handlers::graph::get_graph))
        .route("/sessions/{id}/views", get(handlers::views::view_events))
        .route(
            "/sessions/{id}/cells/{cell}/upstream",
            get(handlers::graph::upstream),
        )
        .route(
            "/sessions/{id}/cells/{cell}/downstream",
            get(handlers::graph::downstream),
        )
        .route(
            "/sessions/{id}/cells/{cell}/changed",
            post(handlers::graph::mark_changed),
        )
        .route(
            "/sessions/{id}/cells/{cell}/reverted",
            post(handlers::graph::revert_changed),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
