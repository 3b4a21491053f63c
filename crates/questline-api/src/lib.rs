//! Questline API — HTTP surface over a multiplayer quest session.
//!
//! Every request locks the shared [`Session`](questline_session::application::session::Session),
//! runs one command or query against it and, for mutations, pumps the
//! session until every peer has processed the consequences.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::peers::router())
        .nest("/api/v1", routes::quests::router())
        .nest("/api/v1", routes::areas::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
