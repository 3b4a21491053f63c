//! Routes for area quorum read models.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use questline_core::error::DomainError;
use questline_core::peer::PeerId;
use questline_presence::domain::area::QuorumView;
use questline_session::application::query_handlers;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for GET /areas/{area_id}.
#[derive(Debug, Deserialize)]
pub struct AreaQuery {
    /// Whose view of the area to read. Defaults to the authority.
    pub peer_id: Option<u32>,
}

/// GET /areas/{area_id}
async fn get_area(
    State(state): State<AppState>,
    Path(area_id): Path<String>,
    Query(query): Query<AreaQuery>,
) -> Result<Json<QuorumView>, ApiError> {
    let session = state.session()?;
    let peer = match query.peer_id {
        Some(id) => PeerId(id),
        None => session
            .authority()
            .ok_or_else(|| DomainError::Validation("session has no peers".into()))?,
    };
    let view = query_handlers::get_area(&session, peer, &area_id)?;
    Ok(Json(view))
}

/// Returns the router for area read models.
pub fn router() -> Router<AppState> {
    Router::new().route("/areas/{area_id}", get(get_area))
}
