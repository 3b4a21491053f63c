//! Routes for session membership and the authority token.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use questline_core::peer::PeerId;
use questline_session::application::query_handlers::{self, SessionView};
use questline_session::application::session::JoinOptions;

use crate::error::ApiError;
use crate::routes::CommandResponse;
use crate::state::AppState;

/// Request body for POST /peers.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// The joining peer.
    pub peer_id: u32,
    /// Whether the peer runs a progress relay (default true).
    #[serde(default = "default_relay")]
    pub relay: bool,
    /// Distinct item slots in the peer's reward ledger (absent = unlimited).
    #[serde(default)]
    pub reward_slots: Option<usize>,
}

fn default_relay() -> bool {
    true
}

/// Query string for DELETE /peers/{peer_id}.
#[derive(Debug, Deserialize)]
pub struct LeaveQuery {
    /// Whether the peer clears its presence before disconnecting.
    #[serde(default)]
    pub graceful: bool,
}

/// Request body for POST /authority.
#[derive(Debug, Deserialize)]
pub struct MigrateAuthorityRequest {
    /// The new authority holder.
    pub peer_id: u32,
}

/// POST /peers
#[instrument(skip(state, request), fields(peer_id = request.peer_id))]
async fn join_peer(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let options = JoinOptions {
        relay: request.relay,
        reward_slots: request.reward_slots,
    };
    let mut session = state.session()?;
    session.join_with(PeerId(request.peer_id), options)?;
    let events = session.pump()?;
    info!(relay = options.relay, "peer joined over http");

    Ok((StatusCode::CREATED, Json(CommandResponse::from_events(&events))))
}

/// DELETE /peers/{peer_id}
#[instrument(skip(state))]
async fn leave_peer(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
    Query(query): Query<LeaveQuery>,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut session = state.session()?;
    session.leave(PeerId(peer_id), query.graceful)?;
    let events = session.pump()?;

    Ok(Json(CommandResponse::from_events(&events)))
}

/// POST /authority
#[instrument(skip(state, request), fields(peer_id = request.peer_id))]
async fn migrate_authority(
    State(state): State<AppState>,
    Json(request): Json<MigrateAuthorityRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut session = state.session()?;
    session.migrate_authority(PeerId(request.peer_id))?;
    let events = session.pump()?;

    Ok(Json(CommandResponse::from_events(&events)))
}

/// GET /session
async fn get_session(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let session = state.session()?;
    Ok(Json(query_handlers::get_session(&session)))
}

/// Returns the router for membership and authority.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/peers", post(join_peer))
        .route("/peers/{peer_id}", delete(leave_peer))
        .route("/authority", post(migrate_authority))
        .route("/session", get(get_session))
}
