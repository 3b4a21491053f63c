//! Routes for one peer's quest progression.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use questline_core::peer::PeerId;
use questline_quest::application::query_handlers::QuestLogView;
use questline_quest::domain::objective::ObjectiveKind;
use questline_session::application::{command_handlers, query_handlers};
use questline_session::domain::commands;

use crate::error::ApiError;
use crate::routes::CommandResponse;
use crate::state::AppState;

/// Request body for POST /quests/start and /quests/complete.
#[derive(Debug, Deserialize)]
pub struct QuestIndexRequest {
    /// Position of the quest in the sequence.
    pub quest_index: usize,
}

/// Request body for POST /progress.
#[derive(Debug, Deserialize)]
pub struct ReportProgressRequest {
    /// What kind of gameplay happened.
    pub kind: ObjectiveKind,
    /// What it happened to.
    pub target_id: String,
    /// How much progress it is worth.
    pub amount: u32,
}

/// Request body for POST /share.
#[derive(Debug, Deserialize)]
pub struct ShareProgressRequest {
    /// The peer receiving the snapshot.
    pub to: u32,
}

/// GET /peers/{peer_id}/quests
async fn get_quest_log(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
) -> Result<Json<QuestLogView>, ApiError> {
    let session = state.session()?;
    let view = query_handlers::get_quest_log(&session, PeerId(peer_id))?;
    Ok(Json(view))
}

/// GET /peers/{peer_id}/inventory
async fn get_inventory(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
) -> Result<Json<BTreeMap<String, u32>>, ApiError> {
    let session = state.session()?;
    let items = query_handlers::get_inventory(&session, PeerId(peer_id))?;
    Ok(Json(items))
}

/// POST /peers/{peer_id}/quests/start
#[instrument(skip(state, request), fields(quest_index = request.quest_index))]
async fn start_quest(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
    Json(request): Json<QuestIndexRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::StartQuest {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        quest_index: request.quest_index,
    };

    info!(correlation_id = %command.correlation_id, "handling start_quest command");

    let mut session = state.session()?;
    let result = command_handlers::handle_start_quest(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// POST /peers/{peer_id}/quests/complete
#[instrument(skip(state, request), fields(quest_index = request.quest_index))]
async fn complete_quest(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
    Json(request): Json<QuestIndexRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CompleteQuest {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        quest_index: request.quest_index,
    };

    info!(correlation_id = %command.correlation_id, "handling complete_quest command");

    let mut session = state.session()?;
    let result = command_handlers::handle_complete_quest(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// POST /peers/{peer_id}/progress
#[instrument(skip(state, request), fields(kind = ?request.kind, target_id = %request.target_id))]
async fn report_progress(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
    Json(request): Json<ReportProgressRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ReportProgress {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        kind: request.kind,
        target_id: request.target_id,
        amount: request.amount,
    };

    info!(correlation_id = %command.correlation_id, "handling report_progress command");

    let mut session = state.session()?;
    let result = command_handlers::handle_report_progress(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// POST /peers/{peer_id}/areas/{area_id}/enter
#[instrument(skip(state))]
async fn enter_area(
    State(state): State<AppState>,
    Path((peer_id, area_id)): Path<(u32, String)>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EnterArea {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        area_id,
    };

    let mut session = state.session()?;
    let result = command_handlers::handle_enter_area(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// POST /peers/{peer_id}/areas/{area_id}/exit
#[instrument(skip(state))]
async fn exit_area(
    State(state): State<AppState>,
    Path((peer_id, area_id)): Path<(u32, String)>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ExitArea {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        area_id,
    };

    let mut session = state.session()?;
    let result = command_handlers::handle_exit_area(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// POST /peers/{peer_id}/share
#[instrument(skip(state, request), fields(to = request.to))]
async fn share_progress(
    State(state): State<AppState>,
    Path(peer_id): Path<u32>,
    Json(request): Json<ShareProgressRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ShareProgress {
        correlation_id: Uuid::new_v4(),
        peer_id: PeerId(peer_id),
        to: PeerId(request.to),
    };

    let mut session = state.session()?;
    let result = command_handlers::handle_share_progress(&command, &mut session)?;

    Ok(Json(CommandResponse::from_events(&result.events)))
}

/// Returns the router for per-peer progression.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/peers/{peer_id}/quests", get(get_quest_log))
        .route("/peers/{peer_id}/quests/start", post(start_quest))
        .route("/peers/{peer_id}/quests/complete", post(complete_quest))
        .route("/peers/{peer_id}/progress", post(report_progress))
        .route("/peers/{peer_id}/areas/{area_id}/enter", post(enter_area))
        .route("/peers/{peer_id}/areas/{area_id}/exit", post(exit_area))
        .route("/peers/{peer_id}/share", post(share_progress))
        .route("/peers/{peer_id}/inventory", get(get_inventory))
}
