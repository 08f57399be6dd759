//! Word-association game endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::game::leaderboard::LeaderboardEntry;
use crate::game::{AnswerOutcome, GameView};
use crate::state::AppState;
use crate::types::{Gameplay, ParticipantId};

#[derive(Debug, Clone, Deserialize)]
pub struct StartGameRequest {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

/// POST /api/game/start
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartGameRequest>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let view = state.start_game(&req.participant_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/game/{id}
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GameView>, ApiError> {
    Ok(Json(state.game_view(&id).await?))
}

/// POST /api/game/{id}/answer
pub async fn answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    Ok(Json(state.answer_cue(&id, &req.answer).await?))
}

/// POST /api/game/{id}/skip
pub async fn skip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    Ok(Json(state.skip_cue(&id).await?))
}

/// POST /api/game/{id}/finish
pub async fn finish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Gameplay>, ApiError> {
    Ok(Json(state.finish_game(&id).await?))
}

/// GET /api/game/{id}/leaderboard
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.leaderboard(&id).await?))
}
