//! Gameplay, survey and chat-log persistence endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Patch;
use crate::types::*;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGameplayRequest {
    pub participant_id: ParticipantId,
    /// Defaults to the participant's assigned condition
    #[serde(default)]
    pub condition: Option<Condition>,
}

/// POST /api/gameplay
pub async fn create_gameplay(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGameplayRequest>,
) -> Result<(StatusCode, Json<Gameplay>), ApiError> {
    let participant = state.store.get_participant(&req.participant_id).await?;
    let condition = req.condition.or(participant.condition).ok_or_else(|| {
        ApiError::Conflict(format!(
            "Participant '{}' has no condition assigned",
            participant.id
        ))
    })?;

    let gameplay = Gameplay {
        id: ulid::Ulid::new().to_string(),
        participant_id: participant.id,
        condition,
        started_at: Utc::now(),
        ended_at: None,
        score: 0,
        answered: 0,
        correct: 0,
        skipped: 0,
        answers: Vec::new(),
    };
    let gameplay = state.store.insert_gameplay(gameplay).await?;
    Ok((StatusCode::CREATED, Json(gameplay)))
}

/// PATCH /api/gameplay/{id}
pub async fn patch_gameplay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Patch>,
) -> Result<Json<Gameplay>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("Patch has no fields".to_string()));
    }
    Ok(Json(state.store.patch_gameplay(&id, &patch).await?))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyRequest {
    pub participant_id: ParticipantId,
    pub instrument: String,
    pub answers: BTreeMap<String, Value>,
}

/// Null, blank strings and empty arrays count as unanswered
fn is_unanswered(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// POST /api/surveys
pub async fn submit_survey(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SurveyRequest>,
) -> Result<(StatusCode, Json<SurveyResponse>), ApiError> {
    if req.instrument.trim().is_empty() {
        return Err(ApiError::BadRequest("instrument is required".to_string()));
    }
    if req.answers.is_empty() {
        return Err(ApiError::BadRequest("answers are required".to_string()));
    }
    let missing: Vec<&str> = req
        .answers
        .iter()
        .filter(|(_, value)| is_unanswered(value))
        .map(|(key, _)| key.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing answers: {}",
            missing.join(", ")
        )));
    }

    let survey = SurveyResponse {
        id: ulid::Ulid::new().to_string(),
        participant_id: req.participant_id,
        instrument: req.instrument.trim().to_string(),
        answers: req.answers,
        submitted_at: Utc::now(),
    };
    let survey = state.store.insert_survey(survey).await?;
    tracing::info!(
        participant_id = %survey.participant_id,
        instrument = %survey.instrument,
        "Survey submitted"
    );
    Ok((StatusCode::CREATED, Json(survey)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatLogRequest {
    pub participant_id: ParticipantId,
    pub messages: Vec<ChatMessage>,
}

/// POST /api/chat-logs
pub async fn save_chat_log(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatLogRequest>,
) -> Result<Json<ChatLog>, ApiError> {
    if !state.participant_exists(&req.participant_id).await? {
        return Err(ApiError::NotFound(format!(
            "participant '{}' not found",
            req.participant_id
        )));
    }
    Ok(Json(
        state
            .store
            .save_chat_log(&req.participant_id, req.messages)
            .await?,
    ))
}
