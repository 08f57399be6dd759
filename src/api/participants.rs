//! Participant records and condition assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Patch;
use crate::persona::Persona;
use crate::types::{Participant, SYSTEM_SENDER};

const MAX_DISPLAY_NAME_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParticipantRequest {
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Identifier from the recruiting platform
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Trimmed display name, refusing names the room already uses for its own senders
fn validate_display_name(raw: &str) -> Result<&str, ApiError> {
    let display_name = raw.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("display_name is required".to_string()));
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "display_name must be at most {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    if Persona::from_name(display_name).is_some()
        || display_name.eq_ignore_ascii_case(SYSTEM_SENDER)
    {
        return Err(ApiError::BadRequest(format!(
            "display_name '{}' is reserved",
            display_name
        )));
    }
    Ok(display_name)
}

/// POST /api/participants
pub async fn create_participant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateParticipantRequest>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let display_name = validate_display_name(&req.display_name)?;

    let participant = state
        .create_participant(
            display_name.to_string(),
            req.avatar_url.filter(|url| !url.trim().is_empty()),
            req.external_id.filter(|id| !id.trim().is_empty()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

/// GET /api/participants/{id}
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Participant>, ApiError> {
    Ok(Json(state.store.get_participant(&id).await?))
}

/// PATCH /api/participants/{id}
///
/// A field value of `"increment"` adds one to a numeric counter and
/// `{"add": n}` adds `n`.
pub async fn patch_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Patch>,
) -> Result<Json<Participant>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("Patch has no fields".to_string()));
    }
    Ok(Json(state.store.patch_participant(&id, &patch).await?))
}

/// POST /api/participants/{id}/condition
pub async fn assign_condition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Participant>, ApiError> {
    Ok(Json(state.assign_condition(&id).await?))
}
