//! Stateless persona reply endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::persona::{HistoryEntry, Persona};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub persona_name: String,
    #[serde(default)]
    pub chat_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub reply_counts: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
}

/// Generate one persona reply.
///
/// POST /api/chat
///
/// Fails with 500 when no LLM provider is configured.
pub async fn generate_reply(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let persona = Persona::from_name(&req.persona_name).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown persona '{}'", req.persona_name))
    })?;
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }

    let generator = state.generator.as_ref().ok_or_else(|| {
        ApiError::NotConfigured("No text generation provider is configured".to_string())
    })?;

    let message = generator
        .reply(persona, &req.message, &req.chat_history, &req.reply_counts)
        .await?;

    Ok(Json(ChatResponse {
        success: true,
        message,
    }))
}
