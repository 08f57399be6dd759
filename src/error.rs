//! HTTP-facing error type shared by every API handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::game::GameError;
use crate::llm::LlmError;
use crate::room::RoomError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Refused for this participant; carries its own client code
    #[error("{1}")]
    Forbidden(&'static str, String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotConfigured(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Forbidden(code, _) => *code,
            ApiError::Conflict(_) => "conflict",
            ApiError::NotConfigured(_) => "not_configured",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::UnknownField(_)
            | StoreError::ImmutableField(_)
            | StoreError::NotCounter(_)
            | StoreError::InvalidPatch(_) => ApiError::BadRequest(e.to_string()),
            StoreError::CounterOverflow(_) => ApiError::Conflict(e.to_string()),
            StoreError::Unavailable(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ConfigError(_) => ApiError::NotConfigured(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(e: RoomError) -> Self {
        match e {
            RoomError::EmptyMessage => ApiError::BadRequest(e.to_string()),
            RoomError::Vote(crate::room::vote::VoteError::UnknownOption(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            RoomError::Closed | RoomError::Vote(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::NotFound(_) => ApiError::NotFound(e.to_string()),
            GameError::EmptyAnswer => ApiError::BadRequest(e.to_string()),
            GameError::Finished | GameError::NoCondition(_) => ApiError::Conflict(e.to_string()),
            GameError::ConditionPrivate => {
                ApiError::Forbidden("condition_private", e.to_string())
            }
            GameError::Store(inner) => inner.into(),
        }
    }
}
