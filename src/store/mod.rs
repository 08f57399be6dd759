//! Persistence seam for participant, gameplay, survey and chat-log records.
//!
//! The service only needs create/get/patch semantics, so the backing store is
//! injected behind [`Store`]. [`MemoryStore`] is the bundled implementation.

mod memory;
mod patch;

pub use memory::MemoryStore;
pub use patch::{FieldPatch, Patch};

use crate::room::chat::ChatMirror;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{0}' cannot be changed")]
    ImmutableField(String),

    #[error("Field '{0}' is not a counter and cannot be incremented")]
    NotCounter(String),

    #[error("Counter '{0}' would overflow")]
    CounterOverflow(String),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Everything the store holds, for research export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub participants: Vec<Participant>,
    pub gameplay: Vec<Gameplay>,
    pub surveys: Vec<SurveyResponse>,
    pub chat_logs: Vec<ChatLog>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_participant(&self, participant: Participant) -> StoreResult<Participant>;

    async fn get_participant(&self, id: &str) -> StoreResult<Participant>;

    async fn patch_participant(&self, id: &str, patch: &Patch) -> StoreResult<Participant>;

    async fn insert_gameplay(&self, gameplay: Gameplay) -> StoreResult<Gameplay>;

    async fn get_gameplay(&self, id: &str) -> StoreResult<Gameplay>;

    async fn patch_gameplay(&self, id: &str, patch: &Patch) -> StoreResult<Gameplay>;

    async fn insert_survey(&self, survey: SurveyResponse) -> StoreResult<SurveyResponse>;

    /// Replace the participant's chat log with a newer snapshot
    async fn save_chat_log(&self, participant_id: &str, messages: Vec<ChatMessage>) -> StoreResult<ChatLog>;

    async fn snapshot(&self) -> StoreResult<StoreSnapshot>;
}

/// Mirrors room chat into the store's chat-log table
pub struct StoreMirror {
    store: Arc<dyn Store>,
}

impl StoreMirror {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatMirror for StoreMirror {
    async fn mirror(&self, participant_id: &str, messages: Vec<ChatMessage>) -> StoreResult<()> {
        self.store.save_chat_log(participant_id, messages).await?;
        Ok(())
    }
}
