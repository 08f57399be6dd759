//! Research data export.
//!
//! A single JSON document with every persisted record, for analysis after a
//! collection session.

use super::AppState;
use crate::store::{StoreResult, StoreSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Schema version for export format compatibility
/// Version 1: participants, gameplay, surveys, chat logs
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyExport {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    /// Export timestamp (ISO8601)
    pub exported_at: String,
    #[serde(flatten)]
    pub data: StoreSnapshot,
}

impl StudyExport {
    pub fn new(data: StoreSnapshot) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Check that every record points at an exported participant
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Export schema version {} is newer than supported version {}",
                self.schema_version, EXPORT_SCHEMA_VERSION
            ));
        }

        let participants: HashSet<&str> = self
            .data
            .participants
            .iter()
            .map(|p| p.id.as_str())
            .collect();

        for gameplay in &self.data.gameplay {
            if !participants.contains(gameplay.participant_id.as_str()) {
                return Err(format!(
                    "Gameplay '{}' references participant '{}' which doesn't exist",
                    gameplay.id, gameplay.participant_id
                ));
            }
        }

        for survey in &self.data.surveys {
            if !participants.contains(survey.participant_id.as_str()) {
                return Err(format!(
                    "Survey '{}' references participant '{}' which doesn't exist",
                    survey.id, survey.participant_id
                ));
            }
        }

        for log in &self.data.chat_logs {
            if !participants.contains(log.participant_id.as_str()) {
                return Err(format!(
                    "Chat log references participant '{}' which doesn't exist",
                    log.participant_id
                ));
            }
        }

        Ok(())
    }
}

impl AppState {
    pub async fn export_study(&self) -> StoreResult<StudyExport> {
        let export = StudyExport::new(self.store.snapshot().await?);
        if let Err(e) = export.validate() {
            tracing::warn!("Exported data is inconsistent: {}", e);
        }

        tracing::info!(
            participants = export.data.participants.len(),
            gameplay = export.data.gameplay.len(),
            surveys = export.data.surveys.len(),
            chat_logs = export.data.chat_logs.len(),
            "Study data exported"
        );
        Ok(export)
    }
}
