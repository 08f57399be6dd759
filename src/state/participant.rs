use super::AppState;
use crate::store::{Patch, StoreError, StoreResult};
use crate::types::*;
use rand::seq::IndexedRandom;

impl AppState {
    pub async fn create_participant(
        &self,
        display_name: String,
        avatar_url: Option<String>,
        external_id: Option<String>,
    ) -> StoreResult<Participant> {
        let participant = self
            .store
            .insert_participant(Participant::new(display_name, avatar_url, external_id))
            .await?;
        tracing::info!(participant_id = %participant.id, "Created participant");
        Ok(participant)
    }

    /// Randomly assign a study condition once; repeated calls return the same one.
    ///
    /// Persisting the assignment is retried on a fixed delay until the store
    /// accepts it. Only a missing participant or an invalid patch stops the loop.
    pub async fn assign_condition(&self, participant_id: &str) -> StoreResult<Participant> {
        let participant = self.store.get_participant(participant_id).await?;
        if participant.condition.is_some() {
            return Ok(participant);
        }

        let condition = {
            let mut rng = rand::rng();
            *Condition::ALL
                .choose(&mut rng)
                .unwrap_or(&Condition::Private)
        };
        let patch = Patch::new().set("condition", serde_json::json!(condition));

        let mut attempt = 1u32;
        loop {
            match self.store.patch_participant(participant_id, &patch).await {
                Ok(updated) => {
                    tracing::info!(
                        participant_id,
                        condition = ?condition,
                        attempt,
                        "Assigned condition"
                    );
                    return Ok(updated);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        participant_id,
                        attempt,
                        retry_in_ms = self.condition_retry_delay.as_millis() as u64,
                        "Failed to persist condition, retrying: {}",
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.condition_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Counter update that must never fail the caller
    pub(crate) async fn track(&self, participant_id: &str, patch: Patch) {
        if let Err(e) = self.store.patch_participant(participant_id, &patch).await {
            tracing::warn!(participant_id, "Failed to update participant counters: {}", e);
        }
    }

    pub async fn participant_exists(&self, participant_id: &str) -> StoreResult<bool> {
        match self.store.get_participant(participant_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
