use super::*;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store; contents live as long as the server
#[derive(Default)]
pub struct MemoryStore {
    participants: RwLock<HashMap<ParticipantId, Participant>>,
    gameplay: RwLock<HashMap<GameplayId, Gameplay>>,
    surveys: RwLock<Vec<SurveyResponse>>,
    chat_logs: RwLock<HashMap<ParticipantId, ChatLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_participant(&self, participant: Participant) -> StoreResult<Participant> {
        self.participants
            .write()
            .await
            .insert(participant.id.clone(), participant.clone());
        Ok(participant)
    }

    async fn get_participant(&self, id: &str) -> StoreResult<Participant> {
        self.participants
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("participant", id))
    }

    async fn patch_participant(&self, id: &str, patch: &Patch) -> StoreResult<Participant> {
        let mut participants = self.participants.write().await;
        let participant = participants
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("participant", id))?;

        *participant = patch.apply(&*participant)?;
        Ok(participant.clone())
    }

    async fn insert_gameplay(&self, gameplay: Gameplay) -> StoreResult<Gameplay> {
        if !self
            .participants
            .read()
            .await
            .contains_key(&gameplay.participant_id)
        {
            return Err(StoreError::not_found("participant", &gameplay.participant_id));
        }

        self.gameplay
            .write()
            .await
            .insert(gameplay.id.clone(), gameplay.clone());
        Ok(gameplay)
    }

    async fn get_gameplay(&self, id: &str) -> StoreResult<Gameplay> {
        self.gameplay
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("gameplay", id))
    }

    async fn patch_gameplay(&self, id: &str, patch: &Patch) -> StoreResult<Gameplay> {
        let mut gameplay = self.gameplay.write().await;
        let record = gameplay
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("gameplay", id))?;

        *record = patch.apply(&*record)?;
        Ok(record.clone())
    }

    async fn insert_survey(&self, survey: SurveyResponse) -> StoreResult<SurveyResponse> {
        if !self
            .participants
            .read()
            .await
            .contains_key(&survey.participant_id)
        {
            return Err(StoreError::not_found("participant", &survey.participant_id));
        }

        self.surveys.write().await.push(survey.clone());
        Ok(survey)
    }

    async fn save_chat_log(&self, participant_id: &str, messages: Vec<ChatMessage>) -> StoreResult<ChatLog> {
        let mut logs = self.chat_logs.write().await;

        // Mirrors run concurrently; the log only grows, so never replace a longer copy
        if let Some(existing) = logs.get(participant_id) {
            if existing.messages.len() > messages.len() {
                return Ok(existing.clone());
            }
        }

        let log = ChatLog {
            participant_id: participant_id.to_string(),
            messages,
            updated_at: Utc::now(),
        };
        logs.insert(participant_id.to_string(), log.clone());
        Ok(log)
    }

    async fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let mut participants: Vec<_> = self.participants.read().await.values().cloned().collect();
        participants.sort_by_key(|p| p.created_at);

        let mut gameplay: Vec<_> = self.gameplay.read().await.values().cloned().collect();
        gameplay.sort_by_key(|g| g.started_at);

        let surveys = self.surveys.read().await.clone();

        let mut chat_logs: Vec<_> = self.chat_logs.read().await.values().cloned().collect();
        chat_logs.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));

        Ok(StoreSnapshot {
            participants,
            gameplay,
            surveys,
            chat_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn store_with_participant() -> (MemoryStore, Participant) {
        let store = MemoryStore::new();
        let participant = store
            .insert_participant(Participant::new("Sam".to_string(), None, None))
            .await
            .unwrap();
        (store, participant)
    }

    fn message(id: u64, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender: "Sam".to_string(),
            text: text.to_string(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_participant_roundtrip_and_patch() {
        let (store, participant) = store_with_participant().await;

        let fetched = store.get_participant(&participant.id).await.unwrap();
        assert_eq!(fetched, participant);

        let patched = store
            .patch_participant(
                &participant.id,
                &Patch::new().increment("leaderboard_views").set("completed", true),
            )
            .await
            .unwrap();
        assert_eq!(patched.leaderboard_views, 1);
        assert!(patched.completed);
    }

    #[tokio::test]
    async fn test_failed_patch_leaves_record_untouched() {
        let (store, participant) = store_with_participant().await;

        let result = store
            .patch_participant(
                &participant.id,
                &Patch::new().increment("plays").set("nope", json!(1)),
            )
            .await;
        assert!(matches!(result, Err(StoreError::UnknownField(_))));

        let fetched = store.get_participant(&participant.id).await.unwrap();
        assert_eq!(fetched.plays, 0);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_participant("nobody").await,
            Err(StoreError::NotFound { kind: "participant", .. })
        ));

        let survey = SurveyResponse {
            id: "s1".to_string(),
            participant_id: "nobody".to_string(),
            instrument: "demographics".to_string(),
            answers: BTreeMap::new(),
            submitted_at: Utc::now(),
        };
        assert!(store.insert_survey(survey).await.is_err());
    }

    #[tokio::test]
    async fn test_chat_log_keeps_longest_snapshot() {
        let (store, participant) = store_with_participant().await;

        let long = vec![message(1, "a"), message(2, "b")];
        let short = vec![message(1, "a")];

        store.save_chat_log(&participant.id, long).await.unwrap();
        let kept = store.save_chat_log(&participant.id, short).await.unwrap();
        assert_eq!(kept.messages.len(), 2);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.chat_logs.len(), 1);
        assert_eq!(snapshot.chat_logs[0].messages.len(), 2);
        assert_eq!(snapshot.participants.len(), 1);
    }
}
