use super::AppState;
use crate::error::ApiError;
use crate::game::leaderboard::{self, LeaderboardEntry};
use crate::game::{AnswerOutcome, GameError, GameSession, GameView};
use crate::store::{Patch, StoreError};
use crate::types::*;
use serde_json::json;
use std::time::Duration;

/// How long an expired, never-finished session is kept in memory
const ABANDONED_GRACE: Duration = Duration::from_secs(600);

impl AppState {
    /// Start a word-association session and persist its gameplay record
    pub async fn start_game(&self, participant_id: &str) -> Result<GameView, ApiError> {
        let participant = self.store.get_participant(participant_id).await?;
        let condition = participant
            .condition
            .ok_or_else(|| GameError::NoCondition(participant.id.clone()))?;

        let session = {
            let mut rng = rand::rng();
            GameSession::new(&participant, condition, &self.game_config, &mut rng)
        };
        self.store.insert_gameplay(session.to_gameplay()).await?;

        let view = session.view();
        {
            let mut games = self.games.write().await;
            // Abandoned plays keep their started record in the store
            games.retain(|id, session| {
                let abandoned = session.is_abandoned(ABANDONED_GRACE);
                if abandoned {
                    tracing::debug!(game_id = %id, "Dropping abandoned game session");
                }
                !abandoned
            });
            games.insert(session.id.clone(), session);
        }

        tracing::info!(participant_id, game_id = %view.game_id, condition = ?condition, "Game started");
        Ok(view)
    }

    pub async fn game_view(&self, game_id: &str) -> Result<GameView, GameError> {
        let live = self.games.read().await.get(game_id).map(GameSession::view);
        match live {
            Some(view) => Ok(view),
            None => Ok(GameView::closed(&self.stored_gameplay(game_id).await?)),
        }
    }

    pub async fn answer_cue(&self, game_id: &str, text: &str) -> Result<AnswerOutcome, GameError> {
        {
            let mut games = self.games.write().await;
            if let Some(session) = games.get_mut(game_id) {
                let mut rng = rand::rng();
                return session.answer(text, &mut rng);
            }
        }
        Err(self.missing_session(game_id).await)
    }

    pub async fn skip_cue(&self, game_id: &str) -> Result<AnswerOutcome, GameError> {
        {
            let mut games = self.games.write().await;
            if let Some(session) = games.get_mut(game_id) {
                let mut rng = rand::rng();
                return session.skip(&mut rng);
            }
        }
        Err(self.missing_session(game_id).await)
    }

    /// Close the session, persist the final record and roll up the participant totals.
    ///
    /// The session leaves memory only once both writes succeed; on a store
    /// failure it is reopened so the same call can be retried.
    pub async fn finish_game(&self, game_id: &str) -> Result<Gameplay, ApiError> {
        let closing = self.games.write().await.get_mut(game_id).map(|session| {
            if session.is_finished() {
                Err(GameError::Finished)
            } else {
                Ok(session.finish())
            }
        });
        let record = match closing {
            Some(result) => result?,
            None => return Err(self.missing_session(game_id).await.into()),
        };

        match self.persist_finished(&record).await {
            Ok(saved) => {
                self.games.write().await.remove(game_id);
                tracing::info!(
                    participant_id = %saved.participant_id,
                    game_id,
                    score = saved.score,
                    correct = saved.correct,
                    skipped = saved.skipped,
                    "Game finished"
                );
                Ok(saved)
            }
            Err(e) => {
                if let Some(session) = self.games.write().await.get_mut(game_id) {
                    session.reopen();
                }
                tracing::warn!(game_id, "Failed to save finished game, session reopened: {}", e);
                Err(e)
            }
        }
    }

    async fn persist_finished(&self, record: &Gameplay) -> Result<Gameplay, ApiError> {
        let patch = Patch::new()
            .set("ended_at", json!(record.ended_at))
            .set("score", record.score)
            .set("answered", record.answered)
            .set("correct", record.correct)
            .set("skipped", record.skipped)
            .set("answers", json!(record.answers));
        let saved = self.store.patch_gameplay(&record.id, &patch).await?;

        // Added under the store's lock so concurrent finishes both count
        let totals = Patch::new()
            .increment("plays")
            .add("total_score", saved.score)
            .add("skips", saved.skipped);
        self.store
            .patch_participant(&saved.participant_id, &totals)
            .await?;
        Ok(saved)
    }

    /// Public-condition leaderboard; every view is counted
    pub async fn leaderboard(&self, game_id: &str) -> Result<Vec<LeaderboardEntry>, GameError> {
        let live = self.games.read().await.get(game_id).map(|session| {
            (
                session.participant_id.clone(),
                session.display_name.clone(),
                session.condition,
                session.score(),
            )
        });
        let (participant_id, display_name, condition, score) = match live {
            Some(entry) => entry,
            None => {
                let record = self.stored_gameplay(game_id).await?;
                let participant = self.store.get_participant(&record.participant_id).await?;
                (participant.id, participant.display_name, record.condition, record.score)
            }
        };

        if condition == Condition::Private {
            return Err(GameError::ConditionPrivate);
        }

        self.track(&participant_id, Patch::new().increment("leaderboard_views"))
            .await;
        Ok(leaderboard::build(&display_name, score))
    }

    /// Record of a play that is no longer held in memory
    async fn stored_gameplay(&self, game_id: &str) -> Result<Gameplay, GameError> {
        match self.store.get_gameplay(game_id).await {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound { .. }) => Err(GameError::NotFound(game_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Known plays without a live session are over
    async fn missing_session(&self, game_id: &str) -> GameError {
        match self.stored_gameplay(game_id).await {
            Ok(_) => GameError::Finished,
            Err(e) => e,
        }
    }
}
