//! The word-association task played after the waiting room.
//!
//! A [`GameSession`] holds the counters for one play-through in memory; the
//! persisted [`Gameplay`] record is written when it starts and patched when it
//! finishes.

pub mod leaderboard;
pub mod words;

use crate::types::*;
use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use words::{Cue, CUE_BANK};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Game session '{0}' not found")]
    NotFound(String),

    #[error("Answer cannot be empty")]
    EmptyAnswer,

    #[error("Game session has finished")]
    Finished,

    #[error("Leaderboard is not available in this condition")]
    ConditionPrivate,

    #[error("Participant '{0}' has no condition assigned")]
    NoCondition(String),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Length of one play-through
    pub round_duration: Duration,
    pub points_per_correct: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(180),
            points_per_correct: 10,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let round_duration = std::env::var("GAME_ROUND_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.round_duration);
        let points_per_correct = std::env::var("GAME_POINTS_PER_CORRECT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.points_per_correct);

        tracing::info!(
            round_secs = round_duration.as_secs(),
            points_per_correct,
            "Game config loaded"
        );

        Self {
            round_duration,
            points_per_correct,
        }
    }
}

/// Result of answering or skipping one cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// None for a skip
    pub correct: Option<bool>,
    pub score: u32,
    pub next_cue: Option<String>,
    pub remaining_secs: u64,
    pub finished: bool,
}

/// Client view of a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: GameplayId,
    pub condition: Condition,
    pub cue: Option<String>,
    pub score: u32,
    pub correct: u32,
    pub skipped: u32,
    pub remaining_secs: u64,
    pub finished: bool,
}

impl GameView {
    /// View of a play that is only left in the store
    pub fn closed(record: &Gameplay) -> Self {
        Self {
            game_id: record.id.clone(),
            condition: record.condition,
            cue: None,
            score: record.score,
            correct: record.correct,
            skipped: record.skipped,
            remaining_secs: 0,
            finished: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: GameplayId,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub condition: Condition,
    started_at: chrono::DateTime<Utc>,
    started: Instant,
    duration: Duration,
    points_per_correct: u32,
    current: Option<usize>,
    used: Vec<usize>,
    score: u32,
    answered: u32,
    correct: u32,
    skipped: u32,
    answers: Vec<AnswerRecord>,
    finished: bool,
}

impl GameSession {
    pub fn new<R: Rng + ?Sized>(
        participant: &Participant,
        condition: Condition,
        config: &GameConfig,
        rng: &mut R,
    ) -> Self {
        let mut session = Self {
            id: ulid::Ulid::new().to_string(),
            participant_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            condition,
            started_at: Utc::now(),
            started: Instant::now(),
            duration: config.round_duration,
            points_per_correct: config.points_per_correct,
            current: None,
            used: Vec::new(),
            score: 0,
            answered: 0,
            correct: 0,
            skipped: 0,
            answers: Vec::new(),
            finished: false,
        };
        session.draw_cue(rng);
        session
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_cue(&self) -> Option<&'static Cue> {
        self.current.map(|i| &CUE_BANK[i])
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Over once finished, out of time, or out of cues
    pub fn is_over(&self) -> bool {
        self.finished || self.is_expired() || self.current.is_none()
    }

    pub fn view(&self) -> GameView {
        GameView {
            game_id: self.id.clone(),
            condition: self.condition,
            cue: self.current_cue().map(|c| c.word.to_string()),
            score: self.score,
            correct: self.correct,
            skipped: self.skipped,
            remaining_secs: self.remaining().as_secs(),
            finished: self.is_over(),
        }
    }

    pub fn answer<R: Rng + ?Sized>(&mut self, text: &str, rng: &mut R) -> Result<AnswerOutcome, GameError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::EmptyAnswer);
        }
        let cue = self.active_cue()?;

        let correct = cue.accepts(text);
        self.answered += 1;
        if correct {
            self.correct += 1;
            self.score += self.points_per_correct;
        }
        self.answers.push(AnswerRecord {
            cue: cue.word.to_string(),
            answer: Some(text.to_string()),
            correct,
            at: Utc::now(),
        });

        self.draw_cue(rng);
        Ok(self.outcome(Some(correct)))
    }

    pub fn skip<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<AnswerOutcome, GameError> {
        let cue = self.active_cue()?;

        self.skipped += 1;
        self.answers.push(AnswerRecord {
            cue: cue.word.to_string(),
            answer: None,
            correct: false,
            at: Utc::now(),
        });

        self.draw_cue(rng);
        Ok(self.outcome(None))
    }

    /// Close the session and return the final record
    pub fn finish(&mut self) -> Gameplay {
        self.finished = true;
        let mut record = self.to_gameplay();
        record.ended_at = Some(Utc::now());
        record
    }

    /// Undo [`GameSession::finish`] when the final record could not be saved
    pub fn reopen(&mut self) {
        self.finished = false;
    }

    /// Never finished and out of time for longer than `grace`
    pub fn is_abandoned(&self, grace: Duration) -> bool {
        !self.finished && self.started.elapsed() >= self.duration + grace
    }

    pub fn to_gameplay(&self) -> Gameplay {
        Gameplay {
            id: self.id.clone(),
            participant_id: self.participant_id.clone(),
            condition: self.condition,
            started_at: self.started_at,
            ended_at: None,
            score: self.score,
            answered: self.answered,
            correct: self.correct,
            skipped: self.skipped,
            answers: self.answers.clone(),
        }
    }

    fn active_cue(&self) -> Result<&'static Cue, GameError> {
        if self.finished || self.is_expired() {
            return Err(GameError::Finished);
        }
        self.current_cue().ok_or(GameError::Finished)
    }

    fn outcome(&self, correct: Option<bool>) -> AnswerOutcome {
        AnswerOutcome {
            correct,
            score: self.score,
            next_cue: self.current_cue().map(|c| c.word.to_string()),
            remaining_secs: self.remaining().as_secs(),
            finished: self.is_over(),
        }
    }

    fn draw_cue<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let unused: Vec<usize> = (0..CUE_BANK.len())
            .filter(|i| !self.used.contains(i))
            .collect();
        self.current = unused.choose(rng).copied();
        if let Some(i) = self.current {
            self.used.push(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> (GameSession, StdRng) {
        let mut rng = StdRng::seed_from_u64(11);
        let participant = Participant::new("Sam".to_string(), None, None);
        let session = GameSession::new(&participant, Condition::Public, &GameConfig::default(), &mut rng);
        (session, rng)
    }

    #[tokio::test]
    async fn test_correct_answer_scores_points() {
        let (mut session, mut rng) = session();
        let cue = session.current_cue().unwrap();

        let outcome = session.answer(cue.associations[0], &mut rng).unwrap();
        assert_eq!(outcome.correct, Some(true));
        assert_eq!(outcome.score, 10);
        assert_ne!(outcome.next_cue.as_deref(), Some(cue.word));

        let outcome = session.answer("definitely not an association", &mut rng).unwrap();
        assert_eq!(outcome.correct, Some(false));
        assert_eq!(outcome.score, 10);
    }

    #[tokio::test]
    async fn test_skip_and_empty_answers() {
        let (mut session, mut rng) = session();

        assert_eq!(session.answer("   ", &mut rng), Err(GameError::EmptyAnswer));

        let outcome = session.skip(&mut rng).unwrap();
        assert_eq!(outcome.correct, None);
        assert_eq!(session.skipped(), 1);
        assert_eq!(session.to_gameplay().answers[0].answer, None);
    }

    #[tokio::test]
    async fn test_cues_never_repeat_and_bank_runs_out() {
        let (mut session, mut rng) = session();
        let mut seen = Vec::new();

        while let Some(cue) = session.current_cue() {
            assert!(!seen.contains(&cue.word));
            seen.push(cue.word);
            session.skip(&mut rng).unwrap();
        }

        assert_eq!(seen.len(), CUE_BANK.len());
        assert!(session.is_over());
        assert_eq!(session.skip(&mut rng), Err(GameError::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_timer_ends_session() {
        let (mut session, mut rng) = session();
        assert_eq!(session.view().remaining_secs, 180);

        tokio::time::sleep(Duration::from_secs(181)).await;

        assert!(session.is_expired());
        assert_eq!(session.answer("sea", &mut rng), Err(GameError::Finished));
    }

    #[tokio::test]
    async fn test_finish_produces_closed_record() {
        let (mut session, mut rng) = session();
        session.skip(&mut rng).unwrap();

        let record = session.finish();
        assert!(record.ended_at.is_some());
        assert_eq!(record.skipped, 1);
        assert!(session.is_over());
        assert_eq!(session.skip(&mut rng), Err(GameError::Finished));
    }

    #[tokio::test]
    async fn test_reopen_after_failed_save_keeps_counts() {
        let (mut session, mut rng) = session();
        session.skip(&mut rng).unwrap();
        session.finish();

        session.reopen();
        assert!(!session.is_finished());
        session.skip(&mut rng).unwrap();
        assert_eq!(session.finish().skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_only_after_grace() {
        let (mut session, _) = session();
        let grace = Duration::from_secs(600);

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert!(!session.is_abandoned(grace));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(session.is_abandoned(grace));

        session.finish();
        assert!(!session.is_abandoned(grace));
    }
}
