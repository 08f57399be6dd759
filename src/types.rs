use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type ParticipantId = String;
pub type GameplayId = String;
pub type SurveyId = String;
pub type MessageId = u64;

/// Sender name used for room announcements
pub const SYSTEM_SENDER: &str = "System";

/// Team names offered in the waiting-room vote
pub const TEAM_NAME_OPTIONS: &[&str] = &["The Puzzlers", "Word Wizards", "Brain Trust", "Mind Benders"];

/// Experimental arm a participant is randomly assigned to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Private,
    Public,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::Private, Condition::Public];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Someone present in the waiting room, human or simulated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    /// Recruitment-platform identifier, if the participant arrived with one
    pub external_id: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub condition: Option<Condition>,
    pub created_at: DateTime<Utc>,
    pub plays: u32,
    pub total_score: u32,
    pub skips: u32,
    pub leaderboard_views: u32,
    pub chat_messages_sent: u32,
    pub team_vote: Option<String>,
    pub completed: bool,
}

impl Participant {
    pub fn new(display_name: String, avatar_url: Option<String>, external_id: Option<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            external_id,
            display_name,
            avatar_url,
            condition: None,
            created_at: Utc::now(),
            plays: 0,
            total_score: 0,
            skips: 0,
            leaderboard_views: 0,
            chat_messages_sent: 0,
            team_vote: None,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub cue: String,
    /// None when the cue was skipped
    pub answer: Option<String>,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

/// One play-through of the word-association game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gameplay {
    pub id: GameplayId,
    pub participant_id: ParticipantId,
    pub condition: Condition,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub score: u32,
    pub answered: u32,
    pub correct: u32,
    pub skipped: u32,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyResponse {
    pub id: SurveyId,
    pub participant_id: ParticipantId,
    /// Instrument name, e.g. "demographics" or "post_task"
    pub instrument: String,
    pub answers: BTreeMap<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

/// Last mirrored copy of a participant's waiting-room chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatLog {
    pub participant_id: ParticipantId,
    pub messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}
