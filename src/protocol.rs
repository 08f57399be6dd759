use crate::room::policy::BotState;
use crate::room::vote::{VotePhase, VoteState};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    SendChat { text: String },
    CastVote { option: String },
}

/// Everything a freshly connected client needs to draw the room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub participant_id: ParticipantId,
    pub players: Vec<Player>,
    pub messages: Vec<ChatMessage>,
    pub bots: Vec<BotState>,
    pub vote: VoteState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        room: RoomSnapshot,
        server_now: String,
    },
    PlayerJoined {
        player: Player,
    },
    Chat {
        message: ChatMessage,
    },
    Typing {
        persona: String,
    },
    Vote {
        phase: VotePhase,
        chosen: Option<String>,
        total_votes: u32,
        quorum: u32,
    },
    Countdown {
        remaining: u32,
    },
    Navigate {
        to: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn vote(state: &VoteState) -> Self {
        ServerMessage::Vote {
            phase: state.phase,
            chosen: state.chosen.clone(),
            total_votes: state.total_votes,
            quorum: state.quorum,
        }
    }

    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"t": "cast_vote", "option": "The Puzzlers"})).unwrap();
        assert!(matches!(msg, ClientMessage::CastVote { ref option } if option == "The Puzzlers"));

        let msg: ClientMessage =
            serde_json::from_value(json!({"t": "send_chat", "text": "hi all"})).unwrap();
        assert!(matches!(msg, ClientMessage::SendChat { .. }));
    }

    #[test]
    fn test_vote_message_wire_format() {
        let msg = ServerMessage::Vote {
            phase: VotePhase::CountingDown { remaining: 10 },
            chosen: Some("The Puzzlers".to_string()),
            total_votes: 4,
            quorum: 4,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["t"], "vote");
        assert_eq!(value["phase"]["state"], "counting_down");
        assert_eq!(value["phase"]["remaining"], 10);
        assert_eq!(value["total_votes"], 4);
    }
}
