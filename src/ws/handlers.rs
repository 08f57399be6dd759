//! WebSocket message dispatch
//!
//! Successful actions answer through the room's event stream, so handlers
//! only return a direct response for errors.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::vote::VoteError;
use crate::room::RoomError;
use crate::state::AppState;
use std::sync::Arc;

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    participant_id: &str,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let result = match msg {
        ClientMessage::SendChat { text } => state
            .send_chat(participant_id, &text)
            .await
            .map(|decision| {
                tracing::debug!(
                    participant_id,
                    responders = decision.responders.len(),
                    "Chat message accepted"
                );
            }),

        ClientMessage::CastVote { option } => state
            .cast_vote(participant_id, &option)
            .await
            .map(|vote| {
                tracing::debug!(participant_id, chosen = ?vote.chosen, "Vote accepted");
            }),
    };

    result.err().map(room_error)
}

fn room_error(e: RoomError) -> ServerMessage {
    let code = match &e {
        RoomError::Closed => "ROOM_CLOSED",
        RoomError::EmptyMessage => "EMPTY_MESSAGE",
        RoomError::Vote(VoteError::UnknownOption(_)) => "UNKNOWN_OPTION",
        RoomError::Vote(VoteError::AlreadySubmitted) => "ALREADY_VOTED",
    };
    ServerMessage::error(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomConfig;

    async fn state_with_room() -> (Arc<AppState>, String) {
        let state = Arc::new(AppState::new().with_room_config(RoomConfig {
            reply_probability: 0.0,
            ..RoomConfig::default()
        }));
        let p = state
            .create_participant("Sam".to_string(), None, None)
            .await
            .unwrap();
        state.open_room(&p.id).await.unwrap();
        (state, p.id)
    }

    fn error_code(msg: Option<ServerMessage>) -> Option<String> {
        match msg {
            Some(ServerMessage::Error { code, .. }) => Some(code),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_actions_have_no_direct_response() {
        let (state, id) = state_with_room().await;

        let chat = ClientMessage::SendChat {
            text: "ready to go".to_string(),
        };
        assert!(handle_message(chat, &id, &state).await.is_none());

        let vote = ClientMessage::CastVote {
            option: "Mind Benders".to_string(),
        };
        assert!(handle_message(vote, &id, &state).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_map_to_error_codes() {
        let (state, id) = state_with_room().await;

        let empty = ClientMessage::SendChat {
            text: "  ".to_string(),
        };
        assert_eq!(
            error_code(handle_message(empty, &id, &state).await).as_deref(),
            Some("EMPTY_MESSAGE")
        );

        let unknown = ClientMessage::CastVote {
            option: "Team Rocket".to_string(),
        };
        assert_eq!(
            error_code(handle_message(unknown, &id, &state).await).as_deref(),
            Some("UNKNOWN_OPTION")
        );

        let first = ClientMessage::CastVote {
            option: "Brain Trust".to_string(),
        };
        assert!(handle_message(first, &id, &state).await.is_none());
        let second = ClientMessage::CastVote {
            option: "Word Wizards".to_string(),
        };
        assert_eq!(
            error_code(handle_message(second, &id, &state).await).as_deref(),
            Some("ALREADY_VOTED")
        );

        let no_room = ClientMessage::SendChat {
            text: "hello?".to_string(),
        };
        assert_eq!(
            error_code(handle_message(no_room, "someone-else", &state).await).as_deref(),
            Some("ROOM_CLOSED")
        );
    }
}
