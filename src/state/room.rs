use super::AppState;
use crate::error::ApiError;
use crate::room::policy::ReplyDecision;
use crate::room::vote::VoteState;
use crate::room::{Room, RoomError};
use crate::store::{Patch, StoreMirror};
use std::sync::Arc;

impl AppState {
    /// Open a fresh waiting room, replacing any earlier one for the participant
    pub async fn open_room(&self, participant_id: &str) -> Result<Room, ApiError> {
        let participant = self.store.get_participant(participant_id).await?;

        let room = Room::open(
            &participant,
            Arc::clone(&self.room_config),
            self.generator.clone(),
            Arc::new(StoreMirror::new(Arc::clone(&self.store))),
        );

        let previous = self
            .rooms
            .write()
            .await
            .insert(participant.id.clone(), room.clone());
        if let Some(previous) = previous {
            tracing::info!(participant_id, "Replacing existing waiting room");
            previous.close().await;
        }

        Ok(room)
    }

    pub async fn get_room(&self, participant_id: &str) -> Option<Room> {
        self.rooms.read().await.get(participant_id).cloned()
    }

    /// Tear down the room unless a newer connection already replaced it
    pub async fn close_room(&self, room: &Room) {
        {
            let mut rooms = self.rooms.write().await;
            if rooms
                .get(room.participant_id())
                .is_some_and(|current| current.same_room(room))
            {
                rooms.remove(room.participant_id());
            }
        }
        room.close().await;
    }

    pub async fn send_chat(&self, participant_id: &str, text: &str) -> Result<ReplyDecision, RoomError> {
        let room = self.get_room(participant_id).await.ok_or(RoomError::Closed)?;
        let decision = room.send_message(text).await?;
        self.track(participant_id, Patch::new().increment("chat_messages_sent"))
            .await;
        Ok(decision)
    }

    pub async fn cast_vote(&self, participant_id: &str, option: &str) -> Result<VoteState, RoomError> {
        let room = self.get_room(participant_id).await.ok_or(RoomError::Closed)?;
        let state = room.cast_vote(option).await?;
        if let Some(chosen) = &state.chosen {
            self.track(participant_id, Patch::new().set("team_vote", chosen.as_str()))
                .await;
        }
        Ok(state)
    }
}
