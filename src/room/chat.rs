//! Append-only room chat log and its mirror to persistence

use crate::store::StoreResult;
use crate::types::{ChatMessage, MessageId, ParticipantId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Receives a full copy of the chat after every append
#[async_trait]
pub trait ChatMirror: Send + Sync {
    async fn mirror(&self, participant_id: &str, messages: Vec<ChatMessage>) -> StoreResult<()>;
}

/// Append-only, strictly ordered message sequence
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    next_id: MessageId,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    /// Append a message, assigning the next id and the current time
    pub fn append(&mut self, sender: impl Into<String>, text: impl Into<String>) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_id,
            sender: sender.into(),
            text: text.into(),
            sent_at: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push(message.clone());
        message
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand a snapshot to the mirror without waiting; failures are only logged
pub fn mirror_in_background(
    mirror: Arc<dyn ChatMirror>,
    participant_id: ParticipantId,
    snapshot: Vec<ChatMessage>,
) {
    tokio::spawn(async move {
        let count = snapshot.len();
        if let Err(e) = mirror.mirror(&participant_id, snapshot).await {
            tracing::warn!(
                participant_id = %participant_id,
                messages = count,
                "Failed to mirror chat log: {}",
                e
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMirror {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatMirror for RecordingMirror {
        async fn mirror(&self, _participant_id: &str, messages: Vec<ChatMessage>) -> StoreResult<()> {
            self.seen.lock().unwrap().push(messages.len());
            Ok(())
        }
    }

    struct FailingMirror;

    #[async_trait]
    impl ChatMirror for FailingMirror {
        async fn mirror(&self, _participant_id: &str, _messages: Vec<ChatMessage>) -> StoreResult<()> {
            Err(StoreError::Unavailable("log endpoint down".to_string()))
        }
    }

    #[test]
    fn test_append_assigns_monotonic_ids() {
        let mut log = MessageLog::new();
        let first = log.append("System", "Welcome");
        let second = log.append("Sam", "hi");
        let third = log.append("Jordan", "hey");

        assert_eq!((first.id, second.id, third.id), (1, 2, 3));
        assert!(first.sent_at <= second.sent_at && second.sent_at <= third.sent_at);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_append_never_reorders_existing_messages() {
        let mut log = MessageLog::new();
        log.append("Sam", "one");
        log.append("Alex", "two");
        let before = log.snapshot();

        log.append("Taylor", "three");

        assert_eq!(&log.messages()[..2], before.as_slice());
        assert_eq!(log.messages()[2].text, "three");
    }

    #[tokio::test]
    async fn test_mirror_in_background_delivers_snapshot() {
        let mirror = Arc::new(RecordingMirror::default());
        let mut log = MessageLog::new();
        log.append("Sam", "hello");

        mirror_in_background(mirror.clone(), "p1".to_string(), log.snapshot());
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(*mirror.seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_mirror_failure_is_swallowed() {
        let mut log = MessageLog::new();
        log.append("Sam", "hello");
        // Must not panic or propagate
        mirror_in_background(Arc::new(FailingMirror), "p1".to_string(), log.snapshot());
        tokio::task::yield_now().await;
    }
}
