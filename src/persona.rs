//! Simulated group members and the client that voices them.
//!
//! Each persona has a fixed system prompt and a cap on how many non-greeting
//! replies it will send. [`ReplyGenerator`] turns the chat so far into a
//! provider request and returns the persona's next line.

use crate::llm::{
    GenerateRequest, LlmConfig, LlmError, LlmProvider, LlmResult, PromptMessage, PromptRole,
};
use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persona {
    Alex,
    Jordan,
    Taylor,
}

const SHARED_RULES: &str = "You are chatting in a small online group of study participants \
waiting for a word game to start. Write like a real person texting: lowercase is fine, \
use casual abbreviations (lol, tbh, ngl, idk), one or two short sentences, never more than \
25 words. Never use emojis. Never say or hint that you are an AI, a bot, or part of the study \
design. Do not ask more than one question.";

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Alex, Persona::Jordan, Persona::Taylor];

    pub fn name(&self) -> &'static str {
        match self {
            Persona::Alex => "Alex",
            Persona::Jordan => "Jordan",
            Persona::Taylor => "Taylor",
        }
    }

    /// Non-greeting replies this persona will send in one session
    pub fn reply_cap(&self) -> u32 {
        match self {
            Persona::Alex => 1,
            Persona::Jordan => 2,
            Persona::Taylor => 3,
        }
    }

    pub fn avatar_url(&self) -> &'static str {
        match self {
            Persona::Alex => "/avatars/alex.png",
            Persona::Jordan => "/avatars/jordan.png",
            Persona::Taylor => "/avatars/taylor.png",
        }
    }

    fn character(&self) -> &'static str {
        match self {
            Persona::Alex => {
                "Your name is Alex. You are a bit reserved and keep answers very short. \
                 You are mildly curious about the game but not chatty."
            }
            Persona::Jordan => {
                "Your name is Jordan. You are friendly and upbeat, a psych major who likes \
                 puzzles and word games. You sometimes joke about being competitive."
            }
            Persona::Taylor => {
                "Your name is Taylor. You are the most talkative of the group, relaxed and \
                 encouraging. You like to make everyone feel included."
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A chat line as the generator sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub text: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender: message.sender.clone(),
            text: message.text.clone(),
        }
    }
}

/// Formats persona requests and returns one reply string
pub struct ReplyGenerator {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    timeout: Duration,
    history_limit: usize,
}

impl ReplyGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.default_max_tokens,
            timeout: config.default_timeout,
            history_limit: config.history_limit,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn build_request(
        &self,
        persona: Persona,
        message: &str,
        history: &[HistoryEntry],
        reply_counts: &HashMap<String, u32>,
    ) -> GenerateRequest {
        let own_count = reply_counts.get(persona.name()).copied().unwrap_or(0);
        let system_prompt = format!(
            "{}\n\n{}\n\nYou have already sent {} message(s) in this chat.",
            SHARED_RULES,
            persona.character(),
            own_count
        );

        let start = history.len().saturating_sub(self.history_limit);
        let mut messages: Vec<PromptMessage> = history[start..]
            .iter()
            .map(|entry| to_prompt_message(persona, entry))
            .collect();

        // The triggering line is usually the last history entry already
        let already_last = history
            .last()
            .is_some_and(|last| last.text == message && last.sender != persona.name());
        if !already_last {
            messages.push(PromptMessage {
                role: PromptRole::User,
                content: message.to_string(),
            });
        }

        GenerateRequest {
            system_prompt,
            messages,
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
        }
    }

    pub async fn reply(
        &self,
        persona: Persona,
        message: &str,
        history: &[HistoryEntry],
        reply_counts: &HashMap<String, u32>,
    ) -> LlmResult<String> {
        let request = self.build_request(persona, message, history, reply_counts);
        let response = self.provider.generate(request).await?;

        tracing::debug!(
            persona = persona.name(),
            provider = %response.metadata.provider,
            model = %response.metadata.model,
            latency_ms = response.metadata.latency_ms,
            tokens = ?response.metadata.tokens_used,
            "Generated persona reply"
        );

        let text = strip_speaker_prefix(persona, &response.text);
        if text.is_empty() {
            return Err(LlmError::ParseError("Empty reply".to_string()));
        }
        Ok(text)
    }
}

fn to_prompt_message(persona: Persona, entry: &HistoryEntry) -> PromptMessage {
    if entry.sender == persona.name() {
        PromptMessage {
            role: PromptRole::Assistant,
            content: entry.text.clone(),
        }
    } else {
        PromptMessage {
            role: PromptRole::User,
            content: format!("{}: {}", entry.sender, entry.text),
        }
    }
}

/// Models like to echo the "Name: " framing used for other speakers
fn strip_speaker_prefix(persona: Persona, text: &str) -> String {
    let trimmed = text.trim();
    let prefix = format!("{}:", persona.name());
    trimmed
        .strip_prefix(&prefix)
        .unwrap_or(trimmed)
        .trim()
        .trim_matches('"')
        .to_string()
}
