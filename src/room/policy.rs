//! Which personas answer a human message.
//!
//! The decision is pure: it reads reply counts and draws from an injected
//! random source, so tests can pin the outcome with a seeded rng.

use crate::persona::Persona;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Words that mark a message as a greeting (substring match, any case)
pub const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "yo", "sup", "greetings", "howdy"];

pub fn is_greeting(text: &str) -> bool {
    let lower = text.to_lowercase();
    GREETING_WORDS.iter().any(|word| lower.contains(word))
}

/// Persona named in the text; the earliest mention wins when several are named
pub fn mentioned_persona(text: &str) -> Option<Persona> {
    let lower = text.to_lowercase();
    Persona::ALL
        .into_iter()
        .filter_map(|persona| {
            lower
                .find(&persona.name().to_lowercase())
                .map(|pos| (pos, persona))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, persona)| persona)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    pub persona: Persona,
    pub reply_count: u32,
    /// Replies decided on but not yet delivered
    #[serde(skip)]
    pub in_flight: u32,
    pub joined: bool,
}

impl BotState {
    fn new(persona: Persona) -> Self {
        Self {
            persona,
            reply_count: 0,
            in_flight: 0,
            joined: false,
        }
    }

    /// Greetings are always answered; anything else only under the cap
    pub fn is_eligible(&self, greeting: bool) -> bool {
        self.joined && (greeting || self.reply_count + self.in_flight < self.persona.reply_cap())
    }
}

/// Reply bookkeeping for all three personas
#[derive(Debug, Clone)]
pub struct BotRoster {
    bots: [BotState; 3],
}

impl BotRoster {
    /// Nobody has joined yet
    pub fn new() -> Self {
        Self {
            bots: Persona::ALL.map(BotState::new),
        }
    }

    /// Every persona present with the given reply counts (Alex, Jordan, Taylor)
    pub fn with_counts(counts: [u32; 3]) -> Self {
        let mut roster = Self::new();
        for (bot, count) in roster.bots.iter_mut().zip(counts) {
            bot.joined = true;
            bot.reply_count = count;
        }
        roster
    }

    pub fn get(&self, persona: Persona) -> &BotState {
        &self.bots[Self::index(persona)]
    }

    pub fn bots(&self) -> &[BotState] {
        &self.bots
    }

    pub fn mark_joined(&mut self, persona: Persona) {
        self.bots[Self::index(persona)].joined = true;
    }

    /// Reserve a reply slot for a persona that was picked to answer
    pub fn begin_reply(&mut self, persona: Persona) {
        self.bots[Self::index(persona)].in_flight += 1;
    }

    /// Release the slot; only a generated reply counts towards the cap
    pub fn finish_reply(&mut self, persona: Persona, generated: bool) {
        let bot = &mut self.bots[Self::index(persona)];
        bot.in_flight = bot.in_flight.saturating_sub(1);
        if generated {
            bot.reply_count += 1;
        }
    }

    /// Reply counts keyed by persona name
    pub fn counts(&self) -> HashMap<String, u32> {
        self.bots
            .iter()
            .map(|b| (b.persona.name().to_string(), b.reply_count))
            .collect()
    }

    fn index(persona: Persona) -> usize {
        match persona {
            Persona::Alex => 0,
            Persona::Jordan => 1,
            Persona::Taylor => 2,
        }
    }
}

impl Default for BotRoster {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDecision {
    pub greeting: bool,
    pub mentioned: Option<Persona>,
    pub responders: Vec<Persona>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplyPolicy {
    /// Chance that an eligible, unaddressed persona answers a non-greeting
    pub reply_probability: f64,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            reply_probability: 0.7,
        }
    }
}

impl ReplyPolicy {
    pub fn new(reply_probability: f64) -> Self {
        Self {
            reply_probability: reply_probability.clamp(0.0, 1.0),
        }
    }

    pub fn decide<R: Rng + ?Sized>(&self, text: &str, roster: &BotRoster, rng: &mut R) -> ReplyDecision {
        let greeting = is_greeting(text);
        let mentioned = mentioned_persona(text);

        let responders = match mentioned {
            Some(persona) => {
                if roster.get(persona).is_eligible(greeting) {
                    vec![persona]
                } else {
                    Vec::new()
                }
            }
            None => roster
                .bots()
                .iter()
                .filter(|bot| bot.is_eligible(greeting))
                .filter(|_| greeting || rng.random_bool(self.reply_probability))
                .map(|bot| bot.persona)
                .collect(),
        };

        ReplyDecision {
            greeting,
            mentioned,
            responders,
        }
    }
}
