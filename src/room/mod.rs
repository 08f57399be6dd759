//! The simulated waiting room: one per participant session.
//!
//! A room introduces the three personas on staggered delays, routes each human
//! message through the reply policy and the generator, and runs the team-name
//! vote. Every delayed step is registered with the room's [`Timers`], so
//! [`Room::close`] stops all pending work at once.

pub mod chat;
pub mod policy;
pub mod timer;
pub mod vote;

use crate::persona::{HistoryEntry, Persona, ReplyGenerator};
use crate::protocol::{RoomSnapshot, ServerMessage};
use crate::types::*;
use chat::{mirror_in_background, ChatMirror, MessageLog};
use chrono::Utc;
use policy::{BotRoster, ReplyDecision, ReplyPolicy};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use timer::Timers;
use tokio::sync::{broadcast, RwLock};
use vote::{VotePhase, VoteSequencer, VoteState, VoteTransition};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is closed")]
    Closed,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error(transparent)]
    Vote(#[from] vote::VoteError),
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Delay before each persona joins, in persona order
    pub join_delays: Vec<Duration>,
    pub reply_probability: f64,
    pub typing_ms_per_char: u64,
    pub min_typing_delay: Duration,
    pub max_typing_delay: Duration,
    /// Cadence of synthetic votes
    pub vote_interval: Duration,
    /// Length of one countdown step
    pub countdown_step: Duration,
    pub countdown_secs: u32,
    pub quorum: u32,
    /// Posted in place of a reply the generator could not produce
    pub fallback_reply: String,
    /// Where the client goes when the countdown ends
    pub exit_path: String,
    pub welcome_text: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            join_delays: vec![
                Duration::from_secs(3),
                Duration::from_secs(7),
                Duration::from_secs(12),
            ],
            reply_probability: 0.7,
            typing_ms_per_char: 40,
            min_typing_delay: Duration::from_millis(1500),
            max_typing_delay: Duration::from_secs(6),
            vote_interval: Duration::from_secs(2),
            countdown_step: Duration::from_secs(1),
            countdown_secs: vote::DEFAULT_COUNTDOWN_SECS,
            quorum: vote::DEFAULT_QUORUM,
            fallback_reply: "sorry my wifi is being weird lol".to_string(),
            exit_path: "/study/game.html".to_string(),
            welcome_text: "Welcome to the waiting room! Your group members will join shortly."
                .to_string(),
        }
    }
}

impl RoomConfig {
    /// Load room timings from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let join_delays = std::env::var("ROOM_JOIN_DELAYS_MS")
            .ok()
            .and_then(|raw| {
                raw.split(',')
                    .map(|part| part.trim().parse::<u64>().map(Duration::from_millis))
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
            })
            .filter(|delays| {
                // One delay per persona
                let fits = delays.len() == Persona::ALL.len();
                if !fits {
                    tracing::warn!(
                        got = delays.len(),
                        expected = Persona::ALL.len(),
                        "Ignoring ROOM_JOIN_DELAYS_MS, using default join delays"
                    );
                }
                fits
            })
            .unwrap_or(defaults.join_delays);

        let reply_probability = std::env::var("ROOM_REPLY_PROBABILITY")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|p| (0.0..=1.0).contains(p))
            .unwrap_or(defaults.reply_probability);

        let config = Self {
            join_delays,
            reply_probability,
            typing_ms_per_char: std::env::var("ROOM_TYPING_MS_PER_CHAR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.typing_ms_per_char),
            vote_interval: std::env::var("ROOM_VOTE_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.vote_interval),
            countdown_secs: std::env::var("ROOM_COUNTDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.countdown_secs),
            fallback_reply: std::env::var("ROOM_FALLBACK_REPLY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.fallback_reply),
            exit_path: std::env::var("ROOM_EXIT_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.exit_path),
            ..defaults
        };

        tracing::info!(
            join_delays = ?config.join_delays,
            reply_probability = config.reply_probability,
            vote_interval_ms = config.vote_interval.as_millis() as u64,
            countdown_secs = config.countdown_secs,
            "Room config loaded"
        );

        config
    }

    /// Simulated typing time for a reply of this length
    pub fn typing_delay(&self, text: &str) -> Duration {
        let chars = text.chars().count() as u64;
        Duration::from_millis(chars.saturating_mul(self.typing_ms_per_char))
            .clamp(self.min_typing_delay, self.max_typing_delay.max(self.min_typing_delay))
    }
}

struct RoomInner {
    log: MessageLog,
    roster: BotRoster,
    players: Vec<Player>,
    vote: VoteSequencer,
    closed: bool,
}

struct Shared {
    participant_id: ParticipantId,
    display_name: String,
    config: Arc<RoomConfig>,
    policy: ReplyPolicy,
    inner: RwLock<RoomInner>,
    timers: Timers,
    events: broadcast::Sender<ServerMessage>,
    generator: Option<Arc<ReplyGenerator>>,
    mirror: Arc<dyn ChatMirror>,
}

/// Handle to a running waiting room
#[derive(Clone)]
pub struct Room {
    shared: Arc<Shared>,
}

impl Room {
    /// Create the room and schedule the personas' arrival
    pub fn open(
        participant: &Participant,
        config: Arc<RoomConfig>,
        generator: Option<Arc<ReplyGenerator>>,
        mirror: Arc<dyn ChatMirror>,
    ) -> Self {
        let (events, _rx) = broadcast::channel(256);

        let mut log = MessageLog::new();
        log.append(SYSTEM_SENDER, config.welcome_text.clone());

        let human = Player {
            display_name: participant.display_name.clone(),
            avatar_url: participant.avatar_url.clone(),
            joined_at: Utc::now(),
            is_bot: false,
        };

        let inner = RoomInner {
            log,
            roster: BotRoster::new(),
            players: vec![human],
            vote: VoteSequencer::new(config.quorum, config.countdown_secs),
            closed: false,
        };

        let shared = Arc::new(Shared {
            participant_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            policy: ReplyPolicy::new(config.reply_probability),
            config,
            inner: RwLock::new(inner),
            timers: Timers::new(),
            events,
            generator,
            mirror,
        });

        for (persona, delay) in Persona::ALL.into_iter().zip(shared.config.join_delays.iter().copied()) {
            let room = Arc::clone(&shared);
            shared
                .timers
                .after(delay, move || async move { room.join(persona).await });
        }

        tracing::info!(participant_id = %shared.participant_id, "Waiting room opened");
        Room { shared }
    }

    pub fn participant_id(&self) -> &str {
        &self.shared.participant_id
    }

    /// Whether both handles point at the same running room
    pub fn same_room(&self, other: &Room) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        let inner = self.shared.inner.read().await;
        RoomSnapshot {
            participant_id: self.shared.participant_id.clone(),
            players: inner.players.clone(),
            messages: inner.log.snapshot(),
            bots: inner.roster.bots().to_vec(),
            vote: inner.vote.state(),
        }
    }

    pub async fn vote_state(&self) -> VoteState {
        self.shared.inner.read().await.vote.state()
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.inner.read().await.closed
    }

    /// Post the human's message and dispatch persona replies
    pub async fn send_message(&self, text: &str) -> Result<ReplyDecision, RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::EmptyMessage);
        }

        let shared = &self.shared;
        let (decision, history, counts) = {
            let mut inner = shared.inner.write().await;
            if inner.closed {
                return Err(RoomError::Closed);
            }

            shared.append_locked(&mut inner, &shared.display_name, text);

            let decision = {
                let mut rng = rand::rng();
                shared.policy.decide(text, &inner.roster, &mut rng)
            };
            for persona in &decision.responders {
                inner.roster.begin_reply(*persona);
            }

            let history: Vec<HistoryEntry> =
                inner.log.messages().iter().map(HistoryEntry::from).collect();
            (decision, Arc::new(history), Arc::new(inner.roster.counts()))
        };

        tracing::info!(
            participant_id = %shared.participant_id,
            greeting = decision.greeting,
            mentioned = ?decision.mentioned,
            responders = ?decision.responders,
            "Human message routed"
        );

        for persona in decision.responders.iter().copied() {
            let room = Arc::clone(shared);
            let message = text.to_string();
            let history = Arc::clone(&history);
            let counts = Arc::clone(&counts);
            shared.timers.spawn(async move {
                room.deliver_reply(persona, message, history, counts).await;
            });
        }

        Ok(decision)
    }

    /// Record the human's team-name vote and start the synthetic tally
    pub async fn cast_vote(&self, option: &str) -> Result<VoteState, RoomError> {
        let shared = &self.shared;
        let (transitions, state) = {
            let mut inner = shared.inner.write().await;
            if inner.closed {
                return Err(RoomError::Closed);
            }
            let transitions = inner.vote.submit(option)?;
            (transitions, inner.vote.state())
        };

        tracing::info!(
            participant_id = %shared.participant_id,
            chosen = ?state.chosen,
            "Team name vote submitted"
        );

        shared.emit(ServerMessage::vote(&state));
        shared.announce(&transitions);
        if state.phase == VotePhase::Submitted {
            shared.start_vote_ticker();
        }

        Ok(state)
    }

    /// Stop every pending timer; the room emits nothing afterwards
    pub async fn close(&self) {
        self.shared.inner.write().await.closed = true;
        self.shared.timers.cancel_all();
        tracing::info!(participant_id = %self.shared.participant_id, "Waiting room closed");
    }
}

impl Shared {
    fn emit(&self, msg: ServerMessage) {
        // No subscribers is fine
        let _ = self.events.send(msg);
    }

    /// Append under the caller's lock so events leave in log order
    fn append_locked(&self, inner: &mut RoomInner, sender: &str, text: &str) -> ChatMessage {
        let message = inner.log.append(sender, text);
        self.emit(ServerMessage::Chat {
            message: message.clone(),
        });
        mirror_in_background(
            Arc::clone(&self.mirror),
            self.participant_id.clone(),
            inner.log.snapshot(),
        );
        message
    }

    async fn join(&self, persona: Persona) {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return;
        }

        inner.roster.mark_joined(persona);
        let player = Player {
            display_name: persona.name().to_string(),
            avatar_url: Some(persona.avatar_url().to_string()),
            joined_at: Utc::now(),
            is_bot: true,
        };
        inner.players.push(player.clone());
        self.emit(ServerMessage::PlayerJoined { player });
        self.append_locked(
            &mut inner,
            SYSTEM_SENDER,
            &format!("{} joined the chat", persona.name()),
        );

        tracing::debug!(participant_id = %self.participant_id, persona = persona.name(), "Persona joined");
    }

    async fn deliver_reply(
        &self,
        persona: Persona,
        message: String,
        history: Arc<Vec<HistoryEntry>>,
        counts: Arc<HashMap<String, u32>>,
    ) {
        self.emit(ServerMessage::Typing {
            persona: persona.name().to_string(),
        });

        let generated = match &self.generator {
            Some(generator) => match generator.reply(persona, &message, &history, &counts).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(
                        participant_id = %self.participant_id,
                        persona = persona.name(),
                        "Reply generation failed, using fallback: {}",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let succeeded = generated.is_some();
        let text = generated.unwrap_or_else(|| self.config.fallback_reply.clone());

        tokio::time::sleep(self.config.typing_delay(&text)).await;

        let mut inner = self.inner.write().await;
        if inner.closed {
            return;
        }
        inner.roster.finish_reply(persona, succeeded);
        self.append_locked(&mut inner, persona.name(), &text);
    }

    /// Emit client-facing events for countdown transitions
    fn announce(self: &Arc<Self>, transitions: &[VoteTransition]) {
        for transition in transitions {
            match transition {
                VoteTransition::CountdownStarted { remaining }
                | VoteTransition::CountdownTick { remaining } => {
                    self.emit(ServerMessage::Countdown {
                        remaining: *remaining,
                    });
                }
                VoteTransition::Expired => {
                    tracing::info!(participant_id = %self.participant_id, "Vote countdown expired");
                    self.emit(ServerMessage::Navigate {
                        to: self.config.exit_path.clone(),
                    });
                }
                VoteTransition::QuorumReached => {
                    tracing::info!(participant_id = %self.participant_id, "Vote quorum reached");
                }
                VoteTransition::Submitted { .. } | VoteTransition::VoteCounted { .. } => {}
            }
        }

        if transitions
            .iter()
            .any(|t| matches!(t, VoteTransition::CountdownStarted { .. }))
        {
            self.start_countdown();
        }
    }

    fn start_vote_ticker(self: &Arc<Self>) {
        let room = Arc::clone(self);
        self.timers.every(self.config.vote_interval, move || {
            let room = Arc::clone(&room);
            async move {
                let (transitions, state) = {
                    let mut inner = room.inner.write().await;
                    if inner.closed {
                        return ControlFlow::Break(());
                    }
                    let transitions = inner.vote.tick();
                    (transitions, inner.vote.state())
                };
                if transitions.is_empty() {
                    return ControlFlow::Break(());
                }

                room.emit(ServerMessage::vote(&state));
                room.announce(&transitions);

                if state.phase == VotePhase::Submitted {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }
        });
    }

    fn start_countdown(self: &Arc<Self>) {
        let room = Arc::clone(self);
        self.timers.every(self.config.countdown_step, move || {
            let room = Arc::clone(&room);
            async move {
                let (transitions, state) = {
                    let mut inner = room.inner.write().await;
                    if inner.closed {
                        return ControlFlow::Break(());
                    }
                    let transitions = inner.vote.countdown_tick();
                    (transitions, inner.vote.state())
                };
                if transitions.is_empty() {
                    return ControlFlow::Break(());
                }

                if state.phase == VotePhase::Expired {
                    room.emit(ServerMessage::vote(&state));
                }
                room.announce(&transitions);

                if state.phase == VotePhase::Expired {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });
    }
}
