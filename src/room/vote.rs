//! Team-name vote: the human's ballot, synthetic votes up to quorum, and the
//! exit countdown.
//!
//! The machine only moves forward:
//! `Collecting -> Submitted -> QuorumReached -> CountingDown -> Expired`.
//! It holds no timers; the room calls [`VoteSequencer::tick`] and
//! [`VoteSequencer::countdown_tick`] on its own cadence.

use crate::types::TEAM_NAME_OPTIONS;
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUORUM: u32 = 4;
pub const DEFAULT_COUNTDOWN_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VotePhase {
    Collecting,
    Submitted,
    QuorumReached,
    CountingDown { remaining: u32 },
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("Unknown team name option: {0}")]
    UnknownOption(String),

    #[error("A team name vote was already submitted")]
    AlreadySubmitted,
}

/// What changed as the result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTransition {
    Submitted { chosen: String },
    VoteCounted { total_votes: u32 },
    QuorumReached,
    CountdownStarted { remaining: u32 },
    CountdownTick { remaining: u32 },
    Expired,
}

/// Serializable view of the vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteState {
    pub phase: VotePhase,
    pub chosen: Option<String>,
    pub total_votes: u32,
    pub quorum: u32,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VoteSequencer {
    phase: VotePhase,
    chosen: Option<String>,
    total_votes: u32,
    quorum: u32,
    countdown_secs: u32,
}

impl Default for VoteSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_QUORUM, DEFAULT_COUNTDOWN_SECS)
    }
}

impl VoteSequencer {
    pub fn new(quorum: u32, countdown_secs: u32) -> Self {
        Self {
            phase: VotePhase::Collecting,
            chosen: None,
            total_votes: 0,
            quorum: quorum.max(1),
            countdown_secs,
        }
    }

    pub fn phase(&self) -> VotePhase {
        self.phase
    }

    pub fn total_votes(&self) -> u32 {
        self.total_votes
    }

    pub fn chosen(&self) -> Option<&str> {
        self.chosen.as_deref()
    }

    /// Record the human's ballot
    pub fn submit(&mut self, option: &str) -> Result<Vec<VoteTransition>, VoteError> {
        if self.phase != VotePhase::Collecting {
            return Err(VoteError::AlreadySubmitted);
        }

        let chosen = TEAM_NAME_OPTIONS
            .iter()
            .find(|name| name.eq_ignore_ascii_case(option.trim()))
            .ok_or_else(|| VoteError::UnknownOption(option.to_string()))?
            .to_string();

        self.chosen = Some(chosen.clone());
        self.total_votes = 1;
        self.phase = VotePhase::Submitted;

        let mut transitions = vec![VoteTransition::Submitted { chosen }];
        self.check_quorum(&mut transitions);
        Ok(transitions)
    }

    /// One synthetic vote from another group member
    pub fn tick(&mut self) -> Vec<VoteTransition> {
        if self.phase != VotePhase::Submitted {
            return Vec::new();
        }

        self.total_votes = (self.total_votes + 1).min(self.quorum);
        let mut transitions = vec![VoteTransition::VoteCounted {
            total_votes: self.total_votes,
        }];
        self.check_quorum(&mut transitions);
        transitions
    }

    /// One second of the exit countdown
    pub fn countdown_tick(&mut self) -> Vec<VoteTransition> {
        let VotePhase::CountingDown { remaining } = self.phase else {
            return Vec::new();
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.phase = VotePhase::Expired;
            vec![
                VoteTransition::CountdownTick { remaining: 0 },
                VoteTransition::Expired,
            ]
        } else {
            self.phase = VotePhase::CountingDown { remaining };
            vec![VoteTransition::CountdownTick { remaining }]
        }
    }

    pub fn state(&self) -> VoteState {
        VoteState {
            phase: self.phase,
            chosen: self.chosen.clone(),
            total_votes: self.total_votes,
            quorum: self.quorum,
            options: TEAM_NAME_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    // Quorum passes straight through to the countdown
    fn check_quorum(&mut self, transitions: &mut Vec<VoteTransition>) {
        if self.total_votes < self.quorum {
            return;
        }
        transitions.push(VoteTransition::QuorumReached);
        if self.countdown_secs == 0 {
            self.phase = VotePhase::Expired;
            transitions.push(VoteTransition::Expired);
        } else {
            self.phase = VotePhase::CountingDown {
                remaining: self.countdown_secs,
            };
            transitions.push(VoteTransition::CountdownStarted {
                remaining: self.countdown_secs,
            });
        }
    }
}
