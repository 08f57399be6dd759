use crate::persona::Persona;
use serde::{Deserialize, Serialize};

/// Scores shown for the other group members
pub const SIMULATED_SCORES: [(Persona, u32); 3] = [
    (Persona::Jordan, 80),
    (Persona::Alex, 60),
    (Persona::Taylor, 40),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub display_name: String,
    pub score: u32,
    pub is_you: bool,
}

/// Rank the participant among the simulated group; ties go to the group member
pub fn build(display_name: &str, score: u32) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(String, u32, bool)> = SIMULATED_SCORES
        .iter()
        .map(|(persona, score)| (persona.name().to_string(), *score, false))
        .collect();
    rows.push((display_name.to_string(), score, true));

    // Stable sort keeps the participant behind equal scores
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    rows.into_iter()
        .enumerate()
        .map(|(i, (display_name, score, is_you))| LeaderboardEntry {
            rank: i as u32 + 1,
            display_name,
            score,
            is_you,
        })
        .collect()
}
