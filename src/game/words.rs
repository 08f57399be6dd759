/// A cue word and the associations accepted for it
#[derive(Debug, PartialEq, Eq)]
pub struct Cue {
    pub word: &'static str,
    pub associations: &'static [&'static str],
}

impl Cue {
    /// Case-insensitive exact match after trimming
    pub fn accepts(&self, answer: &str) -> bool {
        let answer = answer.trim();
        self.associations
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(answer))
    }
}

pub const CUE_BANK: &[Cue] = &[
    Cue {
        word: "ocean",
        associations: &["sea", "water", "wave", "waves", "beach", "blue", "fish", "salt"],
    },
    Cue {
        word: "bread",
        associations: &["butter", "toast", "loaf", "bakery", "wheat", "flour", "sandwich"],
    },
    Cue {
        word: "winter",
        associations: &["snow", "cold", "ice", "christmas", "december", "frost", "skiing"],
    },
    Cue {
        word: "doctor",
        associations: &["nurse", "hospital", "medicine", "patient", "sick", "health", "clinic"],
    },
    Cue {
        word: "music",
        associations: &["song", "songs", "band", "guitar", "piano", "concert", "melody", "sound"],
    },
    Cue {
        word: "night",
        associations: &["day", "dark", "moon", "stars", "sleep", "evening", "bed"],
    },
    Cue {
        word: "garden",
        associations: &["flowers", "flower", "plants", "grass", "vegetables", "soil", "tree"],
    },
    Cue {
        word: "coffee",
        associations: &["tea", "cup", "mug", "morning", "caffeine", "espresso", "beans", "milk"],
    },
    Cue {
        word: "school",
        associations: &["teacher", "class", "student", "students", "homework", "learn", "books"],
    },
    Cue {
        word: "fire",
        associations: &["hot", "flame", "flames", "smoke", "burn", "heat", "red", "water"],
    },
    Cue {
        word: "mountain",
        associations: &["hill", "climb", "peak", "snow", "hiking", "valley", "high", "rock"],
    },
    Cue {
        word: "money",
        associations: &["cash", "bank", "dollar", "dollars", "rich", "coins", "wallet", "pay"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_trims_and_ignores_case() {
        let ocean = &CUE_BANK[0];
        assert!(ocean.accepts("  Sea "));
        assert!(ocean.accepts("WAVES"));
        assert!(!ocean.accepts("seagull"));
        assert!(!ocean.accepts(""));
    }

    #[test]
    fn test_cue_words_are_unique() {
        let mut words: Vec<_> = CUE_BANK.iter().map(|c| c.word).collect();
        words.sort_unstable();
        words.dedup();
        assert_eq!(words.len(), CUE_BANK.len());
    }
}
