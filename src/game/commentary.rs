//! Crew chatter keyed on how the tug is going for each side

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Advantage below which the tug counts as even
const TIE_BAND: f64 = 0.1;
/// Advantage at which a win or loss is close
const IMMINENT: f64 = 0.75;

/// How a side feels about the current rope position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Winning,
    Losing,
    Tie,
    ImminentDefeat,
    ImminentVictory,
}

impl Mood {
    /// Mood for an advantage in [-1, 1] (positive is good for the side)
    pub fn from_advantage(advantage: f64) -> Self {
        if advantage.abs() < TIE_BAND {
            Mood::Tie
        } else if advantage >= IMMINENT {
            Mood::ImminentVictory
        } else if advantage <= -IMMINENT {
            Mood::ImminentDefeat
        } else if advantage > 0.0 {
            Mood::Winning
        } else {
            Mood::Losing
        }
    }

    pub fn lines(&self) -> &'static [&'static str] {
        match self {
            Mood::Winning => &[
                "They're breaking!",
                "Too easy!",
                "Heave!",
                "They're slipping!",
                "One more pull!",
                "Feel the burn!",
                "Keep pulling!",
                "We got this!",
                "They look tired!",
            ],
            Mood::Losing => &[
                "Hold on!",
                "Dig in!",
                "No, no, no!",
                "My arms!",
                "They're too strong!",
                "Don't give up!",
                "Need backup!",
                "Who fed them?",
            ],
            Mood::Tie => &[
                "Why is nothing happening?",
                "Pull!",
                "Steady!",
                "Break the deadlock!",
                "Keep tension!",
                "Stay strong!",
            ],
            Mood::ImminentDefeat => &[
                "It's over...",
                "I can't hold it!",
                "Retreat?",
                "Sliding away!",
                "Not like this!",
                "Mercy!",
            ],
            Mood::ImminentVictory => &[
                "Go for the kill!",
                "Finish them!",
                "Bring it home!",
                "It's in the bag!",
                "One last yank!",
                "Bye bye!",
            ],
        }
    }

    pub fn pick_line<R: Rng>(&self, rng: &mut R) -> &'static str {
        self.lines().choose(rng).copied().unwrap_or("Pull!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn mood_bands() {
        assert_eq!(Mood::from_advantage(0.0), Mood::Tie);
        assert_eq!(Mood::from_advantage(-0.05), Mood::Tie);
        assert_eq!(Mood::from_advantage(0.3), Mood::Winning);
        assert_eq!(Mood::from_advantage(-0.3), Mood::Losing);
        assert_eq!(Mood::from_advantage(0.75), Mood::ImminentVictory);
        assert_eq!(Mood::from_advantage(-0.9), Mood::ImminentDefeat);
    }

    #[test]
    fn picked_line_belongs_to_mood() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for mood in [Mood::Winning, Mood::Losing, Mood::Tie] {
            let line = mood.pick_line(&mut rng);
            assert!(mood.lines().contains(&line));
        }
    }
}
