//! Scoring and roster mutation for answered questions

use super::roster::{Character, CrewMember, Roster};

/// Points for a correct answer
pub const CORRECT_ANSWER_POINTS: u32 = 10;

/// Roster effect of one answer
#[derive(Debug, Clone, PartialEq)]
pub enum RosterEffect {
    /// No reward on offer, or a wrong answer on a one-member roster
    None,
    /// Reward joined the answering side
    Recruited(CrewMember),
    /// Answering side was at the cap; opponent lost its weakest member
    Sabotaged(CrewMember),
    /// Answering side was at the cap but the opponent is down to one member
    SabotageBlocked,
    /// Wrong answer cost the answering side its weakest member
    SelfEliminated(CrewMember),
}

impl RosterEffect {
    /// Whether this effect used up the round reward
    pub fn claims_reward(&self) -> bool {
        matches!(
            self,
            RosterEffect::Recruited(_) | RosterEffect::Sabotaged(_) | RosterEffect::SabotageBlocked
        )
    }
}

/// Scoring rules
pub struct ScoringSystem;

impl ScoringSystem {
    /// Apply a correct answer.
    ///
    /// With a reward on offer the answering side recruits it, or sabotages the
    /// opponent when its own roster is full.
    pub fn apply_correct(
        score: &mut u32,
        own: &mut Roster,
        opponent: &mut Roster,
        reward: Option<&Character>,
    ) -> RosterEffect {
        *score += CORRECT_ANSWER_POINTS;

        let Some(reward) = reward else {
            return RosterEffect::None;
        };

        if let Some(member) = own.recruit(reward) {
            return RosterEffect::Recruited(member.clone());
        }

        match opponent.remove_weakest() {
            Some(removed) => RosterEffect::Sabotaged(removed),
            None => RosterEffect::SabotageBlocked,
        }
    }

    /// Apply a wrong answer: lose the weakest member unless it is the last one.
    pub fn apply_incorrect(own: &mut Roster) -> RosterEffect {
        match own.remove_weakest() {
            Some(removed) => RosterEffect::SelfEliminated(removed),
            None => RosterEffect::None,
        }
    }
}
