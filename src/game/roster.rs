//! Crew rosters and the character catalog

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum crew members a roster can reach through recruitment
pub const ROSTER_CAP: usize = 6;

/// A crew template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub strength: f64,
}

impl Character {
    pub fn new(id: &str, name: &str, icon: &str, strength: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            strength,
        }
    }
}

/// One recruited instance of a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub instance_id: Uuid,
    #[serde(flatten)]
    pub character: Character,
}

impl CrewMember {
    pub fn recruit(character: &Character) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            character: character.clone(),
        }
    }

    pub fn strength(&self) -> f64 {
        self.character.strength
    }
}

/// Ordered crew of one player
///
/// Order is insertion order and never reshuffled, so "weakest first" removal
/// always picks the earliest of equally weak members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    members: Vec<CrewMember>,
}

impl Roster {
    /// Roster holding a single member of `character`
    pub fn starting(character: &Character) -> Self {
        Self {
            members: vec![CrewMember::recruit(character)],
        }
    }

    pub fn members(&self) -> &[CrewMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROSTER_CAP
    }

    /// Sum of member strengths rounded to one decimal place
    pub fn total_strength(&self) -> f64 {
        let sum: f64 = self.members.iter().map(CrewMember::strength).sum();
        round_tenth(sum)
    }

    /// Append a member unless the roster is at the cap.
    ///
    /// Returns the new member on success.
    pub fn recruit(&mut self, character: &Character) -> Option<&CrewMember> {
        if self.is_full() {
            return None;
        }
        self.members.push(CrewMember::recruit(character));
        self.members.last()
    }

    /// Index of the weakest member, earliest on ties
    pub fn weakest_index(&self) -> Option<usize> {
        let mut weakest: Option<(usize, f64)> = None;
        for (idx, member) in self.members.iter().enumerate() {
            match weakest {
                Some((_, strength)) if member.strength() >= strength => {}
                _ => weakest = Some((idx, member.strength())),
            }
        }
        weakest.map(|(idx, _)| idx)
    }

    /// Remove the weakest member, never leaving the roster empty.
    pub fn remove_weakest(&mut self) -> Option<CrewMember> {
        if self.members.len() <= 1 {
            return None;
        }
        let idx = self.weakest_index()?;
        Some(self.members.remove(idx))
    }
}

impl From<Vec<CrewMember>> for Roster {
    fn from(members: Vec<CrewMember>) -> Self {
        Self { members }
    }
}

/// Round to one decimal place
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Fixed, ordered list of recruitable characters
#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    characters: Vec<Character>,
}

impl CharacterCatalog {
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Character every side starts the match with
    pub fn starter(&self) -> &Character {
        &self.characters[0]
    }

    /// Pick this round's reward uniformly from the catalog
    pub fn pick_reward<R: Rng>(&self, rng: &mut R) -> Character {
        let idx = rng.gen_range(0..self.characters.len());
        self.characters[idx].clone()
    }
}

impl Default for CharacterCatalog {
    fn default() -> Self {
        Self {
            characters: vec![
                Character::new("mouse", "Mouse", "🐭", 1.0),
                Character::new("rabbit", "Rabbit", "🐰", 1.2),
                Character::new("fox", "Fox", "🦊", 1.5),
                Character::new("dog", "Dog", "🐶", 2.0),
                Character::new("horse", "Horse", "🐴", 3.0),
                Character::new("bear", "Bear", "🐻", 4.0),
                Character::new("elephant", "Elephant", "🐘", 5.0),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn roster_of(strengths: &[f64]) -> Roster {
        let members = strengths
            .iter()
            .enumerate()
            .map(|(i, s)| CrewMember::recruit(&Character::new(&format!("c{i}"), "Crew", "*", *s)))
            .collect::<Vec<_>>();
        Roster::from(members)
    }

    #[test]
    fn weakest_removal_takes_first_minimum() {
        let mut roster = roster_of(&[1.0, 1.2, 1.2, 3.0]);
        let first_id = roster.members()[0].instance_id;

        let removed = roster.remove_weakest().expect("removal");
        assert_eq!(removed.instance_id, first_id);
        assert_eq!(roster.len(), 3);

        // Next weakest is the first of the two 1.2 members
        let second_id = roster.members()[0].instance_id;
        let removed = roster.remove_weakest().expect("removal");
        assert_eq!(removed.instance_id, second_id);
        assert_eq!(roster.members()[0].strength(), 1.2);
    }

    #[test]
    fn weakest_index_with_min_in_middle() {
        let roster = roster_of(&[2.0, 0.5, 3.0, 0.5]);
        assert_eq!(roster.weakest_index(), Some(1));
    }

    #[test]
    fn never_removes_last_member() {
        let mut roster = roster_of(&[4.0]);
        assert!(roster.remove_weakest().is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn recruitment_stops_at_cap() {
        let catalog = CharacterCatalog::default();
        let mut roster = Roster::starting(catalog.starter());
        for _ in 0..10 {
            roster.recruit(&catalog.characters()[3]);
        }
        assert_eq!(roster.len(), ROSTER_CAP);
        assert!(roster.is_full());
        assert!(roster.recruit(&catalog.characters()[3]).is_none());
    }

    #[test]
    fn total_strength_is_rounded_to_tenths() {
        let roster = roster_of(&[0.1, 0.2]);
        // 0.1 + 0.2 is 0.30000000000000004 before rounding
        assert_eq!(roster.total_strength(), 0.3);
        assert_eq!(roster_of(&[1.0, 1.2, 1.2, 3.0]).total_strength(), 6.4);
    }

    #[test]
    fn reward_pick_is_deterministic_per_seed() {
        let catalog = CharacterCatalog::default();
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..5 {
            assert_eq!(catalog.pick_reward(&mut a), catalog.pick_reward(&mut b));
        }
    }
}
