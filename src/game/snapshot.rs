//! Snapshot building for presentation observers

use crate::ws::protocol::{MatchSnapshot, PlayerSnapshot, ServerMsg};

use super::{MatchState, PlayerState};

/// Builds throttled snapshots of the match
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(&self, state: &MatchState) -> ServerMsg {
        ServerMsg::Snapshot {
            tick: state.tick,
            state: MatchSnapshot {
                is_playing: state.is_playing,
                is_paused: state.is_paused,
                is_transitioning: state.is_transitioning,
                rope_position: state.rope.displacement,
                rope_velocity: state.rope.velocity,
                winning_threshold: state.tuning.winning_threshold,
                round: state.round,
                time_left: state.time_left,
                left: player_snapshot(&state.left),
                right: player_snapshot(&state.right),
                round_reward: state.round_reward.clone(),
                winner: state.winner,
            },
        }
    }
}

fn player_snapshot(player: &PlayerState) -> PlayerSnapshot {
    PlayerSnapshot {
        side: player.side,
        name: player.name.clone(),
        score: player.score,
        strength: player.strength,
        crew: player.roster.members().to_vec(),
        topics: player.topics.clone(),
        question: player.pending_question.as_ref().map(|q| q.view()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::roster::CharacterCatalog;
    use crate::questions::Question;

    #[test]
    fn interval_throttles_and_force_overrides() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn snapshot_hides_correct_answer() {
        let mut state = MatchState::new(1, CharacterCatalog::default());
        state.left.pending_question = Some(Question {
            id: "q".into(),
            text: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_index: 1,
            topic_id: "math".into(),
        });

        let msg = SnapshotBuilder::new(1).build(&state);
        let json = serde_json::to_value(&msg).expect("serialize");
        let question = &json["state"]["left"]["question"];

        assert_eq!(question["text"], "2 + 2?");
        assert!(question.get("correct_index").is_none());
        assert!(json["state"]["right"]["question"].is_null());
    }
}
