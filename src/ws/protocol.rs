//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::commentary::Mood;
use crate::game::roster::{Character, CrewMember};
use crate::game::tuning::MatchTuning;
use crate::game::Side;
use crate::questions::QuestionView;
use crate::store::PlayerConfig;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Start a fresh match, replacing any running one
    StartGame {
        left: PlayerConfig,
        right: PlayerConfig,
        /// Optional tuning override for this match
        #[serde(default)]
        tuning: Option<MatchTuning>,
    },

    /// Answer the pending question for one side
    Answer {
        side: Side,
        /// Index into the question's options
        option_index: usize,
    },

    /// Skip the rest of the current round
    NextRound,

    /// Pause or resume
    TogglePause,

    /// Cancel the match without a winner
    Abort,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave and tear down the session's match
    LeaveMatch,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        server_time: u64,
    },

    /// Match state snapshot (sent at regular intervals)
    Snapshot {
        /// Physics tick number
        tick: u64,
        state: MatchSnapshot,
    },

    /// Discrete game event
    Event {
        event: GameEvent,
    },

    /// Match has ended, by win or abort
    MatchEnd {
        winner: Option<Side>,
        stats: MatchStats,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Full view of the match for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_transitioning: bool,
    /// Signed rope displacement, negative toward the left
    pub rope_position: f64,
    pub rope_velocity: f64,
    pub winning_threshold: f64,
    pub round: u32,
    pub time_left: u32,
    pub left: PlayerSnapshot,
    pub right: PlayerSnapshot,
    pub round_reward: Option<Character>,
    pub winner: Option<Side>,
}

/// One side in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub side: Side,
    pub name: String,
    pub score: u32,
    pub strength: f64,
    pub crew: Vec<CrewMember>,
    pub topics: Vec<String>,
    /// Pending question without its answer
    pub question: Option<QuestionView>,
}

/// Game events for audio/visual feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A round began (match start or rollover)
    RoundStart {
        round: u32,
        time_left: u32,
        reward: Option<Character>,
    },

    /// A question was delivered to a side
    QuestionAssigned {
        side: Side,
        question_id: String,
    },

    AnswerCorrect {
        side: Side,
        score: u32,
    },

    AnswerIncorrect {
        side: Side,
    },

    /// Round reward joined the answering side's crew
    Recruit {
        side: Side,
        member: CrewMember,
    },

    /// Answering side knocked out the opponent's weakest member
    SabotageEliminate {
        side: Side,
        victim: Side,
        removed: CrewMember,
    },

    /// A wrong answer cost the side its weakest member
    SelfEliminate {
        side: Side,
        removed: CrewMember,
    },

    /// Crew chatter when a side's outlook changes
    Commentary {
        side: Side,
        mood: Mood,
        line: String,
    },

    Paused {
        paused: bool,
    },

    MatchWon {
        winner: Side,
        rope_position: f64,
    },

    MatchAborted,
}

/// Match statistics at end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStats {
    pub duration_secs: u32,
    pub rounds: u32,
    pub player_stats: Vec<PlayerMatchStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMatchStats {
    pub side: Side,
    pub name: String,
    pub score: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub final_crew_size: u32,
    pub final_strength: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"answer","side":"left","option_index":2}"#)
                .expect("parse answer");
        assert!(matches!(
            msg,
            ClientMsg::Answer {
                side: Side::Left,
                option_index: 2
            }
        ));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"toggle_pause"}"#).expect("parse");
        assert!(matches!(msg, ClientMsg::TogglePause));
    }

    #[test]
    fn start_game_tuning_is_optional() {
        let raw = r#"{
            "type": "start_game",
            "left": {"name": "Ada", "topics": ["grade-1-math"]},
            "right": {"name": "Bo"}
        }"#;
        let msg: ClientMsg = serde_json::from_str(raw).expect("parse start");
        match msg {
            ClientMsg::StartGame { left, right, tuning } => {
                assert_eq!(left.topics, vec!["grade-1-math".to_string()]);
                assert!(right.topics.is_empty());
                assert!(tuning.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn events_are_tagged_by_event_type() {
        let json = serde_json::to_value(ServerMsg::Event {
            event: GameEvent::MatchWon {
                winner: Side::Right,
                rope_position: 50.1,
            },
        })
        .expect("serialize");
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["event_type"], "match_won");
        assert_eq!(json["event"]["winner"], "right");
    }
}
