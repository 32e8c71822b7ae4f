//! Game simulation modules

pub mod commentary;
pub mod r#match;
pub mod physics;
pub mod roster;
pub mod scoring;
pub mod snapshot;
pub mod tuning;

pub use r#match::{GameMatch, MatchRegistry, MatchState, PlayerState};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

/// One end of the rope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Client message routed to a match
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub session_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
