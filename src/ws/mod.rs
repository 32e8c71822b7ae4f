//! WebSocket session handling

pub mod handler;
pub mod protocol;
