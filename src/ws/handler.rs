//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameMatch, PlayerInput};
use crate::store::{DataService, PlayerConfig};
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Longest a start waits on each persistence call
const PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(3);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection.
///
/// Each connection drives its own match: both players share one screen.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        session_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    let (game_match, handle) = GameMatch::new(
        session_id,
        rand::thread_rng().gen(),
        state.catalog.clone(),
        state.config.tuning,
        state.question_provider.clone(),
    );
    let snapshot_rx = handle.snapshot_tx.subscribe();
    let input_tx = handle.input_tx.clone();
    state.match_registry.insert(handle);

    let match_task = tokio::spawn(game_match.run());

    // Run the session with split read/write
    run_session(session_id, &state, ws_sink, ws_stream, input_tx, snapshot_rx).await;

    // Cleanup on disconnect
    if let Err(e) = match_task.await {
        error!(session_id = %session_id, error = %e, "Match task failed");
    }
    state.match_registry.remove(&session_id);

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = SessionRateLimiter::new();

    // Spawn writer task: broadcast snapshots -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %session_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let client_msg = prepare_start(state.data_service.as_ref(), client_msg).await;
                        let input = PlayerInput {
                            session_id,
                            msg: client_msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(session_id = %session_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to match loop
    let _ = input_tx
        .send(PlayerInput {
            session_id,
            msg: ClientMsg::LeaveMatch,
            received_at: unix_millis(),
        })
        .await;

    // Abort writer task
    writer_handle.abort();
}

/// Fill in saved topics and remember each player's setup before a start.
///
/// Persistence failures are logged and never block the match.
async fn prepare_start(data: &dyn DataService, msg: ClientMsg) -> ClientMsg {
    match msg {
        ClientMsg::StartGame {
            left,
            right,
            tuning,
        } => ClientMsg::StartGame {
            left: resolve_player(data, left).await,
            right: resolve_player(data, right).await,
            tuning,
        },
        other => other,
    }
}

async fn resolve_player(data: &dyn DataService, mut config: PlayerConfig) -> PlayerConfig {
    if config.topics.is_empty() {
        match timeout(PERSISTENCE_TIMEOUT, data.get_player_config(&config.name)).await {
            Ok(Ok(Some(saved))) => config.topics = saved.topics,
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(player = %config.name, error = %e, "Failed to load player config"),
            Err(_) => warn!(player = %config.name, "Timed out loading player config"),
        }
    } else {
        match timeout(PERSISTENCE_TIMEOUT, data.save_player_config(&config)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(player = %config.name, error = %e, "Failed to save player config"),
            Err(_) => warn!(player = %config.name, "Timed out saving player config"),
        }
    }
    config
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{ProviderError, Question, QuestionLibrary, Topic};
    use crate::store::LocalDataService;
    use async_trait::async_trait;

    /// Backend that accepts calls and never answers
    struct StalledData;

    #[async_trait]
    impl DataService for StalledData {
        async fn get_all_topics(&self) -> Result<Vec<Topic>, ProviderError> {
            std::future::pending().await
        }

        async fn save_player_config(&self, _config: &PlayerConfig) -> Result<(), ProviderError> {
            std::future::pending().await
        }

        async fn get_player_config(
            &self,
            _name: &str,
        ) -> Result<Option<PlayerConfig>, ProviderError> {
            std::future::pending().await
        }

        async fn save_level(
            &self,
            _name: &str,
            _questions: Vec<Question>,
        ) -> Result<(), ProviderError> {
            std::future::pending().await
        }

        async fn get_custom_levels(&self) -> Result<Vec<String>, ProviderError> {
            std::future::pending().await
        }
    }

    fn player(name: &str, topics: &[&str]) -> PlayerConfig {
        PlayerConfig {
            name: name.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn start_saves_topics_and_restores_them_later() {
        let data = LocalDataService::new(QuestionLibrary::new());

        let msg = ClientMsg::StartGame {
            left: player("Ada", &["math"]),
            right: player("Bo", &[]),
            tuning: None,
        };
        prepare_start(&data, msg).await;

        let msg = ClientMsg::StartGame {
            left: player("Ada", &[]),
            right: player("Bo", &[]),
            tuning: None,
        };
        match prepare_start(&data, msg).await {
            ClientMsg::StartGame { left, right, .. } => {
                assert_eq!(left.topics, vec!["math".to_string()]);
                assert!(right.topics.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_messages_pass_through() {
        let data = LocalDataService::new(QuestionLibrary::new());
        let msg = prepare_start(&data, ClientMsg::Ping { t: 5 }).await;
        assert!(matches!(msg, ClientMsg::Ping { t: 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_does_not_block_start() {
        let msg = ClientMsg::StartGame {
            left: player("Ada", &["math"]),
            right: player("Bo", &[]),
            tuning: None,
        };

        let started = tokio::time::Instant::now();
        match prepare_start(&StalledData, msg).await {
            ClientMsg::StartGame { left, right, .. } => {
                assert_eq!(left.topics, vec!["math".to_string()]);
                assert!(right.topics.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(started.elapsed() <= PERSISTENCE_TIMEOUT * 2);
    }
}
