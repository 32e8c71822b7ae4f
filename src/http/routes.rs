//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::questions::{ProviderError, Question, Topic};
use crate::store::PlayerConfig;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/topics", get(topics_handler))
        .route("/players/config", post(save_player_config_handler))
        .route("/players/:name/config", get(player_config_handler))
        .route("/levels", get(levels_handler).post(save_level_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    server_time: String,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        server_time: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Setup endpoints
// ============================================================================

async fn topics_handler(State(state): State<AppState>) -> Result<Json<Vec<Topic>>, AppError> {
    let topics = state.data_service.get_all_topics().await?;
    Ok(Json(topics))
}

async fn player_config_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PlayerConfig>, AppError> {
    state
        .data_service
        .get_player_config(&name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No saved config for {name}")))
}

#[derive(Serialize)]
struct SavedResponse {
    success: bool,
}

async fn save_player_config_handler(
    State(state): State<AppState>,
    Json(config): Json<PlayerConfig>,
) -> Result<Json<SavedResponse>, AppError> {
    state.data_service.save_player_config(&config).await?;
    Ok(Json(SavedResponse { success: true }))
}

#[derive(Serialize)]
struct LevelsResponse {
    levels: Vec<String>,
}

async fn levels_handler(State(state): State<AppState>) -> Result<Json<LevelsResponse>, AppError> {
    let levels = state.data_service.get_custom_levels().await?;
    Ok(Json(LevelsResponse { levels }))
}

#[derive(Deserialize)]
struct SaveLevelRequest {
    name: String,
    questions: Vec<Question>,
}

async fn save_level_handler(
    State(state): State<AppState>,
    Json(req): Json<SaveLevelRequest>,
) -> Result<Json<SavedResponse>, AppError> {
    if req.questions.is_empty() {
        return Err(AppError::BadRequest("A level needs at least one question".to_string()));
    }
    if let Some(bad) = req
        .questions
        .iter()
        .find(|q| q.correct_index >= q.options.len())
    {
        return Err(AppError::BadRequest(format!(
            "Question {} has no option at index {}",
            bad.id, bad.correct_index
        )));
    }

    state.data_service.save_level(&req.name, req.questions).await?;
    Ok(Json(SavedResponse { success: true }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidRecord(msg) => AppError::BadRequest(msg),
            other => {
                warn!(error = %other, "Data service failure");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::questions::QuestionLibrary;

    fn router() -> Router {
        let config = Config::from_lookup(|_| None).expect("config");
        let mut library = QuestionLibrary::new();
        library
            .load_str(
                "grade-1-math",
                r#"[{"id":"q1","text":"1 + 1?","options":["2","3"],"correct_index":0}]"#,
            )
            .expect("topic");
        build_router(AppState::new(config, library))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_matches"], 0);
    }

    #[tokio::test]
    async fn topics_lists_library() {
        let response = router()
            .oneshot(Request::get("/topics").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let json = body_json(response).await;
        assert_eq!(json[0]["id"], "grade-1-math");
        assert_eq!(json[0]["name"], "GRADE 1 MATH");
    }

    #[tokio::test]
    async fn player_config_round_trips_through_http() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::get("/players/Ada/config")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(
                Request::post("/players/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Ada","topics":["grade-1-math"]}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/players/Ada/config")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(response).await;
        assert_eq!(json["topics"][0], "grade-1-math");
    }

    #[tokio::test]
    async fn level_with_bad_answer_index_is_rejected() {
        let response = router()
            .oneshot(
                Request::post("/levels")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"mine","questions":[{"id":"a","text":"?","options":["x"],"correct_index":3}]}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
