//! HTTP edge for the leaderboard engine.
//!
//! A thin axum surface: decode and validate the request shape, call the
//! query façade, map the engine's error taxonomy onto status codes. The
//! engine itself is fully usable without this module.

use crate::config::HttpConfig;
use crate::error::PodiumError;
use crate::manager::LeaderboardManager;
use crate::query::{QueryService, RankedEntry, UserStanding};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 1000;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: QueryService,
    pub manager: Arc<LeaderboardManager>,
    pub started: Instant,
}

impl AppState {
    pub fn new(manager: Arc<LeaderboardManager>) -> Self {
        Self {
            service: QueryService::new(Arc::clone(&manager)),
            manager,
            started: Instant::now(),
        }
    }
}

/// Builds the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/scores", post(submit_score))
        .route("/api/v1/games/{game_id}/leaders", get(get_leaders))
        .route(
            "/api/v1/games/{game_id}/users/{user_id}/rank",
            get(get_user_rank),
        )
        .route("/metrics", get(get_metrics))
        .route("/healthz", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until ctrl-c, then shuts the engine down cleanly.
pub async fn serve(config: &HttpConfig, state: AppState) -> crate::error::Result<()> {
    let manager = Arc::clone(&state.manager);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// Engine errors mapped onto HTTP status codes.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PodiumError> for ApiError {
    fn from(err: PodiumError) -> Self {
        let status = match &err {
            PodiumError::InvalidScore { .. } | PodiumError::InvalidWindow { .. } => {
                StatusCode::BAD_REQUEST
            }
            PodiumError::GameNotFound { .. } | PodiumError::UserNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            PodiumError::Persistence(_) | PodiumError::RecoveryCorruption { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitScoreRequest {
    user_id: u64,
    game_id: u64,
    score: i64,
    timestamp: i64,
}

/// POST /api/v1/scores
async fn submit_score(
    State(state): State<AppState>,
    payload: Result<Json<SubmitScoreRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state
        .service
        .submit(req.user_id, req.game_id, req.score, req.timestamp)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct LeadersParams {
    limit: Option<i64>,
    window: Option<String>,
}

/// GET /api/v1/games/{game_id}/leaders
async fn get_leaders(
    State(state): State<AppState>,
    Path(game_id): Path<u64>,
    Query(params): Query<LeadersParams>,
) -> Result<Json<Vec<RankedEntry>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    let rows = state
        .service
        .top_k(game_id, limit as usize, params.window.as_deref())?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct RankParams {
    window: Option<String>,
}

/// GET /api/v1/games/{game_id}/users/{user_id}/rank
async fn get_user_rank(
    State(state): State<AppState>,
    Path((game_id, user_id)): Path<(u64, u64)>,
    Query(params): Query<RankParams>,
) -> Result<Json<UserStanding>, ApiError> {
    let standing = state
        .service
        .user_rank(game_id, user_id, params.window.as_deref())?;
    Ok(Json(standing))
}

/// GET /metrics
async fn get_metrics(State(state): State<AppState>) -> String {
    state.manager.metrics().gather()
}

/// GET /healthz
async fn get_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptimeSecs": state.started.elapsed().as_secs(),
        "games": state.manager.games_count(),
    }))
}
