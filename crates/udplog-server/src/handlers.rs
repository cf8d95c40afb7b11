//! HTTP request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Html;
use serde::{Deserialize, Serialize};
use tracing::info;
use udplog_core::LogEntry;

use crate::error::ApiError;
use crate::state::AppState;

/// Entries returned when no limit is given.
pub const DEFAULT_LOG_LIMIT: usize = 500;

/// Largest accepted limit.
pub const MAX_LOG_LIMIT: usize = 5000;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Query parameters for `GET /logs`.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Number of entries; kept raw so parse errors get a JSON body.
    pub limit: Option<String>,
}

impl LogsQuery {
    /// Validated limit.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] unless the limit is an integer in `1..=5000`.
    pub fn limit(&self) -> Result<usize, ApiError> {
        let Some(raw) = &self.limit else {
            return Ok(DEFAULT_LOG_LIMIT);
        };
        raw.trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_LOG_LIMIT).contains(n))
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!(
                    "limit must be an integer between 1 and {MAX_LOG_LIMIT}, got '{raw}'"
                ))
            })
    }
}

/// Body of `GET /logs`.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    /// Most recent entries, oldest first.
    pub logs: Vec<LogEntry>,
}

/// Body of `DELETE /logs`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Human-readable outcome.
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Handle GET /logs - most recent buffered entries.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let limit = query.limit()?;
    Ok(Json(LogsResponse {
        logs: state.engine().get_recent(limit),
    }))
}

/// Handle DELETE /logs - empty the in-memory buffer.
pub async fn clear_logs(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.engine().clear_buffer();
    info!("log buffer cleared via API");
    Json(StatusResponse {
        status: "ok",
        message: "Buffer cleared",
    })
}

/// Handle GET /health - health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET / - the log viewer page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
