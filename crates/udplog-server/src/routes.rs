//! Route configuration for the HTTP API.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{Router, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{clear_logs, get_logs, health_check, index};
use crate::state::AppState;
use crate::websocket::ws_upgrade;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.allowed_origins());

    Router::new()
        .route("/", get(index))
        .route("/logs", get(get_logs).delete(clear_logs))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer. `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}
