//! Shared state for HTTP and WebSocket handlers.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use udplog_core::{DEFAULT_SUBSCRIBER_QUEUE_CAPACITY, SharedEngine};

/// State handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    engine: SharedEngine,
    websocket_token: Option<String>,
    allowed_origins: Vec<String>,
    subscriber_queue_size: usize,
    started_at: Instant,
    shutdown: CancellationToken,
}

impl AppState {
    /// Creates state for `engine` with open access.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            websocket_token: None,
            allowed_origins: vec!["*".to_string()],
            subscriber_queue_size: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Requires `token` on live-stream connections. Empty means no token.
    #[must_use]
    pub fn with_websocket_token(mut self, token: Option<String>) -> Self {
        self.websocket_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Sets the CORS origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Sets the queue capacity of each live-stream subscription.
    #[must_use]
    pub const fn with_subscriber_queue_size(mut self, size: usize) -> Self {
        self.subscriber_queue_size = size;
        self
    }

    /// Uses `token` to end live streams on shutdown.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The intake engine.
    #[must_use]
    pub const fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// CORS origins.
    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Queue capacity of each live-stream subscription.
    #[must_use]
    pub const fn subscriber_queue_size(&self) -> usize {
        self.subscriber_queue_size
    }

    /// Fires when the service is shutting down.
    #[must_use]
    pub const fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Returns true if a client presenting `presented` may open a live stream.
    #[must_use]
    pub fn token_matches(&self, presented: Option<&str>) -> bool {
        match &self.websocket_token {
            None => true,
            Some(expected) => presented == Some(expected.as_str()),
        }
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
