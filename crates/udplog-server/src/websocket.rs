//! WebSocket live tail.
//!
//! Each connection owns one engine subscription. Entries ingested after the
//! upgrade are pushed as JSON text frames until the client goes away or the
//! service shuts down; the subscription is released either way.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use udplog_core::Subscription;

use crate::state::AppState;

/// Close code sent when the token is missing or wrong.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Close code sent when the service is going away.
const CLOSE_GOING_AWAY: u16 = 1001;

/// Query parameters for the live tail.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Shared secret.
    pub token: Option<String>,
}

/// Handle WebSocket upgrade request for /ws.
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let authorized = state.token_matches(query.token.as_deref());
    ws.on_upgrade(move |socket| async move {
        if authorized {
            handle_ws_connection(socket, state).await;
        } else {
            reject(socket).await;
        }
    })
}

async fn reject(mut socket: WebSocket) {
    warn!("live tail refused: bad token");
    let _ = socket
        .send(close_message(CLOSE_UNAUTHORIZED, "unauthorized"))
        .await;
}

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let subscription = match state.engine().subscribe(state.subscriber_queue_size()) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "cannot open subscription");
            return;
        }
    };
    let id = subscription.id();
    info!(subscriber = %id, "live tail connected");

    let (mut sender, mut receiver) = socket.split();
    let shutdown = state.shutdown().clone();

    let shutting_down = tokio::select! {
        () = forward_entries(&mut sender, subscription) => {
            debug!(subscriber = %id, "live tail send loop ended");
            false
        }
        () = drain_incoming(&mut receiver) => {
            debug!(subscriber = %id, "live tail client went away");
            false
        }
        () = shutdown.cancelled() => true,
    };

    state.engine().unsubscribe(id);
    if shutting_down {
        let _ = sender
            .send(close_message(CLOSE_GOING_AWAY, "server shutting down"))
            .await;
    }
    info!(subscriber = %id, "live tail disconnected");
}

async fn forward_entries(sender: &mut SplitSink<WebSocket, Message>, mut subscription: Subscription) {
    while let Some(entry) = subscription.recv().await {
        let json = match entry.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize entry");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

async fn drain_incoming(receiver: &mut SplitStream<WebSocket>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "live tail receive error");
                break;
            }
        }
    }
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
