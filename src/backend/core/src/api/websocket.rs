//! WebSocket feed of live view frames.
//!
//! Every published frame is pushed as a `frame` message. Clients may send
//! view commands (`resize`, `filter`, `interval`) on the same socket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

use super::AppState;
use crate::error::JobscopeError;
use crate::view::{LiveFrame, LiveViewClient, ViewCommand};

/// Server-sent messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsUpdate {
    Frame { frame: Arc<LiveFrame> },
    Error { message: String },
}

/// Handle WebSocket upgrade.
pub async fn live_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, JobscopeError> {
    let live = state
        .live
        .clone()
        .ok_or_else(|| JobscopeError::new(crate::error::ErrorCode::StreamClosed, "Live view is not running"))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, live)))
}

async fn send_update(sender: &mut futures::stream::SplitSink<WebSocket, Message>, update: &WsUpdate) -> bool {
    match serde_json::to_string(update) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode live update");
            false
        }
    }
}

async fn handle_socket(socket: WebSocket, live: LiveViewClient) {
    let (mut sender, mut receiver) = socket.split();
    // Yields the current frame first, then every replacement.
    let mut frames = WatchStream::new(live.subscribe());

    tracing::info!("Live view client connected");

    loop {
        tokio::select! {
            latest = frames.next() => match latest {
                Some(Some(frame)) => {
                    if !send_update(&mut sender, &WsUpdate::Frame { frame }).await {
                        break;
                    }
                }
                Some(None) => {}
                None => break,
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let reply = match serde_json::from_str::<ViewCommand>(&text) {
                        Ok(command) => live.send(command).await.err().map(|err| err.user_message().to_string()),
                        Err(err) => Some(format!("Invalid message format: {}", err)),
                    };
                    if let Some(message) = reply {
                        if !send_update(&mut sender, &WsUpdate::Error { message }).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Live view client disconnected");
}
