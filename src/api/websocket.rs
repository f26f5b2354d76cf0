//! WebSocket handler bridging clients to the engine.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use super::handlers::AppState;
use super::types::DataReply;
use crate::bridge::SessionBridge;
use crate::engine::{TcpEngineLink, Value};

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one client connection: a session lives exactly as long as
/// its socket.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut bridge: SessionBridge<TcpEngineLink> =
        match SessionBridge::new(Arc::clone(&state.link), &state.settings).await {
            Ok(bridge) => bridge,
            Err(err) => {
                warn!(%err, "refusing session: could not resolve pooling plug-in");
                return;
            }
        };
    info!(pool = bridge.pool_path(), "client session opened");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(value) = bridge.handle_message(&text).await {
                            if push_data(&mut sink, value).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            _ = tick(bridge.poll_interval()) => {
                if let Some(value) = bridge.poll_data().await {
                    if push_data(&mut sink, value).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    info!("client session closed");
}

/// Sleep one polling period, or forever when polling is off.
async fn tick(interval: Option<Duration>) {
    match interval {
        Some(interval) => tokio::time::sleep(interval).await,
        None => std::future::pending().await,
    }
}

/// Push one `{"data": ...}` frame to the client.
async fn push_data(
    sink: &mut SplitSink<WebSocket, Message>,
    value: Value,
) -> Result<(), axum::Error> {
    let reply = DataReply { data: value };
    match serde_json::to_string(&reply) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(_) => Ok(()),
    }
}
