use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use blinker_shared::protocol::{DataMsg, TouchMsg};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::hub::HubCommand;
use crate::stats::Stats;
use crate::touch::forward_touch;

/// Dashboards sending this many unparseable messages are disconnected
pub const MAX_PARSE_ERRORS: u32 = 5;

/// Largest message accepted from a dashboard
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub hub_tx: mpsc::Sender<HubCommand>,
    pub dashboard_tx: broadcast::Sender<DataMsg>,
    pub stats: Arc<Stats>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn send_json(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &DataMsg,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode dashboard message: {}", e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before the snapshot so no word change falls between them
    let mut broadcast_rx = app_state.dashboard_tx.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .hub_tx
        .send(HubCommand::Snapshot { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Snapshot command");
        return;
    }
    let snapshot = match resp_rx.await {
        Ok(words) => words,
        Err(_) => {
            tracing::error!("Failed to receive word snapshot");
            return;
        }
    };

    tracing::info!("Dashboard client connected");

    for msg in &snapshot {
        if !send_json(&mut sink, msg).await {
            return;
        }
    }

    let mut parse_errors = 0;

    loop {
        tokio::select! {
            // Dashboard -> Server: simulated touches
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TouchMsg>(&text) {
                            Ok(touch) => {
                                Stats::incr(&app_state.stats.touches_received);
                                forward_touch(&app_state.hub_tx, touch, &app_state.stats);
                            }
                            Err(e) => {
                                parse_errors += 1;
                                Stats::incr(&app_state.stats.touches_malformed);
                                tracing::warn!("Bad dashboard message: {}", e);
                                if parse_errors >= MAX_PARSE_ERRORS {
                                    tracing::warn!("Dropping dashboard after {} bad messages", parse_errors);
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Dashboard
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if !send_json(&mut sink, &msg).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Dashboard lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = sink.close().await;
    tracing::info!("Dashboard client disconnected");
}
