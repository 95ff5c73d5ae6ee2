//! WebSocket streaming endpoint (spec §4.10/§6): one socket per
//! subscriber, keyed by `run_id`.
//!
//! Direct descendant of the teacher's `phago_web::routes::ws::
//! handle_socket` — same `tokio::select!` between a broadcast-backed
//! receiver and the client socket, same initial-snapshot-then-stream
//! shape — generalized to look the run up by `run_id` first (the teacher
//! has exactly one implicit `Colony`) and to filter by event type on
//! request.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};

use ufog_core::ids::RunId;

use crate::manager::RunManager;
use crate::message::BridgeMessage;

pub async fn stream_handler(
    Path(run_id): Path<RunId>,
    State(manager): State<RunManager>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, manager, run_id))
}

async fn handle_socket(mut socket: WebSocket, manager: RunManager, run_id: RunId) {
    let (mut sub, replay) = match manager.subscribe(run_id) {
        Ok(pair) => pair,
        Err(_) => {
            let msg = BridgeMessage::Error {
                error: "unknown_run".to_string(),
                detail: format!("no run with id {run_id}"),
                step: None,
            };
            if let Ok(json) = serde_json::to_string(&msg) {
                let _ = socket.send(Message::Text(json.into())).await;
            }
            let _ = socket.close().await;
            return;
        }
    };

    for msg in replay {
        if !send_message(&mut socket, &msg).await {
            return;
        }
    }

    let mut subscribed_types: Option<std::collections::HashSet<String>> = None;

    loop {
        tokio::select! {
            incoming = sub.recv() => {
                match incoming {
                    Some(message) => {
                        if passes_filter(&message, &subscribed_types)
                            && !send_message(&mut socket, &message).await
                        {
                            break;
                        }
                        if matches!(message, BridgeMessage::Done { .. }) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            client = socket.recv() => {
                match client {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(cmd) = serde_json::from_str::<ClientCommand>(&text) {
                            match cmd {
                                ClientCommand::Ping => {
                                    let _ = socket.send(Message::Text("{\"type\":\"pong\"}".into())).await;
                                }
                                ClientCommand::Subscribe { event_types } => {
                                    subscribed_types = Some(event_types.into_iter().collect());
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &BridgeMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}

/// `event_types` filtering applies only to `event` messages (spec §6);
/// `tick`/`stats`/`done`/lifecycle messages are never filtered out.
fn passes_filter(message: &BridgeMessage, filter: &Option<std::collections::HashSet<String>>) -> bool {
    match (message, filter) {
        (BridgeMessage::Event { event_type, .. }, Some(types)) => types.contains(event_type),
        _ => true,
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum ClientCommand {
    Ping,
    Subscribe { event_types: Vec<String> },
}
