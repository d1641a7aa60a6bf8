// WebSocket fan-out of controller snapshots
use super::ApiState;
use crate::queue::{ControllerHandle, ControllerSnapshot};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WsEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: &'a ControllerSnapshot,
}

pub fn state_message(snapshot: &ControllerSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WsEnvelope {
        kind: "state",
        payload: snapshot,
    })
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.controller))
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &ControllerSnapshot) -> bool {
    match state_message(snapshot) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            log::error!("❌ Failed to encode snapshot: {}", e);
            false
        }
    }
}

async fn handle_socket(mut socket: WebSocket, controller: ControllerHandle) {
    let mut subscription = match controller.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            log::warn!("⚠️ WebSocket subscribe failed: {}", e);
            return;
        }
    };
    let listeners = controller.subscriber_count().await.unwrap_or_default();
    log::info!(
        "🔌 WebSocket client #{} connected ({} listening)",
        subscription.id.value(),
        listeners
    );

    if send_snapshot(&mut socket, &controller.snapshot()).await {
        loop {
            tokio::select! {
                snapshot = subscription.rx.recv() => {
                    let Some(snapshot) = snapshot else { break };
                    if !send_snapshot(&mut socket, &snapshot).await {
                        break;
                    }
                }
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    log::info!("🔌 WebSocket client #{} disconnected", subscription.id.value());
    let _ = controller.unsubscribe(subscription.id).await;
}
