// End-to-end checks of the control API over a real loopback socket
use super::*;
use crate::input::DryRunExecutor;
use crate::queue::{Controller, QueueState};
use crate::queue::tests::ScriptedProbe;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const TOKEN: &str = "test-token";

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    controller: ControllerHandle,
    config_path: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _dir: tempfile::TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header(auth::AUTH_HEADER, TOKEN)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header(auth::AUTH_HEADER, TOKEN)
    }
}

async fn start_server(config: AppConfig) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    config.save(&config_path).unwrap();

    // Unconfigured regions keep the detector idle
    let (controller, _task) = Controller::spawn(
        Arc::new(ScriptedProbe::repeating(false)),
        Arc::new(DryRunExecutor::new()),
        config.controller_settings(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ApiState::new(controller.clone(), config, config_path.clone());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(start_http_server(listener, state, async {
        let _ = shutdown_rx.await;
    }));

    TestServer {
        addr,
        client: reqwest::Client::new(),
        controller,
        config_path,
        shutdown_tx: Some(shutdown_tx),
        _dir: dir,
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        auth_token: TOKEN.to_string(),
        ..AppConfig::default()
    }
}

fn saved_config(path: &Path) -> AppConfig {
    AppConfig::load(path).unwrap()
}

/// Next `state` envelope from the socket, skipping control frames
async fn next_state(socket: &mut ClientSocket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no websocket message")
            .expect("websocket closed")
            .unwrap();
        if let WsMessage::Text(text) = message {
            let envelope: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(envelope["type"], "state");
            return envelope["payload"].clone();
        }
    }
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let server = start_server(test_config()).await;
    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_status_requires_token() {
    let server = start_server(test_config()).await;

    let resp = server.client.get(server.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = server
        .client
        .get(server.url("/status"))
        .header(auth::AUTH_HEADER, "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.get("/status").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snapshot: Value = resp.json().await.unwrap();
    assert_eq!(snapshot["queue_state"], "idle");
    assert_eq!(snapshot["auto_accept_enabled"], true);
}

#[tokio::test]
async fn test_encoded_query_token_is_accepted() {
    let config = AppConfig {
        auth_token: "a b&c".to_string(),
        ..AppConfig::default()
    };
    let server = start_server(config).await;
    let resp = server
        .client
        .get(server.url("/status?token=a%20b%26c"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_client_outside_allowed_subnets_is_forbidden() {
    let config = AppConfig {
        allowed_subnets: vec!["10.0.0.0/8".to_string()],
        ..test_config()
    };
    let server = start_server(config).await;
    let resp = server.get("/status").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_queue_commands_and_conflicts() {
    let server = start_server(test_config()).await;

    let resp = server.post("/stop-queue").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].is_string());

    let resp = server.post("/start-queue").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snapshot: Value = resp.json().await.unwrap();
    assert_eq!(snapshot["queue_state"], "searching");
    assert_eq!(server.controller.snapshot().queue_state, QueueState::Searching);

    let resp = server.post("/reset").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snapshot: Value = resp.json().await.unwrap();
    assert_eq!(snapshot["queue_state"], "idle");
}

#[tokio::test]
async fn test_toggle_persists_flag() {
    let server = start_server(test_config()).await;

    let resp = server
        .post("/toggle-auto-accept")
        .json(&json!({ "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "auto_accept_enabled": false }));
    assert!(!server.controller.snapshot().auto_accept_enabled);
    assert!(!saved_config(&server.config_path).auto_accept_enabled);
}

#[tokio::test]
async fn test_config_update_validates_and_persists() {
    let server = start_server(test_config()).await;

    for bad in [
        json!({ "poll_interval_s": 0 }),
        json!({ "stop_after_match_found_s": 1e20 }),
        json!({ "accept_delay_max_s": 1e20 }),
        json!({ "accept_region": { "x": 2_000_000_000, "y": 0, "width": 1_000_000_000, "height": 10 } }),
    ] {
        let resp = server.post("/config").json(&bad).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", bad);
    }
    assert_eq!(saved_config(&server.config_path), test_config());

    let resp = server
        .post("/config")
        .json(&json!({
            "accept_click_jitter_px": 1,
            "accept_region": { "x": 5, "y": 6, "width": 7, "height": 8 }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let returned: AppConfig = resp.json().await.unwrap();
    assert_eq!(returned.accept_click_jitter_px, 1);

    let saved = saved_config(&server.config_path);
    assert_eq!(saved.accept_click_jitter_px, 1);
    assert_eq!(saved.accept_region.width, 7);

    let resp = server.get("/config").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let current: AppConfig = resp.json().await.unwrap();
    assert_eq!(current, saved);

    // Controller still answers after the rejected updates
    let resp = server.post("/start-queue").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pairing_qr_returns_payload_and_png() {
    let server = start_server(test_config()).await;

    let resp = server.client.get(server.url("/pairing-qr")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.get("/pairing-qr").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    let payload: Value = serde_json::from_str(body["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload["host"], "127.0.0.1");
    assert_eq!(payload["port"], 8765);
    assert_eq!(payload["token"], TOKEN);

    let png = STANDARD.decode(body["qr_base64"].as_str().unwrap()).unwrap();
    assert!(png.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_websocket_streams_snapshots_until_disconnect() {
    let server = start_server(test_config()).await;

    let rejected = connect_async(format!("ws://{}/ws", server.addr)).await;
    assert!(rejected.is_err());

    let (mut socket, _) = connect_async(format!("ws://{}/ws?token={}", server.addr, TOKEN))
        .await
        .unwrap();
    let initial = next_state(&mut socket).await;
    assert_eq!(initial["queue_state"], "idle");
    assert_eq!(server.controller.subscriber_count().await.unwrap(), 1);

    let resp = server.post("/start-queue").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let pushed = next_state(&mut socket).await;
    assert_eq!(pushed["queue_state"], "searching");

    socket.close(None).await.unwrap();
    let mut remaining = server.controller.subscriber_count().await.unwrap();
    for _ in 0..100 {
        if remaining == 0 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
        remaining = server.controller.subscriber_count().await.unwrap();
    }
    assert_eq!(remaining, 0);
}

#[test]
fn test_ws_envelope_shape() {
    let snapshot = crate::queue::ControllerSnapshot::initial(true);
    let json: Value = serde_json::from_str(&ws::state_message(&snapshot).unwrap()).unwrap();
    assert_eq!(json["type"], "state");
    assert_eq!(json["payload"]["queue_state"], "idle");
}
