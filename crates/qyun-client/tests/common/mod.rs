//! In-process channel server used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use qyun_client::config::{ClientConfig, RequestConfig, StreamConfig};
use qyun_core::Endpoint;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

#[derive(Default)]
pub struct ServerState {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    received: Mutex<Vec<(String, String)>>,
    stream_connects: AtomicUsize,
}

pub struct TestServer {
    pub endpoint: Endpoint,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/channel/create/:name", get(create_channel))
            .route("/channel/send/:name/:message", get(send_message))
            .route("/channel/send/:name", get(stream_send))
            .route("/channel/listen/:name", get(stream_listen))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: Endpoint::new("127.0.0.1", port).unwrap(),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.to_string(),
            stream: StreamConfig {
                send_timeout_ms: Some(2_000),
                connect_timeout_ms: 2_000,
                ..StreamConfig::default()
            },
            request: RequestConfig { timeout_ms: 2_000 },
        }
    }

    /// Messages received over send-role stream connections.
    pub fn received(&self) -> Vec<(String, String)> {
        self.state.received.lock().unwrap().clone()
    }

    /// Number of send-role stream connections accepted.
    pub fn stream_connects(&self) -> usize {
        self.state.stream_connects.load(Ordering::SeqCst)
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.state.channels.lock().unwrap().contains_key(name)
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn create_channel(
    Path(name): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let mut channels = state.channels.lock().unwrap();
    if channels.contains_key(&name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "Channel already exists"})),
        )
            .into_response();
    }
    let (sender, _) = broadcast::channel(64);
    channels.insert(name.clone(), sender);
    Json(json!({"status": "success", "message": format!("Channel '{}' created", name)}))
        .into_response()
}

async fn send_message(
    Path((name, message)): Path<(String, String)>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let sender = state.channels.lock().unwrap().get(&name).cloned();
    match sender {
        Some(sender) => {
            let _ = sender.send(message);
            Json(json!({"status": "success", "message": "Message broadcasted"})).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "Channel not found"})),
        )
            .into_response(),
    }
}

async fn stream_send(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    state.stream_connects.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| forward_stream(socket, name, state))
}

async fn forward_stream(mut socket: WebSocket, name: String, state: Arc<ServerState>) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                state
                    .received
                    .lock()
                    .unwrap()
                    .push((name.clone(), text.clone()));
                let sender = state.channels.lock().unwrap().get(&name).cloned();
                if let Some(sender) = sender {
                    let _ = sender.send(text);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn stream_listen(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let receiver = state
        .channels
        .lock()
        .unwrap()
        .get(&name)
        .map(broadcast::Sender::subscribe);
    match receiver {
        Some(receiver) => ws.on_upgrade(move |socket| push_messages(socket, receiver)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn push_messages(mut socket: WebSocket, mut receiver: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
