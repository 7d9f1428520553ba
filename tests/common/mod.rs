#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use game_server::{Config, Services};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for a frame it expects.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub services: Services,
}

impl TestServer {
    /// Start the full router on an ephemeral port.
    pub async fn start(config: Config) -> Self {
        let services = Services::new(config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local addr");
        let app = game_server::router(services.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server error");
        });
        Self { addr, services }
    }

    pub async fn with_defaults() -> Self {
        Self::start(Config::default()).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> Ws {
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("Failed to open websocket");
        ws
    }

    /// Block until `n` players sit in the queue, so arrival order is fixed.
    pub async fn wait_for_queue(&self, n: usize) {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while self.services.queue.len().await != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Queue never reached expected depth");
    }

    /// Pair `white` and `black` in that order and return both matched replies.
    pub async fn pair(&self, white: &str, black: &str) -> (Ws, Value, Ws, Value) {
        let mut a = self.connect().await;
        send_json(&mut a, matching(white)).await;
        self.wait_for_queue(1).await;

        let mut b = self.connect().await;
        send_json(&mut b, matching(black)).await;

        let matched_a = recv_json(&mut a).await;
        let matched_b = recv_json(&mut b).await;
        (a, matched_a, b, matched_b)
    }
}

pub fn client() -> Client {
    Client::new()
}

pub fn matching(player_id: &str) -> Value {
    json!({"action": "matching", "data": {"playerId": player_id}})
}

pub fn mv(player_id: &str, session_id: &str, mv: &str) -> Value {
    json!({"action": "move", "data": {"playerId": player_id, "sessionId": session_id, "move": mv}})
}

pub async fn send_json(ws: &mut Ws, value: Value) {
    send_text(ws, &value.to_string()).await;
}

pub async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Next text frame as JSON, failing the test if none arrives in time.
pub async fn recv_json(ws: &mut Ws) -> Value {
    try_recv_json(ws, RECV_TIMEOUT)
        .await
        .expect("Timed out waiting for a frame")
}

/// Next text frame as JSON, or `None` if nothing arrives within `wait`.
pub async fn try_recv_json(ws: &mut Ws, wait: Duration) -> Option<Value> {
    tokio::time::timeout(wait, async {
        while let Some(frame) = ws.next().await {
            match frame.expect("Websocket error") {
                Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).expect("Frame is not JSON"))
                }
                Message::Close(_) => return None,
                _ => continue,
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
