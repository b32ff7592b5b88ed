//! In-process browser server for integration tests.
//!
//! The listener is bound up front but connections are only accepted on
//! request, so a test controls exactly when the client's handshake completes.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use cef_client::ClientConfig;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const STEP: Duration = Duration::from_secs(5);

pub struct MockServer {
    listener: TcpListener,
    port: u16,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        Self { listener, port }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/browser", self.port)
    }

    /// Accept one connection and complete the WebSocket handshake.
    pub async fn accept(&self) -> Peer {
        let (stream, _) = tokio::time::timeout(STEP, self.listener.accept())
            .await
            .expect("client did not connect in time")
            .unwrap();

        let mut path = String::new();
        let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req.uri().path().to_string();
            Ok(resp)
        };
        let ws = tokio_tungstenite::accept_hdr_async(stream, capture)
            .await
            .expect("handshake failed");

        Peer { ws, path }
    }
}

/// Client-facing config with probing off and quick reconnects.
pub fn config(url: &str) -> ClientConfig {
    ClientConfig::builder()
        .url(url)
        .ping_interval(Duration::ZERO)
        .reconnect_delay(Duration::from_millis(50))
        .request_timeout(STEP)
        .connect_timeout(STEP)
        .build()
}

/// Server side of one client connection.
pub struct Peer {
    ws: WebSocketStream<TcpStream>,
    pub path: String,
}

impl Peer {
    /// Next request from the client; control frames are skipped.
    pub async fn recv_request(&mut self) -> Value {
        self.try_recv_request(STEP)
            .await
            .expect("no request within timeout")
    }

    pub async fn try_recv_request(&mut self, timeout: Duration) -> Option<Value> {
        let next = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<Value>(text.as_str()).unwrap();
                    }
                    Some(Ok(Message::Close(_))) | None => panic!("client closed the connection"),
                    Some(Err(e)) => panic!("websocket error: {e}"),
                    _ => continue,
                }
            }
        };
        tokio::time::timeout(timeout, next).await.ok()
    }

    /// Wait until the client closes its side.
    pub async fn expect_close(&mut self) {
        let closed = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    _ => continue,
                }
            }
        };
        tokio::time::timeout(STEP, closed)
            .await
            .expect("client did not close");
    }

    /// Send a Close frame; the client treats it as a dropped connection.
    pub async fn close(&mut self) {
        self.ws.close(None).await.unwrap();
    }

    pub async fn send_ping(&mut self, payload: &'static [u8]) {
        self.ws
            .send(Message::Ping(Bytes::from_static(payload)))
            .await
            .unwrap();
    }

    /// Pongs received within `window`, with their payloads.
    pub async fn pongs_within(&mut self, window: Duration) -> Vec<Bytes> {
        let mut pongs = Vec::new();
        let collect = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Pong(payload))) => pongs.push(payload),
                    Some(Ok(_)) => continue,
                    _ => return,
                }
            }
        };
        let _ = tokio::time::timeout(window, collect).await;
        pongs
    }

    pub async fn reply(&mut self, request: &Value, result: Value) {
        self.send_json(json!({ "id": request["id"], "result": result }))
            .await;
    }

    pub async fn reply_error(&mut self, request: &Value, message: &str, data: Option<Value>) {
        let mut error = json!({ "message": message });
        if let Some(data) = data {
            error["data"] = data;
        }
        self.send_json(json!({ "id": request["id"], "error": error }))
            .await;
    }

    pub async fn send_event(&mut self, kind: &str, data: Value) {
        self.send_json(json!({ "type": kind, "data": data })).await;
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_binary(&mut self, data: Bytes) {
        self.ws.send(Message::Binary(data)).await.unwrap();
    }
}

/// Wait for a value pushed by a listener.
pub async fn next<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(STEP, rx.recv())
        .await
        .expect("listener not invoked in time")
        .expect("listener channel closed")
}
