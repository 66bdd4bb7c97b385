//! In-process WebSocket pairs and a scripted client for tests.

use futures_util::{SinkExt, StreamExt};
use stowage_protocol::StatusMessage;
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::{Message as WsMessage, Role};

pub(crate) type TestSocket = WebSocketStream<DuplexStream>;

/// Connected server and client sockets over an in-memory pipe.
pub(crate) async fn ws_pair() -> (TestSocket, TestSocket) {
    let (server_io, client_io) = tokio::io::duplex(256 * 1024);
    tokio::join!(
        WebSocketStream::from_raw_socket(server_io, Role::Server, None),
        WebSocketStream::from_raw_socket(client_io, Role::Client, None),
    )
}

/// Client side of the upload protocol.
pub(crate) struct TestClient {
    ws: TestSocket,
}

impl TestClient {
    pub(crate) fn new(ws: TestSocket) -> Self {
        Self { ws }
    }

    /// Next text frame, or `None` once the connection is gone.
    pub(crate) async fn try_recv_text(&mut self) -> Option<String> {
        loop {
            match self.ws.next().await? {
                Ok(WsMessage::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(WsMessage::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    pub(crate) async fn recv_text(&mut self) -> String {
        self.try_recv_text().await.expect("connection closed")
    }

    pub(crate) async fn recv_status(&mut self) -> StatusMessage {
        let text = self.recv_text().await;
        serde_json::from_str(&text).unwrap_or_else(|e| panic!("not a status: {text}: {e}"))
    }

    /// Reads frames until `literal`, returning the progress parts seen on
    /// the way.
    pub(crate) async fn recv_until(&mut self, literal: &str) -> Vec<u64> {
        let mut parts = Vec::new();
        loop {
            let text = self.recv_text().await;
            if text == literal {
                return parts;
            }
            let status: StatusMessage = serde_json::from_str(&text)
                .unwrap_or_else(|e| panic!("expected {literal}, got {text}: {e}"));
            match status.part {
                Some(part) if status.code.is_none() => parts.push(part),
                _ => panic!("expected {literal}, got {text}"),
            }
        }
    }

    /// Reads the next coded status, skipping progress updates.
    pub(crate) async fn recv_reply(&mut self) -> StatusMessage {
        loop {
            let status = self.recv_status().await;
            if status.code.is_some() {
                return status;
            }
        }
    }

    pub(crate) async fn expect_ready(&mut self) {
        assert_eq!(self.recv_status().await, StatusMessage::ready());
    }

    pub(crate) async fn send_text(&mut self, text: &str) {
        self.ws.send(WsMessage::Text(text.into())).await.unwrap();
    }

    pub(crate) async fn send_binary(&mut self, data: Vec<u8>) {
        self.ws.send(WsMessage::Binary(data.into())).await.unwrap();
    }

    pub(crate) async fn send_header(&mut self, filename: &str, size: u64) {
        let header = format!(r#"{{"filename":"{filename}","size":{size}}}"#);
        self.send_text(&header).await;
    }

    pub(crate) async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Deterministic test payload.
pub(crate) fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
