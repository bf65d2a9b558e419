//! ---
//! rw_section: "05-networking-external-interfaces"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Network connectivity for websocket clients."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use railwatch_hub::{Connection, ConnectionId, SendError};
use tokio::sync::Mutex;

/// Write half of an accepted websocket, registered with the hub.
///
/// Writes are serialised through a mutex so broadcast payloads and keepalive
/// pings never interleave on the wire.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketConnection {
    /// Wrap the sink half of an upgraded socket.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            sink: Mutex::new(sink),
        }
    }

    /// Send a ping frame to probe liveness.
    pub async fn ping(&self) -> Result<(), SendError> {
        self.write(Message::Ping(Vec::new())).await
    }

    /// Best-effort close handshake; errors are irrelevant once closing.
    pub async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }

    async fn write(&self, message: Message) -> Result<(), SendError> {
        let mut sink = self.sink.lock().await;
        sink.send(message)
            .await
            .map_err(|err| SendError::Transport(err.to_string()))
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), SendError> {
        self.write(Message::Text(payload.to_owned())).await
    }
}
