//! ---
//! rw_section: "05-networking-external-interfaces"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Network connectivity for websocket clients."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use railwatch_common::ServerConfig;
use railwatch_hub::{Connection, ConnectionHub};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::connection::WebSocketConnection;

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `true` while the process is serving requests.
    pub ok: bool,
}

struct ServerState {
    hub: ConnectionHub,
    keepalive_interval: Duration,
    send_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

/// Builder for the HTTP server hosting `/ws` and `/health`.
#[derive(Clone)]
pub struct ServerBuilder {
    config: ServerConfig,
    hub: ConnectionHub,
}

impl ServerBuilder {
    /// Create a builder that registers accepted clients with `hub`.
    pub fn new(config: ServerConfig, hub: ConnectionHub) -> Self {
        Self { config, hub }
    }

    /// Override the listen address, e.g. `127.0.0.1:0` in tests.
    pub fn listen(mut self, listen: SocketAddr) -> Self {
        self.config.listen = listen;
        self
    }

    /// Bind the listener and serve until the returned handle is shut down.
    pub async fn spawn(self) -> anyhow::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "websocket server listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let state = Arc::new(ServerState {
            hub: self.hub,
            keepalive_interval: self.config.keepalive_interval,
            send_timeout: self.config.send_timeout,
            shutdown: shutdown_tx.subscribe(),
        });

        let app = Router::new()
            .route("/ws", get(upgrade_handler))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(err) = server.await {
                warn!(error = %err, "websocket server exited with error");
            }
        });

        Ok(ServerHandle {
            address: local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running server.
pub struct ServerHandle {
    address: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Return the bound listening address.
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Close client sessions, stop accepting, and await completion.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(err) => Err(anyhow::anyhow!(err)),
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ServerState>>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| client_session(socket, peer, state))
}

/// Hold one client open: register, wait for close, a failed keepalive or
/// removal by the hub, then deregister. Inbound data frames carry no protocol
/// and are ignored.
async fn client_session(socket: WebSocket, peer: SocketAddr, state: Arc<ServerState>) {
    let (sink, mut inbound) = socket.split();
    let conn = Arc::new(WebSocketConnection::new(sink));
    let id = conn.id();
    state.hub.connect(conn.clone());

    let period = state.keepalive_interval;
    let write_budget = state.send_timeout;
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = state.shutdown.clone();

    let reason = loop {
        tokio::select! {
            frame = inbound.next() => match frame {
                None => break "stream ended",
                Some(Err(err)) => {
                    debug!(connection = %id, error = %err, "websocket read failed");
                    break "read error";
                }
                Some(Ok(Message::Close(_))) => break "client closed",
                Some(Ok(_)) => {}
            },
            _ = keepalive.tick() => {
                // A member the hub dropped would otherwise idle here forever
                // without receiving broadcasts.
                if !state.hub.contains(id) {
                    close_within(&conn, write_budget).await;
                    break "dropped by hub";
                }
                match timeout(write_budget, conn.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        debug!(connection = %id, error = %err, "keepalive ping failed");
                        break "keepalive failed";
                    }
                    Err(_) => {
                        debug!(connection = %id, budget_ms = write_budget.as_millis() as u64, "keepalive ping timed out");
                        break "keepalive timed out";
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    close_within(&conn, write_budget).await;
                    break "server shutdown";
                }
            }
        }
    };

    state.hub.disconnect(id);
    info!(connection = %id, peer = %peer, reason, "websocket session ended");
}

/// Attempt a close handshake; a peer that cannot take the frame is abandoned
/// and the socket dropped with the session.
async fn close_within(conn: &WebSocketConnection, budget: Duration) {
    if timeout(budget, conn.close()).await.is_err() {
        debug!(connection = %conn.id(), "close handshake timed out");
    }
}
