//! ---
//! rw_section: "02-connection-hub"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Live connection registry and broadcast fan-out."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, trace};

use crate::connection::{Connection, ConnectionId, SendError};
use crate::metrics::HubMetrics;

/// Tunables for the hub's delivery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Upper bound on a single recipient's send. A stalled peer is treated as
    /// failed once this elapses so it cannot hold up the rest of the pass.
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

struct HubInner {
    connections: RwLock<HashMap<ConnectionId, Arc<dyn Connection>>>,
    config: HubConfig,
    metrics: Option<HubMetrics>,
}

/// Registry of live connections with best-effort fan-out.
///
/// Cloning is cheap and every clone shares the same membership set. The set
/// lock is only taken for short, synchronous sections and never across an
/// `.await`, so `connect`/`disconnect` from reader tasks never wait on a slow
/// broadcast.
#[derive(Clone)]
pub struct ConnectionHub {
    inner: Arc<HubInner>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an empty hub that records to the supplied metrics.
    pub fn with_metrics(config: HubConfig, metrics: HubMetrics) -> Self {
        Self::build(config, Some(metrics))
    }

    fn build(config: HubConfig, metrics: Option<HubMetrics>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                config,
                metrics,
            }),
        }
    }

    /// Register a connection. Returns `false` when a member with the same id
    /// already exists, in which case the set is left untouched.
    pub fn connect(&self, conn: Arc<dyn Connection>) -> bool {
        let id = conn.id();
        let members = {
            let mut connections = self.inner.connections.write();
            if connections.contains_key(&id) {
                return false;
            }
            connections.insert(id, conn);
            connections.len()
        };
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_connections(members);
        }
        info!(connection = %id, members, "connection registered");
        true
    }

    /// Forget a connection. Removing an absent id is a no-op and returns `false`.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let (removed, members) = {
            let mut connections = self.inner.connections.write();
            let removed = connections.remove(&id).is_some();
            (removed, connections.len())
        };
        if removed {
            if let Some(metrics) = &self.inner.metrics {
                metrics.set_connections(members);
            }
            info!(connection = %id, members, "connection deregistered");
        }
        removed
    }

    /// Serialise `message` once and deliver it to every current member.
    ///
    /// Failures never escape: a member whose send fails or times out is
    /// removed after the pass completes, and an unserialisable message is
    /// logged and dropped without reaching anyone.
    pub async fn broadcast<M>(&self, message: &M)
    where
        M: Serialize + ?Sized,
    {
        let payload: Arc<str> = match serde_json::to_string(message) {
            Ok(text) => Arc::from(text),
            Err(err) => {
                error!(error = %err, "failed to serialise broadcast message; skipping");
                if let Some(metrics) = &self.inner.metrics {
                    metrics.record_serialization_failure();
                }
                return;
            }
        };
        self.broadcast_text(payload).await;
    }

    /// Deliver an already-serialised payload to every current member.
    pub async fn broadcast_text(&self, payload: Arc<str>) {
        let members: Vec<Arc<dyn Connection>> =
            self.inner.connections.read().values().cloned().collect();
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_broadcast();
        }
        if members.is_empty() {
            trace!("broadcast skipped; no connections registered");
            return;
        }

        let send_timeout = self.inner.config.send_timeout;
        let outcomes = join_all(members.iter().map(|conn| {
            let payload = Arc::clone(&payload);
            async move {
                let outcome = match timeout(send_timeout, conn.send(&payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(SendError::TimedOut(send_timeout)),
                };
                (conn.id(), outcome)
            }
        }))
        .await;

        let mut delivered = 0usize;
        let mut failed = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered += 1,
                Err(err) => {
                    debug!(connection = %id, reason = err.reason(), error = %err, "send failed; scheduling removal");
                    failed.push((id, err));
                }
            }
        }
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_deliveries(delivered);
        }

        if failed.is_empty() {
            trace!(delivered, "broadcast complete");
            return;
        }
        self.remove_failed(&failed);
    }

    fn remove_failed(&self, failed: &[(ConnectionId, SendError)]) {
        let (removed, members) = {
            let mut connections = self.inner.connections.write();
            let mut removed = Vec::with_capacity(failed.len());
            for (id, err) in failed {
                if connections.remove(id).is_some() {
                    removed.push((*id, err.reason()));
                }
            }
            (removed, connections.len())
        };
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_connections(members);
            for (_, reason) in &removed {
                metrics.record_dropped(reason);
            }
        }
        for (id, reason) in &removed {
            info!(connection = %id, reason, members, "dropped connection after failed send");
        }
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.connections.read().is_empty()
    }

    /// Whether `id` is currently a member.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.connections.read().contains_key(&id)
    }

    /// Snapshot of current member ids in unspecified order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.connections.read().keys().copied().collect()
    }

    /// Active hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl fmt::Debug for ConnectionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHub")
            .field("members", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
