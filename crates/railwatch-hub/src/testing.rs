//! ---
//! rw_section: "02-connection-hub"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "test"
//! rw_description: "In-memory connection doubles for hub consumers' tests."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
//! In-memory [`Connection`] implementations for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::{Connection, ConnectionId, SendError};

/// Records every payload it receives; can be switched to fail.
#[derive(Debug)]
pub struct RecordingConnection {
    id: ConnectionId,
    received: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingConnection {
    /// New healthy connection with a fresh id.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            received: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    /// Identity reported to the hub.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Make every subsequent send fail with [`SendError::Closed`].
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Payloads received so far, in delivery order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), SendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.received.lock().push(payload.to_owned());
        Ok(())
    }
}

/// Never completes a send; exercises the hub's per-send timeout.
#[derive(Debug)]
pub struct StalledConnection {
    id: ConnectionId,
}

impl StalledConnection {
    /// New stalled connection with a fresh id.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
        })
    }

    /// Identity reported to the hub.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[async_trait]
impl Connection for StalledConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, _payload: &str) -> Result<(), SendError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
