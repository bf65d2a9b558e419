//! ---
//! rw_section: "02-connection-hub"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Live connection registry and broadcast fan-out."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a registered connection, also used as the logging key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID value.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reason a single delivery attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The peer has already closed the channel.
    #[error("connection closed")]
    Closed,
    /// The underlying transport reported a write error.
    #[error("transport error: {0}")]
    Transport(String),
    /// The send did not complete within the hub's per-send budget.
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
}

impl SendError {
    /// Stable label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            SendError::Closed => "closed",
            SendError::Transport(_) => "transport",
            SendError::TimedOut(_) => "timeout",
        }
    }
}

/// Open duplex channel able to receive serialised messages.
///
/// The transport layer owns the I/O lifetime; the hub only holds a handle for
/// membership and delivery.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identity used for set membership.
    fn id(&self) -> ConnectionId;

    /// Deliver one serialised message. Implementations must preserve call
    /// order for a given connection.
    async fn send(&self, payload: &str) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_display_as_uuid() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }

    #[test]
    fn send_error_reasons_are_stable() {
        assert_eq!(SendError::Closed.reason(), "closed");
        assert_eq!(SendError::Transport("broken pipe".into()).reason(), "transport");
        assert_eq!(
            SendError::TimedOut(Duration::from_millis(5)).reason(),
            "timeout"
        );
    }
}
