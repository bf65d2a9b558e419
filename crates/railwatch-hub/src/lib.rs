//! ---
//! rw_section: "02-connection-hub"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Live connection registry and broadcast fan-out."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
//! Connection hub for RailWatch.
//!
//! The hub owns membership of every open client connection and fans each
//! broadcast out to all of them. It never closes a connection itself; a
//! member whose send fails is simply forgotten once the delivery pass ends.
#![warn(missing_docs)]

pub mod connection;
pub mod hub;
pub mod metrics;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::{Connection, ConnectionId, SendError};
pub use hub::{ConnectionHub, HubConfig};
pub use metrics::HubMetrics;
