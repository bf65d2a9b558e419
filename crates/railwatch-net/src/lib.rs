//! ---
//! rw_section: "05-networking-external-interfaces"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Network connectivity for websocket clients."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Transport layer: accepts websocket clients on `/ws`, registers them with
//! the [`railwatch_hub::ConnectionHub`] and holds them open until they go
//! away. A liveness probe is served on `/health`.

pub mod connection;
pub mod server;

pub use connection::WebSocketConnection;
pub use server::{HealthResponse, ServerBuilder, ServerHandle};
