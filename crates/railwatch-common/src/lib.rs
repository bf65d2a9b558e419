//! ---
//! rw_section: "01-core-functionality"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Shared primitives and utilities for the service runtime."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
//! Shared primitives for the RailWatch workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the daemon and its supporting crates.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, ServerConfig, StreamConfig,
};
pub use logging::{init_tracing, LogFormat};
