//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "01-bootstrap"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Simulation runtime module exports and shared types."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
//! Synthetic telemetry for RailWatch.
//!
//! [`TelemetryGenerator`] fabricates one telemetry sample per tick and, with a
//! fixed probability, a defect event at the same position. [`TelemetryStream`]
//! drives a generator on a timer and hands every message to the connection hub.
#![warn(missing_docs)]

pub mod generator;
pub mod messages;
pub mod metrics;
pub mod stream;

pub use generator::{GeneratorProfile, TelemetryGenerator, Tick, TickSource};
pub use messages::{DefectClass, DefectEvent, GpsFix, Imu, Severity, TelemetryMessage, TelemetrySample};
pub use metrics::StreamMetrics;
pub use stream::{StreamHandle, TelemetryStream};
