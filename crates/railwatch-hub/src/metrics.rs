//! ---
//! rw_section: "02-connection-hub"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Live connection registry and broadcast fan-out."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Metrics published by the connection hub.
#[derive(Clone, Debug)]
pub struct HubMetrics {
    connections: IntGauge,
    broadcasts: IntCounter,
    deliveries: IntCounter,
    dropped: IntCounterVec,
    serialization_failures: IntCounter,
}

impl HubMetrics {
    /// Register all hub metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let connections = IntGauge::with_opts(Opts::new(
            "railwatch_hub_connections",
            "Number of client connections currently registered with the hub",
        ))?;
        registry.register(Box::new(connections.clone()))?;

        let broadcasts = IntCounter::with_opts(Opts::new(
            "railwatch_hub_broadcasts_total",
            "Total broadcast passes started by the hub",
        ))?;
        registry.register(Box::new(broadcasts.clone()))?;

        let deliveries = IntCounter::with_opts(Opts::new(
            "railwatch_hub_deliveries_total",
            "Total messages successfully handed to a client connection",
        ))?;
        registry.register(Box::new(deliveries.clone()))?;

        let dropped = IntCounterVec::new(
            Opts::new(
                "railwatch_hub_dropped_connections_total",
                "Connections removed after a failed send, by failure reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(dropped.clone()))?;

        let serialization_failures = IntCounter::with_opts(Opts::new(
            "railwatch_hub_serialization_failures_total",
            "Broadcasts skipped because the message could not be encoded",
        ))?;
        registry.register(Box::new(serialization_failures.clone()))?;

        Ok(Self {
            connections,
            broadcasts,
            deliveries,
            dropped,
            serialization_failures,
        })
    }

    pub(crate) fn set_connections(&self, count: usize) {
        self.connections.set(count as i64);
    }

    pub(crate) fn record_broadcast(&self) {
        self.broadcasts.inc();
    }

    pub(crate) fn record_deliveries(&self, count: usize) {
        self.deliveries.inc_by(count as u64);
    }

    pub(crate) fn record_dropped(&self, reason: &str) {
        self.dropped.with_label_values(&[reason]).inc();
    }

    pub(crate) fn record_serialization_failure(&self) {
        self.serialization_failures.inc();
    }

    /// Current value of the membership gauge.
    pub fn connections(&self) -> i64 {
        self.connections.get()
    }

    /// Total successful deliveries recorded so far.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.get()
    }

    /// Total connections dropped for `reason`.
    pub fn dropped(&self, reason: &str) -> u64 {
        self.dropped.with_label_values(&[reason]).get()
    }
}
