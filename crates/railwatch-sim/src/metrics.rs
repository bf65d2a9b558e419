//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Prometheus instrumentation for the telemetry stream."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Metrics published by the telemetry stream loop.
#[derive(Clone, Debug)]
pub struct StreamMetrics {
    ticks: IntCounter,
    defects: IntCounterVec,
    tick_failures: IntCounter,
}

impl StreamMetrics {
    /// Register all stream metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let ticks = IntCounter::with_opts(Opts::new(
            "railwatch_stream_ticks_total",
            "Generator ticks that produced a telemetry sample",
        ))?;
        registry.register(Box::new(ticks.clone()))?;

        let defects = IntCounterVec::new(
            Opts::new(
                "railwatch_stream_defects_total",
                "Synthetic defect events emitted, by class and severity",
            ),
            &["class", "severity"],
        )?;
        registry.register(Box::new(defects.clone()))?;

        let tick_failures = IntCounter::with_opts(Opts::new(
            "railwatch_stream_tick_failures_total",
            "Generator ticks that panicked and were skipped",
        ))?;
        registry.register(Box::new(tick_failures.clone()))?;

        Ok(Self {
            ticks,
            defects,
            tick_failures,
        })
    }

    /// Count one completed tick.
    pub fn record_tick(&self) {
        self.ticks.inc();
    }

    /// Count one defect under its wire labels.
    pub fn record_defect(&self, class: &str, severity: &str) {
        self.defects.with_label_values(&[class, severity]).inc();
    }

    /// Count one tick skipped after a panic.
    pub fn record_tick_failure(&self) {
        self.tick_failures.inc();
    }

    /// Completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Skipped ticks so far.
    pub fn tick_failures(&self) -> u64 {
        self.tick_failures.get()
    }
}
