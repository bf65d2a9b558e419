//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Timer-driven producer that feeds the connection hub."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use anyhow::{anyhow, Result};
use railwatch_hub::ConnectionHub;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::generator::{Tick, TickSource};
use crate::metrics::StreamMetrics;

/// Drives a [`TickSource`] on a fixed period and broadcasts its output.
pub struct TelemetryStream {
    hub: ConnectionHub,
    source: Box<dyn TickSource>,
    period: Duration,
    metrics: Option<StreamMetrics>,
}

impl TelemetryStream {
    /// Stream `source` into `hub` once per `period`.
    pub fn new(hub: ConnectionHub, source: impl TickSource + 'static, period: Duration) -> Self {
        Self {
            hub,
            source: Box::new(source),
            period,
            metrics: None,
        }
    }

    /// Record ticks, defects and skipped ticks to `metrics`.
    pub fn with_metrics(mut self, metrics: StreamMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run exactly one tick at `elapsed` and broadcast its messages in order.
    ///
    /// A panicking source is logged and the tick is skipped; `None` is
    /// returned in that case.
    pub async fn step(&mut self, elapsed: Duration) -> Option<Tick> {
        let source = &mut self.source;
        let tick = match catch_unwind(AssertUnwindSafe(|| source.tick(elapsed))) {
            Ok(tick) => tick,
            Err(payload) => {
                error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    panic = panic_message(payload.as_ref()),
                    "telemetry tick panicked; skipping"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_tick_failure();
                }
                return None;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_tick();
        }
        if let Some(defect) = &tick.defect {
            info!(
                class = defect.class.as_str(),
                severity = defect.severity.as_str(),
                chainage_m = defect.chainage_m,
                "synthetic defect emitted"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_defect(defect.class.as_str(), defect.severity.as_str());
            }
        }

        for message in tick.messages() {
            self.hub.broadcast(&message).await;
        }
        Some(tick)
    }

    /// Start the perpetual loop on the current runtime.
    pub fn spawn(self) -> StreamHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        StreamHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let started = Instant::now();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;
        info!(period_ms = self.period.as_millis() as u64, "telemetry stream started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(ticks, "telemetry stream shutdown received");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.step(started.elapsed()).await.is_some() {
                        ticks += 1;
                    }
                }
            }
        }
        info!(ticks, "telemetry stream stopped");
        ticks
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Handle for a spawned [`TelemetryStream`].
#[derive(Debug)]
pub struct StreamHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl StreamHandle {
    /// Stop the loop and wait for it to exit. Returns the number of completed ticks.
    pub async fn shutdown(self) -> Result<u64> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|err| anyhow!(err))
    }
}
