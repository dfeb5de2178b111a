//! # Prometheus Metrics
//!
//! Counters for a scenario run. All metrics are registered in a dedicated
//! [`prometheus::Registry`] under the `crown` prefix and can be rendered in
//! the text exposition format once the run is over.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Holds all Prometheus metric handles for one run.
#[derive(Clone)]
pub struct RunMetrics {
    registry: Registry,
    /// Steps attempted, successful or not.
    pub steps_executed_total: IntCounter,
    /// Steps that failed and were rolled back.
    pub steps_reverted_total: IntCounter,
    /// Events emitted by successful steps.
    pub events_emitted_total: IntCounter,
    /// Wall time per step in seconds.
    pub step_duration_seconds: Histogram,
}

impl RunMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("crown".into()), None)?;

        let steps_executed_total =
            IntCounter::new("steps_executed_total", "Total number of scenario steps executed")?;
        registry.register(Box::new(steps_executed_total.clone()))?;

        let steps_reverted_total = IntCounter::new(
            "steps_reverted_total",
            "Total number of scenario steps that failed and were rolled back",
        )?;
        registry.register(Box::new(steps_reverted_total.clone()))?;

        let events_emitted_total =
            IntCounter::new("events_emitted_total", "Total number of contract events emitted")?;
        registry.register(Box::new(events_emitted_total.clone()))?;

        let step_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("step_duration_seconds", "Time spent executing one step")
                .buckets(vec![0.000_01, 0.000_1, 0.001, 0.01, 0.1]),
        )?;
        registry.register(Box::new(step_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            steps_executed_total,
            steps_reverted_total,
            events_emitted_total,
            step_duration_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
