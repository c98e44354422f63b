//! Metric name constants and recording helpers

use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    let duration = start.elapsed().as_secs_f64();
    histogram.record(duration, attributes);
}

// Generation metric names
pub const GENERATION_COUNT: &str = "atelier.generation.count";
pub const GENERATION_DURATION: &str = "atelier.generation.duration";

// Persistence and feedback metric names
pub const PERSISTENCE_DEGRADED: &str = "atelier.persistence.degraded";
pub const FEEDBACK_ROLLBACK: &str = "atelier.feedback.rollback";

/// Instruments used by the studio components
///
/// Built from the global meter, so create it after [`crate::init`] has
/// installed the exporting provider. Before that every instrument is a
/// no-op.
#[derive(Clone)]
pub struct StudioMetrics {
    generation_count: Counter<u64>,
    generation_duration: Histogram<f64>,
    persistence_degraded: Counter<u64>,
    feedback_rollback: Counter<u64>,
}

impl StudioMetrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("atelier");

        Self {
            generation_count: meter
                .u64_counter(GENERATION_COUNT)
                .with_description("Generation attempts by outcome")
                .build(),
            generation_duration: meter
                .f64_histogram(GENERATION_DURATION)
                .with_description("Time from submission to result")
                .with_unit("s")
                .build(),
            persistence_degraded: meter
                .u64_counter(PERSISTENCE_DEGRADED)
                .with_description("Persistence steps that failed and were skipped")
                .build(),
            feedback_rollback: meter
                .u64_counter(FEEDBACK_ROLLBACK)
                .with_description("Optimistic feedback updates rolled back")
                .build(),
        }
    }

    /// Count one finished attempt and, for real results, its latency
    pub fn record_generation(&self, model: &str, outcome: &'static str, start: Instant) {
        let attributes = [
            KeyValue::new("model", model.to_owned()),
            KeyValue::new("outcome", outcome),
        ];
        self.generation_count.add(1, &attributes);
        if outcome == "completed" {
            record_duration(&self.generation_duration, start, &attributes[..1]);
        }
    }

    /// Count a persistence step that degraded, `stage` is `upload` or `record`
    pub fn record_persistence_degraded(&self, stage: &'static str) {
        self.persistence_degraded.add(1, &[KeyValue::new("stage", stage)]);
    }

    pub fn record_feedback_rollback(&self) {
        self.feedback_rollback.add(1, &[]);
    }
}

impl Default for StudioMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StudioMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioMetrics").finish_non_exhaustive()
    }
}
