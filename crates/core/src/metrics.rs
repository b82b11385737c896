//! Prometheus metrics for the transform engine.
//!
//! This module provides metrics for:
//! - Transform executions (outcome, duration)
//! - Availability probes of remote transformers
//! - Mimetype-mismatch retries

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// =============================================================================
// Transforms
// =============================================================================

/// Transform executions by transformer and result.
pub static TRANSFORM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transform_requests_total", "Total transform executions"),
        &["transformer", "result"], // result: "success", "unsupported", "failed"
    )
    .unwrap()
});

/// Transform duration in seconds, nested steps included.
pub static TRANSFORM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transform_duration_seconds",
            "Duration of transform executions",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["transformer"],
    )
    .unwrap()
});

// =============================================================================
// Availability and mismatch guard
// =============================================================================

/// Liveness probes by result.
pub static AVAILABILITY_PROBES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transform_availability_probes_total",
            "Total availability probes of remote transformers",
        ),
        &["result"], // "up", "down", "timeout"
    )
    .unwrap()
});

/// Recoveries attempted after a content failure with a detected mimetype.
pub static MIMETYPE_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transform_mimetype_retries_total",
            "Total retries with a detected mimetype",
        ),
        &["result"], // "retried", "no_transformer", "disabled"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all engine metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRANSFORM_REQUESTS.clone()),
        Box::new(TRANSFORM_DURATION.clone()),
        Box::new(AVAILABILITY_PROBES.clone()),
        Box::new(MIMETYPE_RETRIES.clone()),
    ]
}

/// Registers every engine metric with `registry`.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    for collector in all_metrics() {
        registry.register(collector)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        TRANSFORM_REQUESTS
            .with_label_values(&["libreoffice", "success"])
            .inc();
        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"transform_requests_total".to_string()));
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}
