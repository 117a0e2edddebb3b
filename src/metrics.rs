//! Prometheus metrics collection for chatroute
//!
//! This module provides metrics instrumentation for tracking:
//! - Provider attempts by model and result
//! - Route outcomes by selection kind
//! - Attempt latency by model
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Result of a single provider attempt, as a metrics label
///
/// Restricting labels to a closed enum keeps cardinality bounded by the
/// catalog size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Timeout,
    RateLimited,
    EmptyReply,
    Failed,
}

impl AttemptResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptResult::Success => "success",
            AttemptResult::Timeout => "timeout",
            AttemptResult::RateLimited => "rate_limited",
            AttemptResult::EmptyReply => "empty_reply",
            AttemptResult::Failed => "failed",
        }
    }
}

/// Whether the caller chose `auto` or a specific model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Auto,
    Specific,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::Auto => "auto",
            SelectionKind::Specific => "specific",
        }
    }
}

/// Metrics collector for chatroute
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    attempts_total: IntCounterVec,
    attempt_duration: HistogramVec,
    outcomes_total: IntCounterVec,
    metrics_recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: catalog size × 5 results
        let attempts_total = IntCounterVec::new(
            Opts::new(
                "chatroute_attempts_total",
                "Provider attempts by model id and result",
            ),
            &["model", "result"],
        )?;

        // Buckets span fast replies up to well past the default 8s deadline
        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                "chatroute_attempt_duration_ms",
                "Provider attempt latency in milliseconds",
            )
            .buckets(vec![
                50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 32000.0,
            ]),
            &["model"],
        )?;

        // Cardinality: 2 selection kinds × 2 results
        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "chatroute_route_outcomes_total",
                "Routed chat turns by selection kind and final result",
            ),
            &["selection", "result"],
        )?;

        let metrics_recording_failures = IntCounterVec::new(
            Opts::new(
                "chatroute_metrics_recording_failures_total",
                "Metrics recording operation failures by operation. \
                Indicates Prometheus internal errors - frequent failures require investigation.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(attempt_duration.clone()))?;
        registry.register(Box::new(outcomes_total.clone()))?;
        registry.register(Box::new(metrics_recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            attempts_total,
            attempt_duration,
            outcomes_total,
            metrics_recording_failures,
        })
    }

    /// Record one provider attempt and its latency
    ///
    /// # Errors
    ///
    /// Returns an error if `duration_ms` is NaN, infinite or negative, or if
    /// the label lookup fails. Invalid durations would corrupt histogram
    /// percentiles, so nothing is recorded in that case.
    pub fn record_attempt(
        &self,
        model: &str,
        result: AttemptResult,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.attempts_total
            .get_metric_with_label_values(&[model, result.as_str()])?
            .inc();
        self.attempt_duration
            .get_metric_with_label_values(&[model])?
            .observe(duration_ms);
        Ok(())
    }

    /// Record the final outcome of a routed turn
    ///
    /// # Errors
    ///
    /// Returns an error if the label lookup fails.
    pub fn record_outcome(
        &self,
        selection: SelectionKind,
        success: bool,
    ) -> Result<(), prometheus::Error> {
        let result = if success { "success" } else { "failure" };
        self.outcomes_total
            .get_metric_with_label_values(&[selection.as_str(), result])?
            .inc();
        Ok(())
    }

    /// Record a metrics recording operation failure
    ///
    /// `operation` is one of `record_attempt` or `record_outcome`.
    pub fn metrics_recording_failure(&self, operation: &str) {
        self.metrics_recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    /// Attempts recorded for one model and result
    pub fn attempts_count(&self, model: &str, result: AttemptResult) -> u64 {
        self.attempts_total
            .get_metric_with_label_values(&[model, result.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Outcomes recorded for one selection kind and result
    pub fn outcomes_count(&self, selection: SelectionKind, success: bool) -> u64 {
        let result = if success { "success" } else { "failure" };
        self.outcomes_total
            .get_metric_with_label_values(&[selection.as_str(), result])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Total metrics recording failures across all operations
    pub fn metrics_recording_failures_count(&self) -> u64 {
        let metric_families = self.registry.gather();
        metric_families
            .iter()
            .find(|mf| mf.name() == "chatroute_metrics_recording_failures_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Gather all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}",
                metric_count, e
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            let valid_up_to = e.utf8_error().valid_up_to();
            tracing::error!(
                invalid_byte_index = valid_up_to,
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                valid_up_to, e
            ))
        })
    }
}
