//! Prometheus metrics for event ingestion and timeline layout.
//!
//! The recorder is optional. When it is not installed every `counter!` and
//! `gauge!` call below is a no-op.
//!
//! # Example
//!
//! ```rust,no_run
//! use jobscope_core::telemetry::metrics::{EventMetrics, MetricsConfig, init_metrics};
//!
//! let registry = init_metrics(&MetricsConfig::default(), "jobscope").unwrap();
//! EventMetrics::record_dropped("unknown_job");
//! println!("{}", registry.render());
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether the Prometheus recorder is installed.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for layout durations (in seconds).
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Labels added to every metric.
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]
}

/// Handle to the installed recorder, if any.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder behind it.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the Prometheus recorder.
///
/// # Errors
///
/// Returns an error if the buckets are invalid or a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "jobscope_events_total",
        "Scheduler events processed, by kind and outcome"
    );
    describe_counter!(
        "jobscope_events_dropped_total",
        "Scheduler events dropped, by reason"
    );
    describe_gauge!("jobscope_jobs_tracked", "Jobs held by the scheduler model");

    describe_counter!(
        "jobscope_layout_computations_total",
        "Timeline scenes computed, by view"
    );
    describe_histogram!(
        "jobscope_layout_duration_seconds",
        "Time spent computing a timeline scene"
    );
    describe_gauge!("jobscope_visible_jobs", "Lanes in the most recent scene");

    describe_counter!("jobscope_errors_total", "Errors by code and category");
}

/// Counters for the event ingestion path.
pub struct EventMetrics;

impl EventMetrics {
    /// Count one processed event.
    pub fn record(kind: &str, outcome: &'static str) {
        counter!(
            "jobscope_events_total",
            "kind" => kind.to_string(),
            "outcome" => outcome,
        )
        .increment(1);
    }

    /// Count one dropped event.
    pub fn record_dropped(reason: &'static str) {
        counter!("jobscope_events_dropped_total", "reason" => reason).increment(1);
    }

    pub fn set_jobs_tracked(count: usize) {
        gauge!("jobscope_jobs_tracked").set(count as f64);
    }
}

/// Metrics for scene computation.
pub struct LayoutMetrics;

impl LayoutMetrics {
    /// Start timing a layout for `view` (`overview` or `detail`).
    pub fn start(view: &'static str) -> LayoutTimer {
        LayoutTimer {
            start: Instant::now(),
            view,
        }
    }
}

/// Records duration and lane count when finished.
pub struct LayoutTimer {
    start: Instant,
    view: &'static str,
}

impl LayoutTimer {
    pub fn finish(self, visible_jobs: usize) {
        counter!("jobscope_layout_computations_total", "view" => self.view).increment(1);
        histogram!("jobscope_layout_duration_seconds", "view" => self.view)
            .record(self.start.elapsed().as_secs_f64());
        gauge!("jobscope_visible_jobs", "view" => self.view).set(visible_jobs as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_registry_renders_nothing() {
        let registry = MetricsRegistry::disabled();
        assert!(!registry.is_enabled());
        assert_eq!(registry.render(), "");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        EventMetrics::record("job_added", "applied");
        EventMetrics::record_dropped("unknown_job");
        LayoutMetrics::start("overview").finish(3);
    }
}
