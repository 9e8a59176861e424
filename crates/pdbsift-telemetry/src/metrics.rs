//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counts work units and individual files per pipeline stage and outcome.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across pipeline stages.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    units_total: IntCounterVec,
    files_total: IntCounterVec,
    run_duration_ms: IntGauge,
    units_seen: AtomicU64,
    files_seen: AtomicU64,
}

/// Snapshot of selected gauges and counters for run summaries.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Wall-clock duration of the last completed run (ms).
    pub run_duration_ms: i64,
    /// Total work units processed across every stage and outcome.
    pub units_total: u64,
    /// Total files touched across every stage and outcome.
    pub files_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// constructed or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let units_total = IntCounterVec::new(
            Opts::new(
                "pipeline_units_total",
                "Work units handled by pipeline stages by outcome",
            ),
            &["stage", "outcome"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "pipeline_units_total",
            source,
        })?;
        let files_total = IntCounterVec::new(
            Opts::new(
                "pipeline_files_total",
                "Files handled by pipeline stages by outcome",
            ),
            &["stage", "outcome"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "pipeline_files_total",
            source,
        })?;
        let run_duration_ms = IntGauge::with_opts(Opts::new(
            "pipeline_run_duration_ms",
            "Wall-clock duration of the last pipeline run (ms)",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "pipeline_run_duration_ms",
            source,
        })?;

        registry
            .register(Box::new(units_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: "pipeline_units_total",
                source,
            })?;
        registry
            .register(Box::new(files_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: "pipeline_files_total",
                source,
            })?;
        registry
            .register(Box::new(run_duration_ms.clone()))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: "pipeline_run_duration_ms",
                source,
            })?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                units_total,
                files_total,
                run_duration_ms,
                units_seen: AtomicU64::new(0),
                files_seen: AtomicU64::new(0),
            }),
        })
    }

    /// Increment the work unit counter for a stage outcome.
    pub fn inc_unit(&self, stage: &str, outcome: &str) {
        self.inner
            .units_total
            .with_label_values(&[stage, outcome])
            .inc();
        self.inner.units_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the file counter for a stage outcome.
    pub fn inc_file(&self, stage: &str, outcome: &str) {
        self.inner
            .files_total
            .with_label_values(&[stage, outcome])
            .inc();
        self.inner.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall-clock duration of a completed run.
    pub fn observe_run_duration(&self, duration: Duration) {
        self.inner
            .run_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Read the current value of a file counter.
    #[must_use]
    pub fn file_count(&self, stage: &str, outcome: &str) -> u64 {
        self.inner
            .files_total
            .with_label_values(&[stage, outcome])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Render the registry and write it to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        fs::write(path, rendered).map_err(|source| TelemetryError::MetricsWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Take a point-in-time snapshot of the run gauges and counter totals.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            run_duration_ms: self.inner.run_duration_ms.get(),
            units_total: self.inner.units_seen.load(Ordering::Relaxed),
            files_total: self.inner.files_seen.load(Ordering::Relaxed),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}
