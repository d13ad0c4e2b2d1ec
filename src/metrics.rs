//! In-process duration metrics.
//!
//! Durations are recorded in seconds under a metric name and summarised on
//! demand. Recording is switched off entirely when the registry is disabled.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub total: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Thread-safe registry of named duration samples.
#[derive(Debug)]
pub struct MetricsRegistry {
    enabled: AtomicBool,
    samples: Mutex<HashMap<String, Vec<f64>>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::with_enabled(true)
    }
}

impl MetricsRegistry {
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Enabled when `PERF_ENABLED` is unset or exactly `"1"`.
    pub fn from_env() -> Self {
        Self::with_enabled(enabled_from(std::env::var("PERF_ENABLED").ok().as_deref()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record one sample. No-op while disabled.
    pub fn record(&self, name: &str, seconds: f64) {
        if !self.is_enabled() {
            return;
        }
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        samples.entry(name.to_string()).or_default().push(seconds);
    }

    /// Run `f`, recording its wall-clock duration under `name`.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        if !self.is_enabled() {
            return f();
        }
        let start = Instant::now();
        let out = f();
        self.record(name, start.elapsed().as_secs_f64());
        out
    }

    /// Per-metric summaries, keyed by name. Empty while disabled.
    pub fn snapshot(&self) -> BTreeMap<String, MetricSummary> {
        if !self.is_enabled() {
            return BTreeMap::new();
        }
        // Copy out so the lock is not held while sorting.
        let copied: Vec<(String, Vec<f64>)> = {
            let samples = self
                .samples
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            samples
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        copied
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, mut values)| {
                values.sort_by(f64::total_cmp);
                let count = values.len();
                let total: f64 = values.iter().sum();
                let summary = MetricSummary {
                    count,
                    total,
                    avg: total / count as f64,
                    p50: percentile(&values, 50.0),
                    p95: percentile(&values, 95.0),
                };
                (name, summary)
            })
            .collect()
    }

    pub fn reset(&self) {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Interpret a `PERF_ENABLED` value.
pub fn enabled_from(value: Option<&str>) -> bool {
    value.is_none_or(|v| v == "1")
}

/// Linear-interpolated percentile of an ascending slice; 0.0 when empty.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return 0.0;
    };
    if pct <= 0.0 {
        return sorted[0];
    }
    if pct >= 100.0 {
        return last;
    }
    let rank = (sorted.len() - 1) as f64 * (pct / 100.0);
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] * (hi as f64 - rank) + sorted[hi] * (rank - lo as f64)
}
