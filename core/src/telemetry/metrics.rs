use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counts served views and forecast fallbacks for the health endpoint.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub served: BTreeMap<String, usize>,
    pub fallbacks: usize,
    pub errors: usize,
}

#[derive(Default)]
struct Metrics {
    served: BTreeMap<String, usize>,
    fallbacks: usize,
    errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_served(&self, view: &str) {
        if let Ok(mut metrics) = self.inner.lock() {
            *metrics.served.entry(view.to_string()).or_insert(0) += 1;
        }
    }

    /// A forecast failed and the view fell back to historical data.
    pub fn record_fallback(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.fallbacks += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                served: metrics.served.clone(),
                fallbacks: metrics.fallbacks,
                errors: metrics.errors,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_per_view() {
        let metrics = MetricsRecorder::new();
        metrics.record_served("bar");
        metrics.record_served("bar");
        metrics.record_served("forecast");
        metrics.record_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.served.get("bar"), Some(&2));
        assert_eq!(snapshot.served.get("forecast"), Some(&1));
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.errors, 0);
    }
}
