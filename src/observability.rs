//! Observability (tracing setup, import counters)

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Logs go to stderr so command output
/// on stdout stays machine-readable. Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Counters for one import run
#[derive(Debug, Default)]
pub struct ImportMetrics {
    metadata_succeeded: AtomicU64,
    metadata_failed: AtomicU64,
    writes_failed: AtomicU64,
    file_meta_resolved: AtomicU64,
    file_meta_degraded: AtomicU64,
    file_updates_failed: AtomicU64,
}

impl ImportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_succeeded(&self) {
        self.metadata_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "metadata_succeeded", "Metric incremented");
    }

    pub fn metadata_failed(&self) {
        self.metadata_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "metadata_failed", "Metric incremented");
    }

    pub fn write_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "writes_failed", "Metric incremented");
    }

    pub fn file_meta_resolved(&self) {
        self.file_meta_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "file_meta_resolved", "Metric incremented");
    }

    pub fn file_meta_degraded(&self) {
        self.file_meta_degraded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "file_meta_degraded", "Metric incremented");
    }

    pub fn file_update_failed(&self) {
        self.file_updates_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "file_updates_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> ImportMetricsSnapshot {
        ImportMetricsSnapshot {
            metadata_succeeded: self.metadata_succeeded.load(Ordering::Relaxed),
            metadata_failed: self.metadata_failed.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            file_meta_resolved: self.file_meta_resolved.load(Ordering::Relaxed),
            file_meta_degraded: self.file_meta_degraded.load(Ordering::Relaxed),
            file_updates_failed: self.file_updates_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMetricsSnapshot {
    pub metadata_succeeded: u64,
    pub metadata_failed: u64,
    pub writes_failed: u64,
    pub file_meta_resolved: u64,
    pub file_meta_degraded: u64,
    pub file_updates_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = ImportMetrics::new();
        metrics.metadata_succeeded();
        metrics.metadata_succeeded();
        metrics.metadata_failed();
        metrics.file_meta_degraded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.metadata_succeeded, 2);
        assert_eq!(snapshot.metadata_failed, 1);
        assert_eq!(snapshot.file_meta_degraded, 1);
        assert_eq!(snapshot.writes_failed, 0);
    }
}
