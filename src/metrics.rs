//! Run counters
//!
//! A fixed set of atomic counters shared between the batcher and the
//! submission driver, snapshotted into the run summary. The pipeline's
//! vocabulary is closed, so there is no dynamic registry.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one pipeline run
#[derive(Debug, Default)]
pub struct RunMetrics {
    records_scanned: AtomicU64,
    records_excluded: AtomicU64,
    labels_succeeded: AtomicU64,
    labels_failed: AtomicU64,
    labels_skipped: AtomicU64,
    batches_completed: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_records_scanned(&self, count: u64) {
        self.records_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_excluded(&self, count: u64) {
        self.records_excluded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_succeeded(&self) {
        self.labels_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.labels_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.labels_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_batches_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            records_excluded: self.records_excluded.load(Ordering::Relaxed),
            labels_succeeded: self.labels_succeeded.load(Ordering::Relaxed),
            labels_failed: self.labels_failed.load(Ordering::Relaxed),
            labels_skipped: self.labels_skipped.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the run counters
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_scanned: u64,
    pub records_excluded: u64,
    pub labels_succeeded: u64,
    pub labels_failed: u64,
    pub labels_skipped: u64,
    pub batches_completed: u64,
}

impl MetricsSnapshot {
    /// Labels attempted, across all outcomes
    pub fn labels_total(&self) -> u64 {
        self.labels_succeeded + self.labels_failed + self.labels_skipped
    }
}
