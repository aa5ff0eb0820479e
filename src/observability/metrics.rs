//! Index write-path counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; values are exact once writers are quiescent

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one indexer
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Index records embedded into log edits
    embedded_records: AtomicU64,
    /// Retention markers added to batch edits
    retention_markers: AtomicU64,
    /// Mutations that produced no index work
    skipped_mutations: AtomicU64,
    /// Index updates written on the direct path
    direct_writes: AtomicU64,
    /// Direct writes that failed
    direct_write_failures: AtomicU64,
    /// Index updates written by post-commit
    post_commit_writes: AtomicU64,
    /// Post-commit calls that found the unit already claimed or finished
    post_commit_noops: AtomicU64,
    /// Persisted edits replayed
    replayed_edits: AtomicU64,
    /// Index updates re-written by replay
    replayed_records: AtomicU64,
    /// Fire-and-fatal aborts
    fatal_aborts: AtomicU64,
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_embedded_records(&self, count: u64) {
        self.embedded_records.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retention_markers(&self) {
        self.retention_markers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skipped(&self) {
        self.skipped_mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_direct_writes(&self, count: u64) {
        self.direct_writes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_direct_write_failures(&self) {
        self.direct_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_post_commit_writes(&self, count: u64) {
        self.post_commit_writes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_post_commit_noops(&self) {
        self.post_commit_noops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replayed_edits(&self) {
        self.replayed_edits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_replayed_records(&self, count: u64) {
        self.replayed_records.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_fatal_aborts(&self) {
        self.fatal_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IndexMetricsSnapshot {
        IndexMetricsSnapshot {
            embedded_records: self.embedded_records.load(Ordering::Relaxed),
            retention_markers: self.retention_markers.load(Ordering::Relaxed),
            skipped_mutations: self.skipped_mutations.load(Ordering::Relaxed),
            direct_writes: self.direct_writes.load(Ordering::Relaxed),
            direct_write_failures: self.direct_write_failures.load(Ordering::Relaxed),
            post_commit_writes: self.post_commit_writes.load(Ordering::Relaxed),
            post_commit_noops: self.post_commit_noops.load(Ordering::Relaxed),
            replayed_edits: self.replayed_edits.load(Ordering::Relaxed),
            replayed_records: self.replayed_records.load(Ordering::Relaxed),
            fatal_aborts: self.fatal_aborts.load(Ordering::Relaxed),
        }
    }

    /// Current values as one JSON object
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"embedded_records":{},"retention_markers":{},"skipped_mutations":{},"direct_writes":{},"direct_write_failures":{},"post_commit_writes":{},"post_commit_noops":{},"replayed_edits":{},"replayed_records":{},"fatal_aborts":{}}}"#,
            s.embedded_records,
            s.retention_markers,
            s.skipped_mutations,
            s.direct_writes,
            s.direct_write_failures,
            s.post_commit_writes,
            s.post_commit_noops,
            s.replayed_edits,
            s.replayed_records,
            s.fatal_aborts,
        )
    }
}

/// A point-in-time copy of [`IndexMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexMetricsSnapshot {
    pub embedded_records: u64,
    pub retention_markers: u64,
    pub skipped_mutations: u64,
    pub direct_writes: u64,
    pub direct_write_failures: u64,
    pub post_commit_writes: u64,
    pub post_commit_noops: u64,
    pub replayed_edits: u64,
    pub replayed_records: u64,
    pub fatal_aborts: u64,
}
