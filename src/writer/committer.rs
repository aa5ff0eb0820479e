//! Failure policies around the index writer

use std::sync::Arc;

use crate::coordinator::IndexError;
use crate::index_update::{describe_updates, IndexUpdate};
use crate::observability::{log_event_with_fields, Event, IndexMetrics};
use crate::wal::UnitId;

use super::IndexWriter;

/// Stops the hosting process after a fatal index failure.
pub trait AbortHandler: Send + Sync {
    /// Never returns. Called after the FATAL line has been logged.
    fn abort(&self, error: &IndexError) -> !;
}

/// Default handler: `std::process::abort()`.
///
/// No unwinding, so no caller can acknowledge the mutation after the index
/// write was lost.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessAbort;

impl AbortHandler for ProcessAbort {
    fn abort(&self, error: &IndexError) -> ! {
        eprintln!("[ABORT] {}", error);
        std::process::abort();
    }
}

/// Which fatal path a write-or-abort belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// Post-commit of a live, durable unit
    Live,
    /// Replay of a persisted segment
    Replay { segment: u64 },
}

/// Applies the direct-write and write-or-abort policies on one writer.
#[derive(Clone)]
pub struct IndexCommitter {
    writer: Arc<dyn IndexWriter>,
    aborter: Arc<dyn AbortHandler>,
    metrics: Arc<IndexMetrics>,
}

impl IndexCommitter {
    pub fn new(
        writer: Arc<dyn IndexWriter>,
        aborter: Arc<dyn AbortHandler>,
        metrics: Arc<IndexMetrics>,
    ) -> Self {
        Self {
            writer,
            aborter,
            metrics,
        }
    }

    /// Committer that aborts the process on fatal failures
    pub fn with_process_abort(writer: Arc<dyn IndexWriter>, metrics: Arc<IndexMetrics>) -> Self {
        Self::new(writer, Arc::new(ProcessAbort), metrics)
    }

    pub fn metrics(&self) -> &Arc<IndexMetrics> {
        &self.metrics
    }

    /// Write for a non-durable mutation. Failure is the caller's to handle.
    pub fn write_direct(&self, updates: &[IndexUpdate]) -> Result<(), IndexError> {
        match self.writer.write(updates) {
            Ok(()) => {
                self.metrics.add_direct_writes(updates.len() as u64);
                Ok(())
            }
            Err(source) => {
                self.metrics.increment_direct_write_failures();
                let err = IndexError::store_unreachable(source);
                log_event_with_fields(
                    Event::DirectWriteFailed,
                    &[
                        ("error", &err.to_string()),
                        ("updates", &describe_updates(updates)),
                    ],
                );
                Err(err)
            }
        }
    }

    /// Write updates that are already durable in the log.
    ///
    /// Returns only on success. On failure the FATAL line is logged and the
    /// abort handler is invoked.
    pub fn write_or_abort(&self, unit: UnitId, updates: &[IndexUpdate], path: WritePath) {
        let source = match self.writer.write(updates) {
            Ok(()) => return,
            Err(source) => source,
        };

        let (err, event) = match path {
            WritePath::Live => (
                IndexError::durable_write_failed(unit, source),
                Event::DurableWriteFatal,
            ),
            WritePath::Replay { segment } => (
                IndexError::recovery_write_failed(segment, unit, source),
                Event::ReplayWriteFatal,
            ),
        };

        self.metrics.increment_fatal_aborts();
        let unit = unit.to_string();
        log_event_with_fields(
            event,
            &[
                ("code", err.code().code()),
                ("error", &err.to_string()),
                ("unit", &unit),
                ("updates", &describe_updates(updates)),
            ],
        );
        self.aborter.abort(&err)
    }
}
