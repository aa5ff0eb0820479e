//! Index store transport and write policies
//!
//! [`IndexWriter`] is the host's transport to the index tables.
//! [`IndexCommitter`] wraps it with the two failure policies:
//!
//! - direct write: failure is returned to the caller, nothing is retried
//! - write-or-abort: failure is logged FATAL and the process is stopped,
//!   leaving the durability log as the source of truth for replay

mod committer;
mod memory;

pub use committer::{AbortHandler, IndexCommitter, ProcessAbort, WritePath};
pub use memory::RecordingIndexWriter;

use thiserror::Error;

use crate::index_update::{IndexId, IndexUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexWriteError {
    #[error("index store unreachable: {0}")]
    Unreachable(String),

    #[error("index {index} rejected write: {reason}")]
    Rejected { index: IndexId, reason: String },
}

/// Physical writer to index storage.
pub trait IndexWriter: Send + Sync {
    /// Apply `updates` in order. Either all are applied or an error is
    /// returned; partial application is the transport's concern.
    fn write(&self, updates: &[IndexUpdate]) -> Result<(), IndexWriteError>;
}
