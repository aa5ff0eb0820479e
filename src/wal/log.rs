//! Host durability log interface
//!
//! The log itself belongs to the host engine. Indexing only needs to know
//! that an edit was appended and, after a crash, which segments survived.
//! `MemoryDurabilityLog` is an in-process log for hosts' tests and tooling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lock::LogRollListener;

use super::codec::encode_edit;
use super::edit::LogEdit;
use super::errors::LogAppendError;
use super::segment::MemorySegment;

/// Append side of the host's durability log.
pub trait DurabilityLog: Send + Sync {
    /// Persist `edit` and return its sequence number
    fn append(&self, edit: &LogEdit) -> Result<u64, LogAppendError>;
}

#[derive(Debug, Default)]
struct MemoryLogInner {
    next_sequence: u64,
    segment_id: u64,
    current: Vec<Vec<u8>>,
    sealed: Vec<MemorySegment>,
    fail_next: Option<String>,
}

/// Durability log kept in memory, segment by segment.
#[derive(Default)]
pub struct MemoryDurabilityLog {
    inner: Mutex<MemoryLogInner>,
    listeners: Vec<Arc<dyn LogRollListener>>,
}

impl MemoryDurabilityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener notified around every roll
    pub fn with_roll_listener(mut self, listener: Arc<dyn LogRollListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn lock_inner(&self) -> MutexGuard<'_, MemoryLogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next append fail with `reason`
    pub fn fail_next_append(&self, reason: impl Into<String>) {
        self.lock_inner().fail_next = Some(reason.into());
    }

    /// Seal the current segment and start a new one.
    ///
    /// Listeners run before and after; a listener may block the roll until
    /// in-flight index writes derived from the current segment are done.
    pub fn roll(&self) -> u64 {
        for listener in &self.listeners {
            listener.pre_roll();
        }

        let sealed_id = {
            let mut inner = self.lock_inner();
            let id = inner.segment_id;
            let edits = std::mem::take(&mut inner.current);
            inner.sealed.push(MemorySegment::new(id, edits));
            inner.segment_id += 1;
            id
        };

        for listener in &self.listeners {
            listener.post_roll();
        }
        sealed_id
    }

    /// Snapshot of the segment currently being written
    pub fn current_segment(&self) -> MemorySegment {
        let inner = self.lock_inner();
        MemorySegment::new(inner.segment_id, inner.current.clone())
    }

    /// Sealed segments, oldest first
    pub fn sealed_segments(&self) -> Vec<MemorySegment> {
        self.lock_inner().sealed.clone()
    }

    /// Total appended edits over the log's lifetime
    pub fn appended(&self) -> u64 {
        self.lock_inner().next_sequence
    }
}

impl DurabilityLog for MemoryDurabilityLog {
    fn append(&self, edit: &LogEdit) -> Result<u64, LogAppendError> {
        let encoded = encode_edit(edit)?;
        let mut inner = self.lock_inner();
        if let Some(reason) = inner.fail_next.take() {
            return Err(LogAppendError::Io(reason));
        }
        inner.current.push(encoded);
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        Ok(sequence)
    }
}
