//! In-memory index writer that records what it was asked to write

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::index_update::IndexUpdate;

use super::{IndexWriteError, IndexWriter};

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<Vec<IndexUpdate>>,
    failures: VecDeque<IndexWriteError>,
}

/// Records every write call; can be told to fail upcoming calls.
#[derive(Debug, Default)]
pub struct RecordingIndexWriter {
    inner: Mutex<Recorded>,
}

impl RecordingIndexWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next write call fail with `error`. Queued failures are
    /// consumed one per call.
    pub fn fail_next(&self, error: IndexWriteError) {
        self.lock_inner().failures.push_back(error);
    }

    /// Successful write calls, each with the updates it carried
    pub fn calls(&self) -> Vec<Vec<IndexUpdate>> {
        self.lock_inner().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_inner().calls.len()
    }

    /// Every update written, in order
    pub fn writes(&self) -> Vec<IndexUpdate> {
        self.lock_inner().calls.iter().flatten().cloned().collect()
    }

    pub fn write_count(&self) -> usize {
        self.lock_inner().calls.iter().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.lock_inner().calls.clear();
    }
}

impl IndexWriter for RecordingIndexWriter {
    fn write(&self, updates: &[IndexUpdate]) -> Result<(), IndexWriteError> {
        let mut inner = self.lock_inner();
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        inner.calls.push(updates.to_vec());
        Ok(())
    }
}
