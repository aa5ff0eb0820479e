//! Shared log edits and embedded index records
//!
//! One `LogEdit` backs one durability-log append. Pre-commit appends the
//! index records into it, the host persists it, and every post-commit call of
//! the same append receives the same `Arc<LogEdit>`.
//!
//! All embedded records of an edit share one progress flag. The first
//! post-commit call claims it, writes every record and marks it finished.
//! Later calls wait for the flag to reach finished and write nothing.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::index_update::IndexUpdate;

/// Identity of one log-append unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(Uuid);

impl UnitId {
    /// Generate a fresh unit id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const FINISHED: u8 = 2;

/// Write progress shared by every record of one unit.
///
/// Callers that lose the claim wait on `finished` until the claimant has
/// written the unit.
#[derive(Debug)]
pub struct UnitProgress {
    unit: UnitId,
    state: Mutex<u8>,
    finished: Condvar,
}

impl UnitProgress {
    fn new(unit: UnitId) -> Self {
        Self {
            unit,
            state: Mutex::new(PENDING),
            finished: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, u8> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// True once the unit's records have reached the index store
    pub fn is_finished(&self) -> bool {
        *self.lock_state() == FINISHED
    }

    /// True once some caller has claimed the unit, finished or not
    pub fn is_claimed(&self) -> bool {
        *self.lock_state() != PENDING
    }

    /// Take exclusive responsibility for writing the unit.
    ///
    /// Exactly one caller ever gets `true`.
    pub fn try_claim(&self) -> bool {
        let mut state = self.lock_state();
        if *state != PENDING {
            return false;
        }
        *state = CLAIMED;
        true
    }

    pub fn mark_finished(&self) {
        *self.lock_state() = FINISHED;
        self.finished.notify_all();
    }

    /// Block until the claimant marks the unit finished.
    ///
    /// Never returns if the claimant aborts the process mid-write.
    pub fn wait_finished(&self) {
        let mut state = self.lock_state();
        while *state != FINISHED {
            state = self
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `wait_finished`, giving up after `timeout`. Returns whether the
    /// unit finished.
    pub fn wait_finished_for(&self, timeout: Duration) -> bool {
        let state = self.lock_state();
        let (state, _) = self
            .finished
            .wait_timeout_while(state, timeout, |s| *s != FINISHED)
            .unwrap_or_else(PoisonError::into_inner);
        *state == FINISHED
    }
}

/// One index update carried inside the durability log.
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    update: IndexUpdate,
    progress: Arc<UnitProgress>,
}

impl EmbeddedRecord {
    pub(crate) fn new(update: IndexUpdate, progress: Arc<UnitProgress>) -> Self {
        Self { update, progress }
    }

    pub fn update(&self) -> &IndexUpdate {
        &self.update
    }

    pub fn into_update(self) -> IndexUpdate {
        self.update
    }

    /// Shared "finished" flag of this record's unit
    pub fn progress(&self) -> &Arc<UnitProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.progress.is_finished()
    }
}

impl PartialEq for EmbeddedRecord {
    fn eq(&self, other: &Self) -> bool {
        self.update == other.update
    }
}

/// Entries of a log edit, in append order.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Primary data written by the host; opaque to indexing
    Data(Vec<u8>),
    /// Keeps an otherwise empty edit from being discarded by the host
    RetentionMarker,
    /// An index update to apply after the append
    Index(EmbeddedRecord),
}

impl LogEntry {
    pub fn as_index(&self) -> Option<&EmbeddedRecord> {
        match self {
            LogEntry::Index(record) => Some(record),
            _ => None,
        }
    }
}

/// Decoded entry before it is bound to an edit's progress flag
pub(crate) enum RawEntry {
    Data(Vec<u8>),
    RetentionMarker,
    Index(IndexUpdate),
}

/// Ordered, append-only contents of one log-append unit.
#[derive(Debug)]
pub struct LogEdit {
    progress: Arc<UnitProgress>,
    entries: Mutex<Vec<LogEntry>>,
}

/// Edit reference shared by pre-commit and all post-commit calls of an append
pub type SharedLogEdit = Arc<LogEdit>;

impl LogEdit {
    pub fn new() -> Self {
        Self::with_unit(UnitId::generate())
    }

    pub fn with_unit(unit: UnitId) -> Self {
        Self {
            progress: Arc::new(UnitProgress::new(unit)),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Fresh edit behind an `Arc`
    pub fn shared() -> SharedLogEdit {
        Arc::new(Self::new())
    }

    /// Rebuild an edit read back from a persisted segment
    pub(crate) fn from_raw(unit: UnitId, raw: Vec<RawEntry>) -> Self {
        let edit = Self::with_unit(unit);
        let entries = raw
            .into_iter()
            .map(|entry| match entry {
                RawEntry::Data(data) => LogEntry::Data(data),
                RawEntry::RetentionMarker => LogEntry::RetentionMarker,
                RawEntry::Index(update) => {
                    LogEntry::Index(EmbeddedRecord::new(update, Arc::clone(&edit.progress)))
                }
            })
            .collect();
        *edit.lock_entries() = entries;
        edit
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unit(&self) -> UnitId {
        self.progress.unit()
    }

    pub fn progress(&self) -> &Arc<UnitProgress> {
        &self.progress
    }

    /// Append opaque host data
    pub fn push_data(&self, data: impl Into<Vec<u8>>) {
        self.lock_entries().push(LogEntry::Data(data.into()));
    }

    /// Append a retention marker unless the edit already carries one
    pub fn add_retention_marker(&self) {
        let mut entries = self.lock_entries();
        if !entries.iter().any(|e| matches!(e, LogEntry::RetentionMarker)) {
            entries.push(LogEntry::RetentionMarker);
        }
    }

    /// Append one embedded record per update
    pub fn embed(&self, updates: &[IndexUpdate]) {
        let mut entries = self.lock_entries();
        entries.extend(updates.iter().map(|update| {
            LogEntry::Index(EmbeddedRecord::new(update.clone(), Arc::clone(&self.progress)))
        }));
    }

    pub fn has_retention_marker(&self) -> bool {
        self.lock_entries()
            .iter()
            .any(|e| matches!(e, LogEntry::RetentionMarker))
    }

    /// First embedded record, if any
    pub fn first_index_record(&self) -> Option<EmbeddedRecord> {
        self.lock_entries().iter().find_map(LogEntry::as_index).cloned()
    }

    /// Every embedded index update, in append order
    pub fn index_updates(&self) -> Vec<IndexUpdate> {
        self.lock_entries()
            .iter()
            .filter_map(LogEntry::as_index)
            .map(|record| record.update().clone())
            .collect()
    }

    pub fn index_record_count(&self) -> usize {
        self.lock_entries()
            .iter()
            .filter(|e| matches!(e, LogEntry::Index(_)))
            .count()
    }

    /// Copy of all entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock_entries().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

impl Default for LogEdit {
    fn default() -> Self {
        Self::new()
    }
}
