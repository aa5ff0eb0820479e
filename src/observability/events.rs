//! Observable events of the indexing write path
//!
//! Events are explicit and typed. Each carries its own severity; per-write
//! protocol steps are TRACE so they stay silent at the default level.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Indexer assembled for a table
    IndexerStart,
    /// Indexer shut down
    IndexerStop,
    /// Configuration loaded
    ConfigLoaded,
    /// Planner could not be built; indexing disabled for the table
    PlannerInitFailed,

    // Pre-commit
    /// Mutation not indexed (disabled or no updates)
    PreCommitSkipped,
    /// Retention marker added to a batch edit
    PreCommitRetentionMarker,
    /// Index records embedded into the log edit
    PreCommitEmbedded,
    /// Updates written directly (non-durable mutation)
    PreCommitDirectWrite,
    /// Direct write failed; mutation fails
    DirectWriteFailed,

    // Post-commit
    /// Embedded records written to the index store
    PostCommitWritten,
    /// Unit already finished by an earlier call
    PostCommitAlreadyFinished,
    /// Another call holds the unit; waiting for it to finish
    PostCommitAwaitingClaimant,
    /// Edit carries no embedded records
    PostCommitNoRecords,
    /// Index store failed on the durable path (FATAL)
    DurableWriteFatal,

    // Replay
    /// Segment replay begins
    ReplaySegmentBegin,
    /// Segment replay complete
    ReplaySegmentComplete,
    /// Persisted edit is corrupt (FATAL)
    ReplayCorruption,
    /// Index store failed during replay (FATAL)
    ReplayWriteFatal,

    // Lock
    LockSharedAcquired,
    LockSharedReleased,
    LockExclusiveAcquired,
    LockExclusiveReleased,
    /// Rotation gave up waiting for in-flight units
    LockExclusiveTimeout,
    /// Post-commit had no shared hold to give back
    LockUnbalanced,
    /// Roll finished without an exclusive hold to give back
    LogRollUnbalanced,

    // Config
    /// A configured value could not be applied
    ConfigInvalid,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::IndexerStart => "INDEXER_START",
            Event::IndexerStop => "INDEXER_STOP",
            Event::ConfigLoaded => "INDEX_CONFIG_LOADED",
            Event::PlannerInitFailed => "INDEX_PLANNER_INIT_FAILED",

            Event::PreCommitSkipped => "INDEX_PRE_COMMIT_SKIPPED",
            Event::PreCommitRetentionMarker => "INDEX_PRE_COMMIT_RETENTION_MARKER",
            Event::PreCommitEmbedded => "INDEX_PRE_COMMIT_EMBEDDED",
            Event::PreCommitDirectWrite => "INDEX_PRE_COMMIT_DIRECT_WRITE",
            Event::DirectWriteFailed => "INDEX_DIRECT_WRITE_FAILED",

            Event::PostCommitWritten => "INDEX_POST_COMMIT_WRITTEN",
            Event::PostCommitAlreadyFinished => "INDEX_POST_COMMIT_ALREADY_FINISHED",
            Event::PostCommitAwaitingClaimant => "INDEX_POST_COMMIT_AWAITING_CLAIMANT",
            Event::PostCommitNoRecords => "INDEX_POST_COMMIT_NO_RECORDS",
            Event::DurableWriteFatal => "INDEX_DURABLE_WRITE_FATAL",

            Event::ReplaySegmentBegin => "INDEX_REPLAY_SEGMENT_BEGIN",
            Event::ReplaySegmentComplete => "INDEX_REPLAY_SEGMENT_COMPLETE",
            Event::ReplayCorruption => "INDEX_REPLAY_CORRUPTION",
            Event::ReplayWriteFatal => "INDEX_REPLAY_WRITE_FATAL",

            Event::LockSharedAcquired => "INDEX_LOCK_SHARED_ACQUIRED",
            Event::LockSharedReleased => "INDEX_LOCK_SHARED_RELEASED",
            Event::LockExclusiveAcquired => "INDEX_LOCK_EXCLUSIVE_ACQUIRED",
            Event::LockExclusiveReleased => "INDEX_LOCK_EXCLUSIVE_RELEASED",
            Event::LockExclusiveTimeout => "INDEX_LOCK_EXCLUSIVE_TIMEOUT",
            Event::LockUnbalanced => "INDEX_LOCK_UNBALANCED",
            Event::LogRollUnbalanced => "INDEX_LOG_ROLL_UNBALANCED",

            Event::ConfigInvalid => "INDEX_CONFIG_INVALID",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::DurableWriteFatal | Event::ReplayCorruption | Event::ReplayWriteFatal => {
                Severity::Fatal
            }
            Event::PlannerInitFailed
            | Event::DirectWriteFailed
            | Event::LockUnbalanced
            | Event::LogRollUnbalanced
            | Event::ConfigInvalid => Severity::Error,
            Event::LockExclusiveTimeout => Severity::Warn,
            Event::IndexerStart
            | Event::IndexerStop
            | Event::ConfigLoaded
            | Event::ReplaySegmentBegin
            | Event::ReplaySegmentComplete => Severity::Info,
            _ => Severity::Trace,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
