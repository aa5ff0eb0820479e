//! Post-commit: deliver embedded index updates once the edit is durable
//!
//! The host calls post-commit once per original mutation, every call of one
//! append sharing the same edit. The first call that claims the unit writes
//! every embedded record, marks the unit finished and gives back the unit's
//! single shared lock hold. Every other call writes nothing, but does not
//! return before the unit is finished: the host acknowledges each mutation
//! once its post-commit returns.
//!
//! A failed index write here cannot be returned to the client: the mutation
//! is already durable. The write-or-abort policy stops the process and the
//! log replays the records on restart.

use std::sync::Arc;

use crate::crash_point::{maybe_crash, points};
use crate::index_update::describe_updates;
use crate::lock::IndexLogLock;
use crate::mutation::Mutation;
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{BatchContext, IndexPlanner};
use crate::wal::LogEdit;
use crate::writer::{IndexCommitter, WritePath};

/// What one post-commit call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCommitOutcome {
    /// Mutation is not durable or not indexed
    NotApplicable,
    /// Edit carries no embedded records
    NoRecords,
    /// Unit written by another call, possibly after waiting for it
    AlreadyFinished,
    /// This call wrote the unit
    Written { records: usize },
}

impl PostCommitOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, PostCommitOutcome::Written { .. })
    }
}

pub struct PostCommitCoordinator {
    planner: Arc<dyn IndexPlanner>,
    committer: IndexCommitter,
    lock: Arc<IndexLogLock>,
}

impl PostCommitCoordinator {
    pub fn new(
        planner: Arc<dyn IndexPlanner>,
        committer: IndexCommitter,
        lock: Arc<IndexLogLock>,
    ) -> Self {
        Self {
            planner,
            committer,
            lock,
        }
    }

    /// Post-commit one original mutation against the appended edit.
    pub fn single(&self, mutation: &Mutation, edit: &LogEdit) -> PostCommitOutcome {
        if !mutation.is_durable() || !self.planner.is_enabled(mutation) {
            return PostCommitOutcome::NotApplicable;
        }

        let unit = edit.unit().to_string();
        let Some(first) = edit.first_index_record() else {
            log_event_with_fields(Event::PostCommitNoRecords, &[("unit", &unit)]);
            return PostCommitOutcome::NoRecords;
        };

        let progress = first.progress();
        if progress.is_finished() {
            self.committer.metrics().increment_post_commit_noops();
            log_event_with_fields(Event::PostCommitAlreadyFinished, &[("unit", &unit)]);
            return PostCommitOutcome::AlreadyFinished;
        }
        if !progress.try_claim() {
            log_event_with_fields(Event::PostCommitAwaitingClaimant, &[("unit", &unit)]);
            progress.wait_finished();
            self.committer.metrics().increment_post_commit_noops();
            log_event_with_fields(
                Event::PostCommitAlreadyFinished,
                &[("waited", "true"), ("unit", &unit)],
            );
            return PostCommitOutcome::AlreadyFinished;
        }

        let updates = edit.index_updates();
        maybe_crash(points::POST_COMMIT_BEFORE_WRITE);
        self.committer
            .write_or_abort(edit.unit(), &updates, WritePath::Live);
        maybe_crash(points::POST_COMMIT_AFTER_WRITE);

        progress.mark_finished();
        self.committer
            .metrics()
            .add_post_commit_writes(updates.len() as u64);

        if let Err(err) = self.lock.release_shared() {
            // pre-commit took no hold for this unit; nothing to give back
            log_event_with_fields(
                Event::LockUnbalanced,
                &[("error", &err.to_string()), ("unit", &unit)],
            );
        }

        let count = updates.len().to_string();
        log_event_with_fields(
            Event::PostCommitWritten,
            &[
                ("records", &count),
                ("unit", &unit),
                ("updates", &describe_updates(&updates)),
            ],
        );
        PostCommitOutcome::Written {
            records: updates.len(),
        }
    }

    /// Batch finished; tell the planner if it saw the batch.
    pub fn batch_completed(&self, mutations: &[Mutation]) {
        let mut rows = Vec::new();
        for mutation in mutations.iter().filter(|m| self.planner.is_enabled(m)) {
            if !rows.contains(mutation.row()) {
                rows.push(mutation.row().clone());
            }
        }
        if rows.is_empty() {
            return;
        }
        self.planner
            .batch_completed(&BatchContext::new(mutations.len(), rows));
    }
}
