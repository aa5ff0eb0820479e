//! Pre-commit: plan index updates before the durability log append
//!
//! Per unit the state machine is
//! `Received -> Planned -> {Embedded | WrittenDirect | Skipped}`.
//!
//! - Embedded: durable mutation, updates appended to the shared edit, one
//!   shared lock hold taken for the unit
//! - WrittenDirect: non-durable mutation, updates written synchronously
//! - Skipped: planner not interested, or no updates produced
//!
//! A batch is merged per row first and takes the shared lock at most once.
//! All planning happens before anything is written, embedded or locked, so
//! a planner failure leaves the edit and the lock untouched.

use std::sync::Arc;

use crate::crash_point::{maybe_crash, points};
use crate::index_update::IndexUpdate;
use crate::lock::IndexLogLock;
use crate::mutation::{Mutation, MutationAggregator, RowKey};
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{BatchContext, IndexPlanner};
use crate::wal::LogEdit;
use crate::writer::IndexCommitter;

use super::errors::{IndexError, IndexResult};

/// Where one mutation (or merged row) ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCommitOutcome {
    /// No index work for this mutation
    Skipped,
    /// Updates embedded in the edit, to be written by post-commit
    Embedded { records: usize },
    /// Updates already written to the index store
    WrittenDirect { updates: usize },
}

/// Result of pre-committing one batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Per merged row, in order of first appearance
    pub rows: Vec<(RowKey, PreCommitOutcome)>,
    /// Submitted mutations the planner is not interested in
    pub skipped: usize,
    /// A retention marker was added to the edit
    pub retention_marker: bool,
    /// The unit took its shared lock hold
    pub lock_acquired: bool,
}

impl BatchOutcome {
    pub fn embedded_records(&self) -> usize {
        self.rows
            .iter()
            .map(|(_, outcome)| match outcome {
                PreCommitOutcome::Embedded { records } => *records,
                _ => 0,
            })
            .sum()
    }
}

pub struct PreCommitCoordinator {
    planner: Arc<dyn IndexPlanner>,
    committer: IndexCommitter,
    lock: Arc<IndexLogLock>,
}

impl PreCommitCoordinator {
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

    fn plan(&self, mutation: &Mutation) -> IndexResult<Vec<IndexUpdate>> {
        self.planner
            .index_updates(mutation)
            .map_err(|e| IndexError::plan_failed(mutation.row(), e))
    }

    /// Pre-commit one mutation that is not part of a batch.
    ///
    /// On `Embedded` the caller owns one shared lock hold, released by the
    /// post-commit call that writes the unit.
    pub fn single(&self, mutation: &Mutation, edit: &LogEdit) -> IndexResult<PreCommitOutcome> {
        if !self.planner.is_enabled(mutation) {
            self.skip(mutation, "not_enabled");
            return Ok(PreCommitOutcome::Skipped);
        }

        let updates = self.plan(mutation)?;
        let outcome = self.apply(mutation, &updates, edit)?;

        if let PreCommitOutcome::Embedded { .. } = outcome {
            self.lock.acquire_shared();
            maybe_crash(points::PRE_COMMIT_AFTER_EMBED);
        }
        Ok(outcome)
    }

    /// Pre-commit the mutations of one batch sharing `edit`.
    pub fn batch(&self, mutations: &[Mutation], edit: &LogEdit) -> IndexResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut aggregator = MutationAggregator::new();

        for mutation in mutations {
            if self.planner.is_enabled(mutation) {
                aggregator.add(mutation);
            } else {
                outcome.skipped += 1;
                if !outcome.retention_marker {
                    edit.add_retention_marker();
                    outcome.retention_marker = true;
                    self.committer.metrics().increment_retention_markers();
                    let unit = edit.unit().to_string();
                    log_event_with_fields(Event::PreCommitRetentionMarker, &[("unit", &unit)]);
                }
                self.skip(mutation, "not_enabled");
            }
        }

        if aggregator.is_empty() {
            return Ok(outcome);
        }

        let merged = aggregator.into_merged();
        let rows = merged.iter().map(|m| m.row().clone()).collect();
        self.planner
            .batch_started(&BatchContext::new(mutations.len(), rows));

        let mut planned = Vec::with_capacity(merged.len());
        for mutation in &merged {
            let updates = self.plan(mutation)?;
            planned.push((mutation, updates));
        }

        // direct writes can fail; embed only once they have all succeeded
        planned.sort_by_key(|(mutation, _)| mutation.is_durable());
        let mut results = Vec::with_capacity(planned.len());
        for (mutation, updates) in &planned {
            let result = self.apply(mutation, updates, edit)?;
            results.push((mutation.row().clone(), result));
        }

        if results
            .iter()
            .any(|(_, r)| matches!(r, PreCommitOutcome::Embedded { .. }))
        {
            self.lock.acquire_shared();
            outcome.lock_acquired = true;
            maybe_crash(points::PRE_COMMIT_AFTER_EMBED);
        }

        // report rows in batch order
        for row in merged.iter().map(Mutation::row) {
            if let Some(pos) = results.iter().position(|(r, _)| r == row) {
                outcome.rows.push(results.swap_remove(pos));
            }
        }
        Ok(outcome)
    }

    fn apply(
        &self,
        mutation: &Mutation,
        updates: &[IndexUpdate],
        edit: &LogEdit,
    ) -> IndexResult<PreCommitOutcome> {
        if updates.is_empty() {
            self.skip(mutation, "no_updates");
            return Ok(PreCommitOutcome::Skipped);
        }

        let count = updates.len().to_string();
        let row = mutation.row().to_string();

        if mutation.is_durable() {
            edit.embed(updates);
            self.committer
                .metrics()
                .add_embedded_records(updates.len() as u64);
            let unit = edit.unit().to_string();
            log_event_with_fields(
                Event::PreCommitEmbedded,
                &[("records", &count), ("row", &row), ("unit", &unit)],
            );
            Ok(PreCommitOutcome::Embedded {
                records: updates.len(),
            })
        } else {
            self.committer.write_direct(updates)?;
            log_event_with_fields(
                Event::PreCommitDirectWrite,
                &[("row", &row), ("updates", &count)],
            );
            Ok(PreCommitOutcome::WrittenDirect {
                updates: updates.len(),
            })
        }
    }

    fn skip(&self, mutation: &Mutation, reason: &str) {
        self.committer.metrics().increment_skipped();
        let row = mutation.row().to_string();
        log_event_with_fields(Event::PreCommitSkipped, &[("reason", reason), ("row", &row)]);
    }
}
