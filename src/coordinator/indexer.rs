//! The index write pipeline for one table
//!
//! The host calls the named stages at its boundaries:
//!
//! | Stage            | Host boundary                                 |
//! |------------------|-----------------------------------------------|
//! | `pre_single`     | before appending one lone mutation            |
//! | `pre_batch`      | before appending a batch sharing one edit     |
//! | `post_single`    | after the append, once per original mutation  |
//! | `post_batch`     | after every `post_single` of a batch          |
//! | `replay_segment` | during recovery, once per persisted segment   |
//!
//! A table without a planner (none configured, or planner init failed)
//! passes every live stage through as a no-op. Replay still delivers any
//! records already in the log.

use std::sync::Arc;

use crate::config::IndexerConfig;
use crate::lock::IndexLogLock;
use crate::mutation::Mutation;
use crate::observability::{log_event_with_fields, Event, IndexMetrics, IndexMetricsSnapshot};
use crate::planner::{IndexPlanner, PlannerRegistry, TableState};
use crate::wal::{LogEdit, SegmentSource};
use crate::writer::{AbortHandler, IndexCommitter, IndexWriter, ProcessAbort};

use super::errors::{IndexError, IndexResult};
use super::post_commit::{PostCommitCoordinator, PostCommitOutcome};
use super::pre_commit::{BatchOutcome, PreCommitCoordinator, PreCommitOutcome};
use super::replay::{RecoveryReplayer, ReplayStats};

struct LiveStages {
    pre: PreCommitCoordinator,
    post: PostCommitCoordinator,
}

pub struct Indexer {
    table: String,
    planner: Option<Arc<dyn IndexPlanner>>,
    writer: Arc<dyn IndexWriter>,
    aborter: Arc<dyn AbortHandler>,
    lock: Arc<IndexLogLock>,
    metrics: Arc<IndexMetrics>,
    live: Option<LiveStages>,
    replayer: RecoveryReplayer,
    init_failure: Option<IndexError>,
}

impl Indexer {
    /// Indexer without a planner. Live stages are no-ops until
    /// [`with_planner`](Self::with_planner) is applied.
    pub fn new(
        table: impl Into<String>,
        writer: Arc<dyn IndexWriter>,
        lock: Arc<IndexLogLock>,
    ) -> Self {
        let aborter: Arc<dyn AbortHandler> = Arc::new(ProcessAbort);
        let metrics = Arc::new(IndexMetrics::new());
        let committer = IndexCommitter::new(writer.clone(), aborter.clone(), metrics.clone());
        Self {
            table: table.into(),
            planner: None,
            writer,
            aborter,
            lock,
            metrics,
            live: None,
            replayer: RecoveryReplayer::new(committer),
            init_failure: None,
        }
    }

    /// Build the indexer a table's configuration asks for.
    ///
    /// A planner that cannot be built leaves the table unindexed; the
    /// failure is logged and kept for [`init_failure`](Self::init_failure).
    /// The configured log level is applied to the process-wide logger.
    pub fn from_config(
        table: impl Into<String>,
        config: &IndexerConfig,
        registry: &PlannerRegistry,
        state: Arc<dyn TableState>,
        writer: Arc<dyn IndexWriter>,
        lock: Arc<IndexLogLock>,
    ) -> Self {
        let mut indexer = Self::new(table, writer, lock);
        if let Err(err) = config.apply_log_level() {
            log_event_with_fields(
                Event::ConfigInvalid,
                &[("table", &indexer.table), ("error", &err.to_string())],
            );
        }
        match registry.build(&indexer.table, config, state) {
            Ok(Some(planner)) => indexer = indexer.with_planner(planner),
            Ok(None) => {}
            Err(err) => indexer.init_failure = Some(err),
        }
        indexer
    }

    pub fn with_planner(mut self, planner: Arc<dyn IndexPlanner>) -> Self {
        self.planner = Some(planner);
        self.rebuild();
        self
    }

    /// Replace the fatal-path handler (default: abort the process)
    pub fn with_abort_handler(mut self, aborter: Arc<dyn AbortHandler>) -> Self {
        self.aborter = aborter;
        self.rebuild();
        self
    }

    fn rebuild(&mut self) {
        let committer = IndexCommitter::new(
            self.writer.clone(),
            self.aborter.clone(),
            self.metrics.clone(),
        );
        self.live = self.planner.as_ref().map(|planner| LiveStages {
            pre: PreCommitCoordinator::new(
                planner.clone(),
                committer.clone(),
                self.lock.clone(),
            ),
            post: PostCommitCoordinator::new(
                planner.clone(),
                committer.clone(),
                self.lock.clone(),
            ),
        });
        self.replayer = RecoveryReplayer::new(committer);
    }

    /// Log the start line. Call once the host has wired the indexer in.
    pub fn start(&self) {
        let status = if self.is_enabled() {
            "enabled"
        } else if self.init_failure.is_some() {
            "init_failed"
        } else {
            "disabled"
        };
        log_event_with_fields(
            Event::IndexerStart,
            &[("status", status), ("table", &self.table)],
        );
    }

    pub fn stop(&self) {
        log_event_with_fields(
            Event::IndexerStop,
            &[("metrics", &self.metrics.to_json()), ("table", &self.table)],
        );
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// True when a planner is installed
    pub fn is_enabled(&self) -> bool {
        self.live.is_some()
    }

    /// Planner construction failure reported at startup, if any
    pub fn init_failure(&self) -> Option<&IndexError> {
        self.init_failure.as_ref()
    }

    pub fn lock(&self) -> &Arc<IndexLogLock> {
        &self.lock
    }

    pub fn metrics(&self) -> IndexMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Pre-commit one lone mutation
    pub fn pre_single(&self, mutation: &Mutation, edit: &LogEdit) -> IndexResult<PreCommitOutcome> {
        match &self.live {
            Some(live) => live.pre.single(mutation, edit),
            None => Ok(PreCommitOutcome::Skipped),
        }
    }

    /// Pre-commit a batch whose mutations share `edit`
    pub fn pre_batch(&self, mutations: &[Mutation], edit: &LogEdit) -> IndexResult<BatchOutcome> {
        match &self.live {
            Some(live) => live.pre.batch(mutations, edit),
            None => Ok(BatchOutcome::default()),
        }
    }

    /// Post-commit one original mutation after the append
    pub fn post_single(&self, mutation: &Mutation, edit: &LogEdit) -> PostCommitOutcome {
        match &self.live {
            Some(live) => live.post.single(mutation, edit),
            None => PostCommitOutcome::NotApplicable,
        }
    }

    /// Close out a batch after every `post_single`
    pub fn post_batch(&self, mutations: &[Mutation]) {
        if let Some(live) = &self.live {
            live.post.batch_completed(mutations);
        }
    }

    /// Re-deliver the index records of one persisted segment
    pub fn replay_segment(&self, source: &mut dyn SegmentSource) -> IndexResult<ReplayStats> {
        self.replayer.replay(source)
    }
}
