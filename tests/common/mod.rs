//! Host simulation shared by the integration tests
//!
//! Plays the storage engine around an `Indexer`: builds the table's edit,
//! calls the pre-commit stage, appends to an in-memory durability log,
//! applies the mutation to the primary table, then runs post-commit.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use aeroindex::config::{enable_indexing, IndexerConfig};
use aeroindex::coordinator::{BatchOutcome, IndexError, Indexer, PostCommitOutcome, PreCommitOutcome};
use aeroindex::index_update::IndexUpdate;
use aeroindex::lock::{IndexLogLock, LogRollSynchronizer};
use aeroindex::mutation::{CellKind, Mutation};
use aeroindex::planner::{MemoryTable, PlannerRegistry, COVERED_COLUMNS};
use aeroindex::wal::{DurabilityLog, LogEdit, MemoryDurabilityLog, SharedLogEdit};
use aeroindex::writer::{AbortHandler, RecordingIndexWriter};

pub const TABLE: &str = "users";
pub const INDEX: &str = "users_covered";

/// Abort handler that panics with the error code, so tests can observe a
/// fire-and-fatal path through `catch_unwind`.
pub struct PanicAbort;

impl AbortHandler for PanicAbort {
    fn abort(&self, error: &IndexError) -> ! {
        panic!("{}", error.code());
    }
}

pub struct Host {
    pub table: Arc<MemoryTable>,
    pub writer: Arc<RecordingIndexWriter>,
    pub lock: Arc<IndexLogLock>,
    pub log: Arc<MemoryDurabilityLog>,
    pub indexer: Indexer,
}

impl Host {
    /// Host whose table indexes `columns` with the covered-columns planner,
    /// configured the way a table descriptor would carry it.
    pub fn covered(columns: &str) -> Self {
        let mut options = BTreeMap::new();
        options.insert("covered.columns".to_string(), columns.to_string());
        let mut props = BTreeMap::new();
        enable_indexing(&mut props, COVERED_COLUMNS, &options);
        let config = IndexerConfig::from_properties(&props).expect("valid properties");
        Self::with_config(&config)
    }

    pub fn with_config(config: &IndexerConfig) -> Self {
        let table = Arc::new(MemoryTable::new());
        let writer = Arc::new(RecordingIndexWriter::new());
        let lock = Arc::new(IndexLogLock::new());
        let log = Arc::new(
            MemoryDurabilityLog::new()
                .with_roll_listener(Arc::new(LogRollSynchronizer::new(Arc::clone(&lock)))),
        );
        let indexer = Indexer::from_config(
            TABLE,
            config,
            &PlannerRegistry::with_defaults(),
            table.clone(),
            writer.clone(),
            Arc::clone(&lock),
        )
        .with_abort_handler(Arc::new(PanicAbort));

        Self {
            table,
            writer,
            lock,
            log,
            indexer,
        }
    }

    /// Pre-commit and append one mutation, stopping before post-commit.
    /// This is the state a crash between append and post-commit leaves.
    pub fn append_single(&self, mutation: &Mutation) -> (SharedLogEdit, PreCommitOutcome) {
        let edit = LogEdit::shared();
        edit.push_data(mutation.row().as_bytes().to_vec());
        let outcome = self
            .indexer
            .pre_single(mutation, &edit)
            .expect("pre-commit");
        if mutation.is_durable() {
            self.log.append(&edit).expect("append");
        }
        self.table.apply(mutation);
        (edit, outcome)
    }

    /// Full single-mutation write path
    pub fn put(&self, mutation: &Mutation) -> PostCommitOutcome {
        let (edit, _) = self.append_single(mutation);
        self.indexer.post_single(mutation, &edit)
    }

    /// Pre-commit and append one batch, stopping before post-commit
    pub fn append_batch(&self, mutations: &[Mutation]) -> (SharedLogEdit, BatchOutcome) {
        let edit = LogEdit::shared();
        for mutation in mutations {
            edit.push_data(mutation.row().as_bytes().to_vec());
        }
        let outcome = self
            .indexer
            .pre_batch(mutations, &edit)
            .expect("pre-commit batch");
        if mutations.iter().any(Mutation::is_durable) {
            self.log.append(&edit).expect("append");
        }
        for mutation in mutations {
            self.table.apply(mutation);
        }
        (edit, outcome)
    }

    /// Full batch write path: one post-commit per original mutation
    pub fn batch(&self, mutations: &[Mutation]) -> (BatchOutcome, Vec<PostCommitOutcome>) {
        let (edit, outcome) = self.append_batch(mutations);
        let post = mutations
            .iter()
            .map(|m| self.indexer.post_single(m, &edit))
            .collect();
        self.indexer.post_batch(mutations);
        (outcome, post)
    }
}

/// Cells of an index update as (kind, value) pairs, in order
pub fn cells(update: &IndexUpdate) -> Vec<(CellKind, String)> {
    update
        .mutation
        .cells()
        .map(|c| (c.kind, String::from_utf8_lossy(&c.value).into_owned()))
        .collect()
}

pub fn puts(values: &[&str]) -> Vec<(CellKind, String)> {
    values.iter().map(|v| (CellKind::Put, v.to_string())).collect()
}

pub fn deletes(values: &[&str]) -> Vec<(CellKind, String)> {
    values
        .iter()
        .map(|v| (CellKind::Delete, v.to_string()))
        .collect()
}
