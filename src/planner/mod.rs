//! Index update planning
//!
//! A planner decides which index updates a primary mutation implies. The
//! coordinator only asks two questions of it per mutation: is this mutation
//! indexed at all, and if so, which updates does it produce. Batch
//! boundaries are reported so a planner can cache row state across the
//! mutations of one batch.
//!
//! Planners read committed row state through [`TableState`]. The mutation
//! handed to `index_updates` has not been applied yet, so the planner sees
//! the row as it was before the mutation plus the mutation's own cells.

mod covered;
mod registry;
mod table;

pub use covered::CoveredColumnPlanner;
pub use registry::{PlannerContext, PlannerFactory, PlannerRegistry, COVERED_COLUMNS};
pub use table::{ColumnRef, MemoryTable, RowState, TableState};

use thiserror::Error;

use crate::index_update::IndexUpdate;
use crate::mutation::{Mutation, RowKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("missing planner option '{0}'")]
    MissingOption(String),

    #[error("invalid planner option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("table state unavailable: {0}")]
    Unavailable(String),
}

/// Batch boundary reported to planners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    /// Mutations in the batch as submitted
    pub size: usize,
    /// Distinct rows, in order of first appearance
    pub rows: Vec<RowKey>,
}

impl BatchContext {
    pub fn new(size: usize, rows: Vec<RowKey>) -> Self {
        Self { size, rows }
    }
}

/// Pluggable index update planner.
pub trait IndexPlanner: Send + Sync {
    /// Whether `mutation` touches anything this planner indexes
    fn is_enabled(&self, mutation: &Mutation) -> bool;

    /// Index updates implied by `mutation`, in the order they must be
    /// written. An empty list means the mutation needs no index work.
    fn index_updates(&self, mutation: &Mutation) -> Result<Vec<IndexUpdate>, PlannerError>;

    /// Called once before planning a batch with at least one enabled mutation
    fn batch_started(&self, _batch: &BatchContext) {}

    /// Called once after the batch's post-commit work
    fn batch_completed(&self, _batch: &BatchContext) {}
}
