//! Covered-columns planner
//!
//! Keeps one index row per primary row holding every visible version of the
//! covered columns. A mutation is planned one timestamp at a time, oldest
//! first. For each timestamp the planner emits a cleanup update carrying the
//! state before that timestamp's cells and a put update carrying the state
//! after them.
//!
//! Options:
//! - `covered.columns` (required): comma-separated `family` or
//!   `family:qualifier` entries
//! - `covered.index`: target index id, default `<table>_covered`

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::index_update::{IndexId, IndexUpdate};
use crate::mutation::{Cell, CellKind, Mutation};

use super::registry::PlannerContext;
use super::table::{ColumnRef, TableState};
use super::{BatchContext, IndexPlanner, PlannerError};

pub const COLUMNS_OPTION: &str = "covered.columns";
pub const INDEX_OPTION: &str = "covered.index";

pub struct CoveredColumnPlanner {
    index: IndexId,
    columns: Vec<ColumnRef>,
    table: Arc<dyn TableState>,
    batches_seen: AtomicU64,
}

impl CoveredColumnPlanner {
    pub fn new(index: impl Into<IndexId>, columns: Vec<ColumnRef>, table: Arc<dyn TableState>) -> Self {
        Self {
            index: index.into(),
            columns,
            table,
            batches_seen: AtomicU64::new(0),
        }
    }

    /// Build from registry options
    pub fn from_context(ctx: &PlannerContext<'_>) -> Result<Self, PlannerError> {
        let raw = ctx
            .options
            .get(COLUMNS_OPTION)
            .ok_or_else(|| PlannerError::MissingOption(COLUMNS_OPTION.to_string()))?;

        let mut columns = Vec::new();
        for entry in raw.split(',') {
            let column = ColumnRef::parse(entry).ok_or_else(|| PlannerError::InvalidOption {
                key: COLUMNS_OPTION.to_string(),
                reason: format!("bad column '{}'", entry.trim()),
            })?;
            columns.push(column);
        }

        let index = ctx
            .options
            .get(INDEX_OPTION)
            .cloned()
            .unwrap_or_else(|| format!("{}_covered", ctx.table));

        Ok(Self::new(IndexId::new(index), columns, Arc::clone(&ctx.state)))
    }

    pub fn index(&self) -> &IndexId {
        &self.index
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Batches reported through `batch_started`
    pub fn batches_seen(&self) -> u64 {
        self.batches_seen.load(Ordering::Relaxed)
    }

    fn covers(&self, cell: &Cell) -> bool {
        self.columns
            .iter()
            .any(|c| c.matches(&cell.family, &cell.qualifier))
    }

    fn index_mutation(&self, template: &Mutation, cells: Vec<Cell>) -> Mutation {
        let mut out = Mutation::new(template.row().clone()).with_durability(template.is_durable());
        for cell in cells {
            out.add_cell(cell);
        }
        out
    }
}

impl IndexPlanner for CoveredColumnPlanner {
    fn is_enabled(&self, mutation: &Mutation) -> bool {
        mutation
            .families()
            .any(|(family, _)| self.columns.iter().any(|c| c.matches_family(family)))
    }

    fn index_updates(&self, mutation: &Mutation) -> Result<Vec<IndexUpdate>, PlannerError> {
        let mut state = self.table.row_state(mutation.row())?;

        let timestamps: BTreeSet<u64> = mutation
            .cells()
            .filter(|c| self.covers(c))
            .map(|c| c.timestamp)
            .collect();

        let mut updates = Vec::with_capacity(timestamps.len() * 2);
        for ts in timestamps {
            let before = state.cells(&self.columns);
            let cleanup = before
                .into_iter()
                .map(|c| Cell {
                    kind: CellKind::Delete,
                    ..c
                })
                .collect();
            updates.push(IndexUpdate::new(
                self.index.clone(),
                self.index_mutation(mutation, cleanup),
            ));

            for cell in mutation.cells().filter(|c| c.timestamp == ts && self.covers(c)) {
                state.apply_cell(cell);
            }
            updates.push(IndexUpdate::new(
                self.index.clone(),
                self.index_mutation(mutation, state.cells(&self.columns)),
            ));
        }
        Ok(updates)
    }

    fn batch_started(&self, _batch: &BatchContext) {
        self.batches_seen.fetch_add(1, Ordering::Relaxed);
    }
}
