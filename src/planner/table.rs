//! Primary table state as seen by planners

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::mutation::{Cell, CellKind, Mutation, RowKey};

use super::PlannerError;

/// A column, or every qualifier of a family when `qualifier` is None.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub family: Vec<u8>,
    pub qualifier: Option<Vec<u8>>,
}

impl ColumnRef {
    pub fn column(family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: Some(qualifier.into()),
        }
    }

    pub fn family(family: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: None,
        }
    }

    /// Parse `family` or `family:qualifier`
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        match entry.split_once(':') {
            Some((family, _)) if family.is_empty() => None,
            Some((family, qualifier)) => Some(Self::column(family, qualifier)),
            None if entry.is_empty() => None,
            None => Some(Self::family(entry)),
        }
    }

    pub fn matches(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.family == family
            && self
                .qualifier
                .as_deref()
                .map(|q| q == qualifier)
                .unwrap_or(true)
    }

    pub fn matches_family(&self, family: &[u8]) -> bool {
        self.family == family
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.family))?;
        if let Some(q) = &self.qualifier {
            write!(f, ":{}", String::from_utf8_lossy(q))?;
        }
        Ok(())
    }
}

/// Versioned cell values of one row.
///
/// Per column, versions are kept newest first. A put at an existing
/// timestamp replaces that version; a delete at `ts` removes every version
/// at or below `ts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowState {
    columns: BTreeMap<(Vec<u8>, Vec<u8>), Vec<(u64, Vec<u8>)>>,
}

impl RowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_cell(&mut self, cell: &Cell) {
        let key = (cell.family.clone(), cell.qualifier.clone());
        match cell.kind {
            CellKind::Put => {
                let versions = self.columns.entry(key).or_default();
                versions.retain(|(ts, _)| *ts != cell.timestamp);
                let at = versions
                    .iter()
                    .position(|(ts, _)| *ts < cell.timestamp)
                    .unwrap_or(versions.len());
                versions.insert(at, (cell.timestamp, cell.value.clone()));
            }
            CellKind::Delete => {
                if let Some(versions) = self.columns.get_mut(&key) {
                    versions.retain(|(ts, _)| *ts > cell.timestamp);
                    if versions.is_empty() {
                        self.columns.remove(&key);
                    }
                }
            }
        }
    }

    pub fn apply(&mut self, mutation: &Mutation) {
        for cell in mutation.cells() {
            self.apply_cell(cell);
        }
    }

    /// Visible versions of the selected columns as put cells, column by
    /// column, newest version first.
    pub fn cells(&self, columns: &[ColumnRef]) -> Vec<Cell> {
        let mut out = Vec::new();
        for ((family, qualifier), versions) in &self.columns {
            if !columns.iter().any(|c| c.matches(family, qualifier)) {
                continue;
            }
            for (ts, value) in versions {
                out.push(Cell::put(family.clone(), qualifier.clone(), *ts, value.clone()));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Read access to committed primary rows.
pub trait TableState: Send + Sync {
    /// Committed state of `row` before any in-flight mutation
    fn row_state(&self, row: &RowKey) -> Result<RowState, PlannerError>;
}

/// Primary table kept in memory. The host applies a mutation once its log
/// append has completed.
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: RwLock<HashMap<RowKey, RowState>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_rows(&self) -> RwLockReadGuard<'_, HashMap<RowKey, RowState>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_rows(&self) -> RwLockWriteGuard<'_, HashMap<RowKey, RowState>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, mutation: &Mutation) {
        self.write_rows()
            .entry(mutation.row().clone())
            .or_default()
            .apply(mutation);
    }

    pub fn row_count(&self) -> usize {
        self.read_rows().len()
    }
}

impl TableState for MemoryTable {
    fn row_state(&self, row: &RowKey) -> Result<RowState, PlannerError> {
        Ok(self.read_rows().get(row).cloned().unwrap_or_default())
    }
}
