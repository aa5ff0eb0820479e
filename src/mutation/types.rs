//! Row mutations as seen by the indexing write path
//!
//! A mutation addresses exactly one row. Its cells are grouped per column
//! family and kept in the order they were added, which is the order the host
//! framework received them.

use std::collections::BTreeMap;
use std::fmt;

/// Row identifier of the primary table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    /// Create a row key from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for RowKey {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Whether a cell writes a value or removes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellKind {
    /// Value written at the given timestamp
    Put = 0,
    /// Removal of the column version at the given timestamp
    Delete = 1,
}

impl CellKind {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CellKind::Put),
            1 => Some(CellKind::Delete),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A single versioned cell write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub timestamp: u64,
    pub kind: CellKind,
    pub value: Vec<u8>,
}

impl Cell {
    /// Create a put cell
    pub fn put(
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            kind: CellKind::Put,
            value: value.into(),
        }
    }

    /// Create a delete cell (no value)
    pub fn delete(family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            kind: CellKind::Delete,
            value: Vec::new(),
        }
    }

    /// Returns true if this cell writes a value
    pub fn is_put(&self) -> bool {
        self.kind == CellKind::Put
    }
}

/// A write to one row of the primary table.
///
/// `durable` mirrors the host's write-to-log flag: when set, the mutation is
/// not acknowledged until the durability log append has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    row: RowKey,
    families: BTreeMap<Vec<u8>, Vec<Cell>>,
    attributes: BTreeMap<String, Vec<u8>>,
    durable: bool,
    merged: bool,
}

impl Mutation {
    /// Create an empty, durable mutation for `row`
    pub fn new(row: impl Into<RowKey>) -> Self {
        Self {
            row: row.into(),
            families: BTreeMap::new(),
            attributes: BTreeMap::new(),
            durable: true,
            merged: false,
        }
    }

    pub(crate) fn new_merged(row: RowKey, durable: bool) -> Self {
        Self {
            row,
            families: BTreeMap::new(),
            attributes: BTreeMap::new(),
            durable,
            merged: true,
        }
    }

    /// Add a put cell, builder style
    pub fn put(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.add_cell(Cell::put(family, qualifier, timestamp, value));
        self
    }

    /// Add a delete cell, builder style
    pub fn delete(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: u64,
    ) -> Self {
        self.add_cell(Cell::delete(family, qualifier, timestamp));
        self
    }

    /// Set the durability flag, builder style
    pub fn with_durability(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Set an attribute, builder style
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a cell to the end of its family's list
    pub fn add_cell(&mut self, cell: Cell) {
        self.families
            .entry(cell.family.clone())
            .or_default()
            .push(cell);
    }

    /// Set an attribute only if it is not already present.
    ///
    /// Returns true if the value was stored.
    pub fn set_attribute_if_absent(&mut self, name: &str, value: &[u8]) -> bool {
        if self.attributes.contains_key(name) {
            return false;
        }
        self.attributes.insert(name.to_string(), value.to_vec());
        true
    }

    pub(crate) fn set_durable(&mut self, durable: bool) {
        self.durable = durable;
    }

    pub fn row(&self) -> &RowKey {
        &self.row
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// True for a mutation produced by the batch aggregator
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// Cells of one family, in arrival order
    pub fn family(&self, family: &[u8]) -> &[Cell] {
        self.families
            .get(family)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Families in byte order with their cells
    pub fn families(&self) -> impl Iterator<Item = (&[u8], &[Cell])> {
        self.families
            .iter()
            .map(|(family, cells)| (family.as_slice(), cells.as_slice()))
    }

    /// All cells, family by family
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.families.values().flatten()
    }

    pub fn cell_count(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    pub fn attribute(&self, name: &str) -> Option<&[u8]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }
}
