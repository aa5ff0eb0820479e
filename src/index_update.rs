//! Index updates: a derived mutation addressed to one index table

use std::fmt;

use crate::mutation::Mutation;

/// Identifier of a target index table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexId(String);

impl IndexId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IndexId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One mutation to apply to one index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    pub index: IndexId,
    pub mutation: Mutation,
}

impl IndexUpdate {
    pub fn new(index: impl Into<IndexId>, mutation: Mutation) -> Self {
        Self {
            index: index.into(),
            mutation,
        }
    }
}

/// Render a list of updates for log lines
pub(crate) fn describe_updates(updates: &[IndexUpdate]) -> String {
    updates
        .iter()
        .map(|u| format!("{}:{}", u.index, u.mutation.row()))
        .collect::<Vec<_>>()
        .join(",")
}
