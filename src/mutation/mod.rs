//! Mutation model for the indexing write path
//!
//! - `types`: rows, cells and mutations
//! - `aggregate`: one merged mutation per row per batch
//! - `codec`: binary form used inside embedded log records

mod aggregate;
mod codec;
mod errors;
mod types;

pub use aggregate::{aggregate, MutationAggregator};
pub use errors::{MutationError, MutationResult};
pub use types::{Cell, CellKind, Mutation, RowKey};

pub(crate) use codec::ByteReader;
