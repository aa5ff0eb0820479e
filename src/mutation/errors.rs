//! Mutation error types

use thiserror::Error;

/// Result type for mutation encoding
pub type MutationResult<T> = Result<T, MutationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// Merged mutations only live for one batch and are never written anywhere
    #[error("merged mutation for row '{0}' cannot be persisted")]
    MergedNotPersistable(String),

    #[error("mutation bytes truncated at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid cell kind {0}")]
    InvalidCellKind(u8),

    #[error("attribute name is not valid UTF-8")]
    InvalidAttributeName,

    #[error("{0} trailing bytes after mutation")]
    TrailingBytes(usize),
}
