//! Log edit error types

use thiserror::Error;

use crate::mutation::MutationError;

/// Result type for encoding and decoding persisted edits
pub type LogCodecResult<T> = Result<T, LogCodecError>;

/// A persisted edit could not be produced or read back.
///
/// Every decode failure is corruption: replay must stop rather than skip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogCodecError {
    #[error("log edit truncated at byte offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("checksum mismatch at byte offset {offset}: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        offset: usize,
        expected: u32,
        computed: u32,
    },

    #[error("unknown log entry kind {kind} at byte offset {offset}")]
    UnknownEntryKind { offset: usize, kind: u8 },

    #[error("index id at byte offset {offset} is not valid UTF-8")]
    InvalidIndexId { offset: usize },

    #[error("embedded mutation at byte offset {offset}: {source}")]
    Mutation {
        offset: usize,
        #[source]
        source: MutationError,
    },

    #[error("log edit declares {declared} entries but holds {found}")]
    EntryCountMismatch { declared: u32, found: u32 },
}

/// The host's durability log refused an append.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogAppendError {
    #[error("durability log append failed: {0}")]
    Io(String),

    #[error("log edit could not be encoded: {0}")]
    Encode(#[from] LogCodecError),
}
