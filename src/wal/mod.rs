//! Durability log edits for the indexing write path
//!
//! The host engine owns the log. This module owns what indexing puts into it:
//! the shared edit of one log-append unit, the embedded index records inside
//! that edit, and their persisted, checksummed form.
//!
//! # Invariants
//!
//! - Every embedded record belongs to exactly one log-append unit
//! - All records of a unit share one finished flag
//! - A persisted edit either decodes completely or is reported corrupt

mod checksum;
mod codec;
mod edit;
mod errors;
mod log;
mod segment;

pub use checksum::{compute_checksum, verify_checksum};
pub use codec::{decode_edit, encode_edit};
pub use edit::{EmbeddedRecord, LogEdit, LogEntry, SharedLogEdit, UnitId, UnitProgress};
pub use errors::{LogAppendError, LogCodecError, LogCodecResult};
pub use log::{DurabilityLog, MemoryDurabilityLog};
pub use segment::{MemorySegment, SegmentSource};
