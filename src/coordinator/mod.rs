//! Write-path coordination for secondary indexes
//!
//! # Invariants
//!
//! - A durable mutation is acknowledged only after its index updates are
//!   either embedded in the log edit or the process has stopped
//! - Every embedded unit is written to the index store exactly once by
//!   post-commit, and again only by replay after a crash
//! - One shared lock hold per unit with embedded records, released exactly
//!   once
//! - Replay never takes the lock and never marks units finished

mod errors;
mod indexer;
mod post_commit;
mod pre_commit;
mod replay;

pub use errors::{IndexError, IndexErrorCode, IndexResult, Severity};
pub use indexer::Indexer;
pub use post_commit::{PostCommitCoordinator, PostCommitOutcome};
pub use pre_commit::{BatchOutcome, PreCommitCoordinator, PreCommitOutcome};
pub use replay::{RecoveryReplayer, ReplayStats};
