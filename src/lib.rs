//! aeroindex - crash-consistent secondary index maintenance
//!
//! Sits on a row store's write path between mutation batching and the
//! durability log. Index updates of a durable mutation are embedded in the
//! log edit before the append, written to the index store after it, and
//! replayed from the log after a crash.

pub mod config;
pub mod coordinator;
pub mod crash_point;
pub mod index_update;
pub mod lock;
pub mod mutation;
pub mod observability;
pub mod planner;
pub mod wal;
pub mod writer;
