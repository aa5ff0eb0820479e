//! Crash injection at index protocol boundaries
//!
//! Setting `AERODB_INDEX_CRASH_POINT` to one of the names in [`points`] makes
//! the process terminate through `std::process::abort()` when execution
//! reaches that boundary. No cleanup, no unwinding.
//!
//! ```bash
//! AERODB_INDEX_CRASH_POINT=index_post_commit_before_write ./host
//! ```
//!
//! Hosts use this to produce a log segment whose embedded index records never
//! reached the index store, then restart and check that replay delivers them.

use std::sync::OnceLock;

pub const CRASH_POINT_ENV: &str = "AERODB_INDEX_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn configured() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// True if `AERODB_INDEX_CRASH_POINT` equals `name`
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    configured().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named point is selected
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// Defined crash points
pub mod points {
    /// Index records are in the edit, the host has not appended it
    pub const PRE_COMMIT_AFTER_EMBED: &str = "index_pre_commit_after_embed";
    /// Edit is durable, unit claimed, nothing written to the index store
    pub const POST_COMMIT_BEFORE_WRITE: &str = "index_post_commit_before_write";
    /// Index store written, unit not yet finished, lock still held
    pub const POST_COMMIT_AFTER_WRITE: &str = "index_post_commit_after_write";
    /// Replay decoded an edit and is about to re-write its records
    pub const REPLAY_BEFORE_WRITE: &str = "index_replay_before_write";

    pub fn all() -> &'static [&'static str] {
        &[
            PRE_COMMIT_AFTER_EMBED,
            POST_COMMIT_BEFORE_WRITE,
            POST_COMMIT_AFTER_WRITE,
            REPLAY_BEFORE_WRITE,
        ]
    }
}
