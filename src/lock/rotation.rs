//! Log rotation hook
//!
//! The host calls its roll listeners around every segment roll. The
//! synchronizer turns that into the exclusive side of [`IndexLogLock`], so a
//! roll waits for every log-append unit whose index records have not reached
//! the index store yet.

use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event};

use super::coordinator::IndexLogLock;

/// Notified by the host's durability log around a segment roll.
pub trait LogRollListener: Send + Sync {
    /// Called before the current segment is sealed. May block.
    fn pre_roll(&self);

    /// Called after the new segment is open.
    fn post_roll(&self);
}

/// Holds index writes and log rolls apart.
#[derive(Debug, Clone)]
pub struct LogRollSynchronizer {
    lock: Arc<IndexLogLock>,
}

impl LogRollSynchronizer {
    pub fn new(lock: Arc<IndexLogLock>) -> Self {
        Self { lock }
    }

    pub fn lock(&self) -> &Arc<IndexLogLock> {
        &self.lock
    }
}

impl LogRollListener for LogRollSynchronizer {
    fn pre_roll(&self) {
        self.lock.acquire_exclusive();
    }

    fn post_roll(&self) {
        if let Err(err) = self.lock.release_exclusive() {
            log_event_with_fields(Event::LogRollUnbalanced, &[("error", &err.to_string())]);
        }
    }
}
