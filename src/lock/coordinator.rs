//! Fair shared/exclusive lock between index writes and log rotation
//!
//! Pre-commit takes the shared side for every log-append unit that carries
//! embedded index records; post-commit releases it once those records reach
//! the index store. Log rotation takes the exclusive side, so a segment is
//! never rolled while an index write derived from it is still in flight.
//!
//! # Fairness
//!
//! Requests are served strictly in arrival order. Consecutive shared requests
//! are granted together; a queued exclusive request blocks every shared
//! request behind it, so a steady stream of writes cannot starve rotation.
//!
//! Holds are not tied to a thread. Post-commit may release on a different
//! worker than the one pre-commit acquired on.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Which side of the lock a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Release without a matching acquire. Honoring it could let rotation
    /// discard a segment that recovery still needs.
    #[error("{0} release without a matching acquire")]
    NotHeld(LockMode),
}

/// Acquire/release counters, exposed so callers can assert balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    pub shared_acquired: u64,
    pub shared_released: u64,
    pub exclusive_acquired: u64,
    pub exclusive_released: u64,
    /// Releases refused because nothing was held
    pub rejected_releases: u64,
    /// Exclusive attempts that gave up waiting
    pub exclusive_timeouts: u64,
}

impl LockStats {
    /// Shared holds currently outstanding
    pub fn outstanding_shared(&self) -> u64 {
        self.shared_acquired - self.shared_released
    }

    /// True when every acquisition has been released
    pub fn is_balanced(&self) -> bool {
        self.shared_acquired == self.shared_released
            && self.exclusive_acquired == self.exclusive_released
    }
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct LockState {
    readers: u64,
    writer: bool,
    next_ticket: u64,
    queue: VecDeque<Waiter>,
    stats: LockStats,
}

impl LockState {
    fn enqueue(&mut self, mode: LockMode) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.queue.push_back(Waiter { ticket, mode });
        ticket
    }

    fn can_grant(&self, ticket: u64) -> bool {
        match self.queue.front() {
            Some(head) if head.ticket == ticket => match head.mode {
                LockMode::Shared => !self.writer,
                LockMode::Exclusive => !self.writer && self.readers == 0,
            },
            _ => false,
        }
    }

    fn grant_head(&mut self) {
        if let Some(head) = self.queue.pop_front() {
            match head.mode {
                LockMode::Shared => {
                    self.readers += 1;
                    self.stats.shared_acquired += 1;
                }
                LockMode::Exclusive => {
                    self.writer = true;
                    self.stats.exclusive_acquired += 1;
                }
            }
        }
    }

    fn abandon(&mut self, ticket: u64) {
        self.queue.retain(|w| w.ticket != ticket);
    }
}

/// Process-wide pairing of in-flight index writes with log rotation.
///
/// Create one instance per process and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct IndexLogLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl IndexLogLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, mode: LockMode) {
        let mut state = self.lock_state();
        let ticket = state.enqueue(mode);
        while !state.can_grant(ticket) {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.grant_head();
        drop(state);
        // the next queued request may be compatible with this grant
        self.changed.notify_all();
    }

    /// Take one shared hold. Blocks while rotation holds or waits for the
    /// exclusive side.
    pub fn acquire_shared(&self) {
        self.acquire(LockMode::Shared);
        log_event_with_fields(Event::LockSharedAcquired, &[]);
    }

    /// Give back one shared hold.
    pub fn release_shared(&self) -> Result<(), LockError> {
        let mut state = self.lock_state();
        if state.readers == 0 {
            state.stats.rejected_releases += 1;
            return Err(LockError::NotHeld(LockMode::Shared));
        }
        state.readers -= 1;
        state.stats.shared_released += 1;
        let idle = state.readers == 0;
        drop(state);

        if idle {
            self.changed.notify_all();
        }
        log_event_with_fields(Event::LockSharedReleased, &[]);
        Ok(())
    }

    /// Take the exclusive side. Blocks until every shared hold taken before
    /// this call has been released.
    pub fn acquire_exclusive(&self) {
        self.acquire(LockMode::Exclusive);
        log_event_with_fields(Event::LockExclusiveAcquired, &[]);
    }

    /// Like [`acquire_exclusive`](Self::acquire_exclusive) but gives up after
    /// `timeout`. Returns true if the lock was taken. A timeout too large
    /// to form a deadline waits without one.
    pub fn try_acquire_exclusive_for(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire_exclusive();
            return true;
        };
        let mut state = self.lock_state();
        let ticket = state.enqueue(LockMode::Exclusive);

        while !state.can_grant(ticket) {
            let now = Instant::now();
            if now >= deadline {
                state.abandon(ticket);
                state.stats.exclusive_timeouts += 1;
                drop(state);
                self.changed.notify_all();
                let waited = timeout.as_millis().to_string();
                log_event_with_fields(Event::LockExclusiveTimeout, &[("waited_ms", &waited)]);
                return false;
            }
            let (next, _) = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }

        state.grant_head();
        drop(state);
        self.changed.notify_all();
        log_event_with_fields(Event::LockExclusiveAcquired, &[]);
        true
    }

    /// Release the exclusive side.
    pub fn release_exclusive(&self) -> Result<(), LockError> {
        let mut state = self.lock_state();
        if !state.writer {
            state.stats.rejected_releases += 1;
            return Err(LockError::NotHeld(LockMode::Exclusive));
        }
        state.writer = false;
        state.stats.exclusive_released += 1;
        drop(state);

        self.changed.notify_all();
        log_event_with_fields(Event::LockExclusiveReleased, &[]);
        Ok(())
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> LockStats {
        self.lock_state().stats
    }

    /// Shared holds currently granted
    pub fn shared_holders(&self) -> u64 {
        self.lock_state().readers
    }

    pub fn is_exclusively_held(&self) -> bool {
        self.lock_state().writer
    }

    /// Requests waiting in the queue
    pub fn queued(&self) -> usize {
        self.lock_state().queue.len()
    }
}
