//! Lock coordination between in-flight index writes and log rotation
//!
//! # Invariants
//!
//! - One shared acquisition per log-append unit that embeds index records
//! - Exactly one release per acquisition; extra releases are refused
//! - Rotation never proceeds while a shared hold is outstanding
//! - FIFO service: a waiting rotation is never starved

mod coordinator;
mod rotation;

pub use coordinator::{IndexLogLock, LockError, LockMode, LockStats};
pub use rotation::{LogRollListener, LogRollSynchronizer};
