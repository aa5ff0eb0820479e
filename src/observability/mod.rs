//! Observability for the index write path
//!
//! - Structured logging (JSON lines)
//! - Typed events with a fixed severity each
//! - Counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroindex::observability::{log_event_with_fields, Event, IndexMetrics};
//!
//! log_event_with_fields(Event::PreCommitEmbedded, &[("records", "2")]);
//!
//! let metrics = IndexMetrics::new();
//! metrics.add_embedded_records(2);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{IndexMetrics, IndexMetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
