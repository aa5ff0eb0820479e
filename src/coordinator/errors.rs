//! Index coordination error types
//!
//! Error codes:
//! - AERO_INDEX_PLANNER_INIT_FAILED (FATAL for the table, indexing disabled)
//! - AERO_INDEX_PLAN_FAILED (ERROR)
//! - AERO_INDEX_STORE_UNREACHABLE (ERROR)
//! - AERO_INDEX_DURABLE_WRITE_FAILED (FATAL)
//! - AERO_INDEX_RECOVERY_WRITE_FAILED (FATAL)
//! - AERO_INDEX_LOG_CORRUPTION (FATAL)

use std::error::Error as StdError;
use std::fmt;

use crate::wal::UnitId;

/// Severity levels for index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, process continues
    Error,
    /// Process (or, for planner init, the table's indexing) must stop
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// Planner could not be constructed for a table
    AeroIndexPlannerInitFailed,
    /// Planner could not compute index updates for a mutation
    AeroIndexPlanFailed,
    /// Direct write to the index store failed
    AeroIndexStoreUnreachable,
    /// Index store failed after the mutation became durable
    AeroIndexDurableWriteFailed,
    /// Index store failed while replaying a segment
    AeroIndexRecoveryWriteFailed,
    /// Persisted edit could not be decoded
    AeroIndexLogCorruption,
}

impl IndexErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::AeroIndexPlannerInitFailed => "AERO_INDEX_PLANNER_INIT_FAILED",
            IndexErrorCode::AeroIndexPlanFailed => "AERO_INDEX_PLAN_FAILED",
            IndexErrorCode::AeroIndexStoreUnreachable => "AERO_INDEX_STORE_UNREACHABLE",
            IndexErrorCode::AeroIndexDurableWriteFailed => "AERO_INDEX_DURABLE_WRITE_FAILED",
            IndexErrorCode::AeroIndexRecoveryWriteFailed => "AERO_INDEX_RECOVERY_WRITE_FAILED",
            IndexErrorCode::AeroIndexLogCorruption => "AERO_INDEX_LOG_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IndexErrorCode::AeroIndexPlanFailed | IndexErrorCode::AeroIndexStoreUnreachable => {
                Severity::Error
            }
            IndexErrorCode::AeroIndexPlannerInitFailed
            | IndexErrorCode::AeroIndexDurableWriteFailed
            | IndexErrorCode::AeroIndexRecoveryWriteFailed
            | IndexErrorCode::AeroIndexLogCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Index coordination error with context
#[derive(Debug)]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
    unit: Option<UnitId>,
    segment: Option<u64>,
    source: Option<BoxedSource>,
}

impl IndexError {
    fn new(code: IndexErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            unit: None,
            segment: None,
            source: None,
        }
    }

    pub fn planner_init_failed(table: &str, reason: impl Into<String>) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexPlannerInitFailed,
            format!(
                "planner for table '{}' could not be built, indexing disabled: {}",
                table,
                reason.into()
            ),
        )
    }

    pub fn plan_failed(row: impl fmt::Display, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexPlanFailed,
            format!("could not compute index updates for row '{}'", row),
        )
        .with_source(source)
    }

    pub fn store_unreachable(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexStoreUnreachable,
            "index store rejected a direct write".to_string(),
        )
        .with_source(source)
    }

    pub fn durable_write_failed(unit: UnitId, source: impl StdError + Send + Sync + 'static) -> Self {
        let mut err = Self::new(
            IndexErrorCode::AeroIndexDurableWriteFailed,
            format!("index write for durable unit {} failed", unit),
        )
        .with_source(source);
        err.unit = Some(unit);
        err
    }

    pub fn recovery_write_failed(
        segment: u64,
        unit: UnitId,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        let mut err = Self::new(
            IndexErrorCode::AeroIndexRecoveryWriteFailed,
            format!("replay of unit {} from segment {} failed", unit, segment),
        )
        .with_source(source);
        err.unit = Some(unit);
        err.segment = Some(segment);
        err
    }

    pub fn log_corruption(
        segment: u64,
        position: usize,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        let mut err = Self::new(
            IndexErrorCode::AeroIndexLogCorruption,
            format!("edit {} of segment {} could not be decoded", position, segment),
        )
        .with_source(source);
        err.segment = Some(segment);
        err
    }

    fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Log-append unit the error belongs to, if any
    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    /// Segment being replayed, if any
    pub fn segment(&self) -> Option<u64> {
        self.segment
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for IndexError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
