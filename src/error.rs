//! Error types.
//!
//! Only conditions that make a run impossible are errors. Infeasible
//! courses and residual conflicts are data on the result, not failures.

use thiserror::Error;

use crate::models::ConflictType;

/// Errors raised by the timetabling engine.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Day-of-week outside `1..=7`.
    #[error("day {0} is outside the valid range 1..=7")]
    InvalidDay(u8),

    /// Time-slot number outside `1..=20`.
    #[error("slot {0} is outside the valid range 1..=20")]
    InvalidSlot(u8),

    /// A conflict was built with fewer assignments than its type requires.
    #[error("{conflict_type} conflict needs at least {required} assignment(s), got {actual}")]
    ConflictArity {
        conflict_type: ConflictType,
        required: usize,
        actual: usize,
    },

    /// A scheduling call was made before `initialize`.
    #[error("scheduling engine is not initialized; call initialize() first")]
    NotInitialized,

    /// Run parameters failed eager validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Reference data failed validation at initialization.
    #[error("invalid reference data: {}", .0.join("; "))]
    InvalidReferenceData(Vec<String>),

    /// Algorithm name not recognized.
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// A parallel worker panicked.
    #[error("parallel worker {0} panicked")]
    WorkerPanicked(usize),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, ScheduleError>;
