//! Constraint model.
//!
//! Hard constraints decide admissibility; soft constraints rank admissible
//! schedules. [`ConstraintManager`] is the façade the rest of the crate
//! calls.
//!
//! # Reference
//! Schaerf (1999), "A Survey of Automated Timetabling",
//! *Artificial Intelligence Review* 13(2).

mod hard;
mod manager;
mod soft;

pub use hard::{others_of, HardConstraintConfig, HardConstraints};
pub use manager::{
    AssignmentEvaluation, ConstraintConfig, ConstraintManager, ScheduleEvaluation,
    HARD_VIOLATION_PENALTY,
};
pub use soft::{SoftConstraints, SoftScores, SoftWeights};
