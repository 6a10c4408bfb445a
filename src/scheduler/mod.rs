//! Greedy construction and utilization metrics.
//!
//! # Algorithm
//!
//! `GreedyScheduler` places courses one at a time in priority order,
//! taking the best admissible (teacher, classroom, day, slot) found within
//! an attempt budget, with bounded backtracking on failure. It is not
//! optimal, but produces fast feasible baselines and GA seeds.
//!
//! # Utilization
//!
//! `UtilizationReport` breaks a schedule down into per-teacher load,
//! per-classroom usage and per-time-slot demand.
//!
//! # References
//!
//! - Burke & Petrovic (2002), "Recent research directions in automated timetabling"
//! - Schaerf (1999), "A Survey of Automated Timetabling"

mod greedy;
mod utilization;

pub use greedy::{GreedyConfig, GreedyOutcome, GreedyScheduler, PriorityStrategy};
pub use utilization::{ClassroomUsage, SlotDemand, TeacherLoad, UtilizationReport};
