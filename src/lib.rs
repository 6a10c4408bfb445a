//! Course timetabling engine.
//!
//! Assigns course sessions to (teacher, classroom, day, slot) tuples under
//! hard feasibility rules and weighted soft quality objectives, then
//! detects, repairs and reports the conflicts that remain.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Assignment`, `Conflict`, `ScheduleResult`,
//!   reference records (`Course`, `Teacher`, `Classroom`, `TimeSlotCatalog`)
//!   and the `ReferenceData` repository
//! - **`constraints`**: Hard rules, soft scores and the `ConstraintManager`
//!   fitness façade
//! - **`conflict`**: Conflict detection, repair and analysis
//! - **`dispatching`**: Course priority rules for constructive placement
//! - **`scheduler`**: Greedy construction with backtracking; utilization
//! - **`ga`**: Genetic algorithm (course-per-gene encoding) on `u_metaheur::ga`
//! - **`optimizer`**: Local search, plus simulated annealing, tabu search
//!   and VNS on the `u_metaheur` runners
//! - **`orchestration`**: Hybrid pipeline, island model, progress hooks
//! - **`engine`**: `SchedulingEngine` façade
//! - **`validation`**: Reference-data and parameter checks
//!
//! # Architecture
//!
//! ```text
//! engine ─► orchestration ─► ga / optimizer / scheduler
//!                                   │
//!              conflict ◄───────────┤
//!                                   ▼
//!                              constraints ─► models
//! ```
//!
//! Every search algorithm scores candidates through one shared
//! `Arc<ConstraintManager>`; reference data is a read-only snapshot taken
//! at initialization.
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Burke & Petrovic (2002), "Recent research directions in automated timetabling"
//! - Talbi (2009), "Metaheuristics: From Design to Implementation"

pub mod conflict;
pub mod constraints;
pub mod dispatching;
pub mod engine;
pub mod error;
pub mod ga;
pub mod models;
pub mod optimizer;
pub mod orchestration;
pub mod scheduler;
pub mod validation;

pub use engine::{Algorithm, ScheduleParams, ScheduleReport, SchedulingEngine};
pub use error::{Result, ScheduleError};
