//! Course priority rules and rule engine.
//!
//! Decides the order in which the greedy scheduler places courses.
//! Placing the most constrained courses first leaves the flexible ones
//! to fill the remaining gaps.
//!
//! # Usage
//!
//! ```
//! use u_timetable::dispatching::{rules, RuleEngine};
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::ByScarcity)
//!     .with_tie_breaker(rules::ByDifficulty);
//! // let order = engine.sort_indices(&courses, &context);
//! ```
//!
//! # References
//!
//! - Carter, Laporte & Lee (1996), "Examination timetabling: Algorithmic
//!   strategies and applications", *JORS* 47(3)
//! - Brélaz (1979), "New methods to color the vertices of a graph" (DSATUR)

mod context;
mod engine;
pub mod rules;

pub use context::PriorityContext;
pub use engine::{EvaluationMode, RuleEngine, TieBreaker};

use crate::models::Course;
use std::fmt::Debug;

/// Score returned by a priority rule.
///
/// Lower scores = higher priority (placed first).
pub type RuleScore = f64;

/// A rule that scores how urgently a course should be placed.
///
/// # Score Convention
/// **Lower score = higher priority.** Built-in rules return values in
/// `[0, 1]` so they can be mixed in weighted mode.
pub trait PriorityRule: Send + Sync + Debug {
    /// Rule name (e.g., "DIFFICULTY").
    fn name(&self) -> &'static str;

    /// Scores a course; lower = placed earlier.
    fn evaluate(&self, course: &Course, context: &PriorityContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
