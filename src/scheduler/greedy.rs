//! Greedy constructive scheduler with bounded backtracking.
//!
//! # Algorithm
//!
//! 1. Order schedulable courses by the configured priority strategy.
//! 2. For each course, enumerate teacher × time × classroom candidates:
//!    least-loaded teacher first, preference-ranked times first,
//!    best-fitting classroom first.
//! 3. Accept the first valid candidate whose soft score reaches
//!    `early_accept_score`; otherwise keep the best valid candidate seen
//!    within `max_attempts_per_course` scored candidates.
//! 4. On failure, undo the last `backtrack_depth` placements, place the
//!    failed course first and re-insert the undone ones. If any of them
//!    cannot be re-placed the backtrack is abandoned and the failure stands.
//!
//! # Complexity
//! O(n · t · p · r · n) worst case for n courses, t teachers, p time
//! points and r classrooms (hard checks are linear in placed sessions).
//!
//! # Reference
//! Burke & Petrovic (2002), "Recent research directions in automated
//! timetabling", *EJOR* 140(2).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constraints::ConstraintManager;
use crate::dispatching::{rules, EvaluationMode, PriorityContext, RuleEngine, TieBreaker};
use crate::models::{Assignment, Course, PlacementFailure, ReferenceData};

/// Course ordering strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityStrategy {
    /// Hardest courses first.
    Difficulty,
    /// Fewest teacher × classroom options first.
    Scarcity,
    /// Largest enrollment first.
    Enrollment,
    /// Rarest room type first.
    CourseType,
    /// Weighted mix of all four.
    #[default]
    Hybrid,
}

impl PriorityStrategy {
    /// Rule engine implementing the strategy (ties broken by course id).
    pub fn rule_engine(self) -> RuleEngine {
        let engine = match self {
            PriorityStrategy::Difficulty => RuleEngine::new().with_rule(rules::ByDifficulty),
            PriorityStrategy::Scarcity => RuleEngine::new().with_rule(rules::ByScarcity),
            PriorityStrategy::Enrollment => RuleEngine::new().with_rule(rules::ByEnrollment),
            PriorityStrategy::CourseType => RuleEngine::new().with_rule(rules::ByCourseType),
            PriorityStrategy::Hybrid => RuleEngine::new()
                .with_mode(EvaluationMode::Weighted)
                .with_weighted_rule(rules::ByScarcity, 0.4)
                .with_weighted_rule(rules::ByDifficulty, 0.3)
                .with_weighted_rule(rules::ByEnrollment, 0.2)
                .with_weighted_rule(rules::ByCourseType, 0.1),
        };
        engine.with_final_tie_breaker(TieBreaker::ById)
    }
}

/// Greedy scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    pub priority: PriorityStrategy,
    /// Valid candidates scored per course before settling for the best.
    pub max_attempts_per_course: usize,
    /// Soft score at which a valid candidate is accepted immediately.
    pub early_accept_score: f64,
    pub enable_backtracking: bool,
    /// Placements undone per backtrack.
    pub backtrack_depth: usize,
    pub time_limit: Option<Duration>,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            priority: PriorityStrategy::Hybrid,
            max_attempts_per_course: 100,
            early_accept_score: 0.9,
            enable_backtracking: true,
            backtrack_depth: 3,
            time_limit: None,
        }
    }
}

impl GreedyConfig {
    pub fn with_priority(mut self, priority: PriorityStrategy) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts_per_course = attempts;
        self
    }

    pub fn with_backtracking(mut self, enabled: bool) -> Self {
        self.enable_backtracking = enabled;
        self
    }

    pub fn with_backtrack_depth(mut self, depth: usize) -> Self {
        self.backtrack_depth = depth;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Result of a greedy run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GreedyOutcome {
    /// Placed sessions, in placement order.
    pub assignments: Vec<Assignment>,
    /// Courses that could not be placed.
    pub failures: Vec<PlacementFailure>,
    /// Successful backtracks.
    pub backtracks: usize,
    pub elapsed: Duration,
}

impl GreedyOutcome {
    /// Whether every schedulable course was placed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Greedy constructive scheduler.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use u_timetable::constraints::ConstraintManager;
/// use u_timetable::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
/// use u_timetable::scheduler::{GreedyConfig, GreedyScheduler};
///
/// let data = ReferenceCatalog::new(
///     vec![Course::new("C1", 30)],
///     vec![Teacher::new("T1").with_qualification("C1")],
///     vec![Classroom::new("R1", 40)],
///     vec![],
///     TimeSlotCatalog::weekly(5, 4),
/// );
/// let manager = Arc::new(ConstraintManager::new(Arc::new(data)));
/// let outcome = GreedyScheduler::new(manager, GreedyConfig::default()).schedule();
/// assert_eq!(outcome.assignments.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GreedyScheduler {
    manager: Arc<ConstraintManager>,
    config: GreedyConfig,
}

impl GreedyScheduler {
    pub fn new(manager: Arc<ConstraintManager>, config: GreedyConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &GreedyConfig {
        &self.config
    }

    /// Schedules every active, published course.
    #[tracing::instrument(level = "debug", skip_all, fields(priority = ?self.config.priority))]
    pub fn schedule(&self) -> GreedyOutcome {
        self.run(&mut |_: &mut Vec<(u8, u8)>| {})
    }

    /// Same as [`Self::schedule`] but shuffles the time order before
    /// preference ranking, so repeated calls yield different feasible
    /// schedules (used to seed GA populations).
    pub fn schedule_randomized<R: Rng + ?Sized>(&self, rng: &mut R) -> GreedyOutcome {
        self.run(&mut |times: &mut Vec<(u8, u8)>| times.shuffle(&mut *rng))
    }

    fn run(&self, shuffle: &mut dyn FnMut(&mut Vec<(u8, u8)>)) -> GreedyOutcome {
        let start = Instant::now();
        let data = self.manager.data();
        let courses: Vec<Course> = data
            .courses()
            .iter()
            .filter(|c| c.is_schedulable())
            .cloned()
            .collect();

        let context = PriorityContext::from_reference(data);
        let order = self.config.priority.rule_engine().sort_indices(&courses, &context);

        let mut placed: Vec<Assignment> = Vec::new();
        let mut outcome = GreedyOutcome::default();

        for (n, &idx) in order.iter().enumerate() {
            let course = &courses[idx];
            if self.config.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                tracing::warn!(remaining = order.len() - n, "greedy time budget exhausted");
                for &rest in &order[n..] {
                    outcome.failures.push(PlacementFailure::new(
                        courses[rest].id.as_str(),
                        "time budget exhausted before placement",
                    ));
                }
                break;
            }

            match self.place(course, &placed, shuffle) {
                Ok(a) => placed.push(a),
                Err(reason) => {
                    if self.config.enable_backtracking && !placed.is_empty() {
                        if let Some(repaired) = self.backtrack(course, &placed, shuffle) {
                            placed = repaired;
                            outcome.backtracks += 1;
                            continue;
                        }
                    }
                    tracing::debug!(course = %course.id, %reason, "course not placed");
                    outcome
                        .failures
                        .push(PlacementFailure::new(course.id.as_str(), reason));
                }
            }
        }

        outcome.assignments = placed;
        outcome.elapsed = start.elapsed();
        tracing::debug!(
            placed = outcome.assignments.len(),
            failed = outcome.failures.len(),
            backtracks = outcome.backtracks,
            "greedy scheduling finished"
        );
        outcome
    }

    /// Finds a placement for one course against the committed set.
    fn place(
        &self,
        course: &Course,
        placed: &[Assignment],
        shuffle: &mut dyn FnMut(&mut Vec<(u8, u8)>),
    ) -> Result<Assignment, String> {
        let data = self.manager.data();

        let mut teachers: Vec<&str> = data
            .eligible_teachers(&course.id)
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        if teachers.is_empty() {
            return Err("no eligible teacher".to_string());
        }
        // Least-loaded teacher first.
        teachers.sort_by_key(|t| (placed.iter().filter(|a| a.teacher_id == *t).count(), *t));

        let mut rooms = data.fitting_classrooms(course);
        if rooms.is_empty() {
            return Err(format!(
                "no available classroom with capacity >= {}",
                course.enrollment_cap
            ));
        }
        // Fill ratio closest to 80% first.
        rooms.sort_by(|a, b| {
            fill_distance(course, a.capacity)
                .total_cmp(&fill_distance(course, b.capacity))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut times = data.time_slots().time_points();
        shuffle(&mut times);

        let mut best: Option<(Assignment, f64)> = None;
        let mut attempts = 0usize;

        for teacher in &teachers {
            let ranked = ranked_times(data, teacher, &times);
            for &(day, slot) in &ranked {
                for room in &rooms {
                    let Ok(candidate) =
                        Assignment::new(course.id.as_str(), *teacher, room.id.as_str(), day, slot)
                    else {
                        continue;
                    };
                    if !self.manager.check_hard_constraints(&candidate, placed) {
                        continue;
                    }
                    attempts += 1;
                    let score = self.manager.calculate_soft_score(&candidate, placed);
                    if score >= self.config.early_accept_score {
                        return Ok(candidate);
                    }
                    if best.as_ref().map_or(true, |(_, s)| score > *s) {
                        best = Some((candidate, score));
                    }
                    if attempts >= self.config.max_attempts_per_course {
                        return best.map(|(a, _)| a).ok_or_else(no_valid_slot);
                    }
                }
            }
        }

        best.map(|(a, _)| a).ok_or_else(no_valid_slot)
    }

    /// Undo the last placements, place the failed course, re-insert.
    fn backtrack(
        &self,
        failed: &Course,
        placed: &[Assignment],
        shuffle: &mut dyn FnMut(&mut Vec<(u8, u8)>),
    ) -> Option<Vec<Assignment>> {
        let depth = self.config.backtrack_depth.min(placed.len());
        if depth == 0 {
            return None;
        }
        let data = self.manager.data();
        let keep = placed.len() - depth;
        let mut trial: Vec<Assignment> = placed[..keep].to_vec();

        let first = self.place(failed, &trial, shuffle).ok()?;
        trial.push(first);

        for undone in &placed[keep..] {
            let course = data.course(&undone.course_id)?;
            let again = self.place(course, &trial, shuffle).ok()?;
            trial.push(again);
        }

        tracing::debug!(course = %failed.id, depth, "backtrack succeeded");
        Some(trial)
    }
}

fn no_valid_slot() -> String {
    "no valid teacher, classroom and time combination".to_string()
}

fn fill_distance(course: &Course, capacity: u32) -> f64 {
    if capacity == 0 {
        return f64::INFINITY;
    }
    (course.enrollment_cap as f64 / capacity as f64 - 0.8).abs()
}

/// Times ordered by the teacher's preference, best first (stable).
fn ranked_times(data: &dyn ReferenceData, teacher: &str, times: &[(u8, u8)]) -> Vec<(u8, u8)> {
    let score = |&(d, s): &(u8, u8)| match data.preference(teacher, d, s) {
        Some(p) if !p.is_available => 0.0,
        Some(p) => p.score,
        None => 0.5,
    };
    let mut ranked = times.to_vec();
    ranked.sort_by(|a, b| score(b).total_cmp(&score(a)));
    ranked
}
