//! Conflict resolution.
//!
//! Best-effort repair. Conflicts are processed in descending severity;
//! for each, the configured strategies are tried in order until one
//! succeeds or the per-conflict attempt budget runs out.
//!
//! Every candidate move is applied to a scratch copy of the schedule and
//! committed only when
//! 1. every moved assignment passes all hard rules against the rest, and
//! 2. the schedule's hard-violation count does not increase.
//!
//! so resolution never makes a schedule less valid than its input.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constraints::ConstraintManager;
use crate::models::{Assignment, Conflict, ConflictType};

/// Repair strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// Move one conflicting session to another (day, slot).
    TimeReassignment,
    /// Move one conflicting session to another classroom.
    ClassroomReassignment,
    /// Give one conflicting session to another eligible teacher.
    TeacherReassignment,
    /// Exchange the time of a conflicting session with another session.
    Swap,
    /// Split a session in two. Reserved; produces no candidates.
    Split,
}

impl RepairStrategy {
    /// Default strategy order.
    pub const DEFAULT_ORDER: [RepairStrategy; 5] = [
        RepairStrategy::TimeReassignment,
        RepairStrategy::ClassroomReassignment,
        RepairStrategy::TeacherReassignment,
        RepairStrategy::Swap,
        RepairStrategy::Split,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::TimeReassignment => "time_reassignment",
            RepairStrategy::ClassroomReassignment => "classroom_reassignment",
            RepairStrategy::TeacherReassignment => "teacher_reassignment",
            RepairStrategy::Swap => "swap",
            RepairStrategy::Split => "split",
        }
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Candidate moves tried per conflict across all strategies.
    pub max_attempts_per_conflict: usize,
    /// Strategies, tried in order.
    pub strategies: Vec<RepairStrategy>,
    /// Preference score a moved session must reach to clear a
    /// `time_preference` conflict.
    pub preference_threshold: f64,
    pub seed: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_conflict: 50,
            strategies: RepairStrategy::DEFAULT_ORDER.to_vec(),
            preference_threshold: 0.2,
            seed: None,
        }
    }
}

impl ResolverConfig {
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts_per_conflict = attempts;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<RepairStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of a resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// Repaired schedule.
    pub assignments: Vec<Assignment>,
    /// Conflicts cleared during the pass.
    pub resolved: Vec<Conflict>,
    /// Conflicts still present.
    pub unresolved: Vec<Conflict>,
    /// Candidate moves evaluated.
    pub attempts: usize,
    /// Strategy name → successful repairs.
    pub strategy_usage: BTreeMap<String, usize>,
}

/// A candidate edit of the schedule.
#[derive(Debug, Clone)]
enum Move {
    Replace(usize, Assignment),
    ExchangeTime(usize, usize),
}

impl Move {
    /// Applies the move to a copy and returns it with the touched positions.
    fn apply(&self, schedule: &[Assignment]) -> Option<(Vec<Assignment>, Vec<usize>)> {
        let mut scratch = schedule.to_vec();
        match self {
            Move::Replace(i, a) => {
                *scratch.get_mut(*i)? = a.clone();
                Some((scratch, vec![*i]))
            }
            Move::ExchangeTime(i, j) => {
                let (x, y) = (schedule.get(*i)?, schedule.get(*j)?);
                scratch[*i] = x.with_time(y.day(), y.slot()).ok()?;
                scratch[*j] = y.with_time(x.day(), x.slot()).ok()?;
                Some((scratch, vec![*i, *j]))
            }
        }
    }
}

/// Repairs detected conflicts.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    manager: Arc<ConstraintManager>,
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(manager: Arc<ConstraintManager>, config: ResolverConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Attempts to repair every conflict.
    #[tracing::instrument(level = "debug", skip_all, fields(conflicts = conflicts.len()))]
    pub fn resolve(&self, schedule: &[Assignment], conflicts: &[Conflict]) -> ResolutionOutcome {
        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let mut ordered: Vec<&Conflict> = conflicts.iter().collect();
        ordered.sort_by(|a, b| b.severity().cmp(&a.severity()));

        let mut working = schedule.to_vec();
        let mut violations = self.manager.hard_violation_count(&working);
        let mut outcome = ResolutionOutcome {
            assignments: Vec::new(),
            resolved: Vec::new(),
            unresolved: Vec::new(),
            attempts: 0,
            strategy_usage: BTreeMap::new(),
        };

        for conflict in ordered {
            let targets: Vec<usize> = conflict
                .assignments()
                .iter()
                .filter_map(|a| working.iter().position(|w| w == a))
                .collect();

            // An earlier repair already moved part of this conflict.
            if targets.len() < conflict.assignments().len() {
                if self.still_present(conflict, &working) {
                    outcome.unresolved.push(conflict.clone());
                } else {
                    outcome.resolved.push(conflict.clone());
                }
                continue;
            }

            let repaired = self.repair(
                conflict,
                &targets,
                &working,
                violations,
                &mut rng,
                &mut outcome.attempts,
            );
            match repaired {
                Some((repaired, count, strategy)) => {
                    working = repaired;
                    violations = count;
                    *outcome
                        .strategy_usage
                        .entry(strategy.as_str().to_string())
                        .or_insert(0) += 1;
                    outcome.resolved.push(conflict.clone());
                }
                None => outcome.unresolved.push(conflict.clone()),
            }
        }

        tracing::debug!(
            resolved = outcome.resolved.len(),
            unresolved = outcome.unresolved.len(),
            attempts = outcome.attempts,
            "conflict resolution finished"
        );
        outcome.assignments = working;
        outcome
    }

    /// Tries strategies in order within the attempt budget.
    fn repair(
        &self,
        conflict: &Conflict,
        targets: &[usize],
        working: &[Assignment],
        violations: usize,
        rng: &mut SmallRng,
        attempts: &mut usize,
    ) -> Option<(Vec<Assignment>, usize, RepairStrategy)> {
        let mut remaining = self.config.max_attempts_per_conflict;
        let strategies = &self.config.strategies;

        for (n, &strategy) in strategies.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let share = remaining.div_ceil(strategies.len() - n);
            let candidates = self.candidates(strategy, targets, working, rng);
            for mv in candidates.into_iter().take(share) {
                remaining -= 1;
                *attempts += 1;
                let Some((scratch, touched)) = mv.apply(working) else {
                    continue;
                };
                if !touched
                    .iter()
                    .all(|&i| self.manager.hard().is_valid_in_schedule(&scratch, i))
                {
                    continue;
                }
                if !self.clears(conflict, &scratch, &touched) {
                    continue;
                }
                let count = self.manager.hard_violation_count(&scratch);
                if count <= violations {
                    return Some((scratch, count, strategy));
                }
            }
        }
        None
    }

    fn candidates(
        &self,
        strategy: RepairStrategy,
        targets: &[usize],
        working: &[Assignment],
        rng: &mut SmallRng,
    ) -> Vec<Move> {
        let data = self.manager.data();
        let mut moves = Vec::new();

        // Later sessions move first; earlier ones keep their place.
        for &i in targets.iter().rev() {
            let current = &working[i];
            match strategy {
                RepairStrategy::TimeReassignment => {
                    let mut points = data.time_slots().time_points();
                    points.shuffle(rng);
                    moves.extend(
                        points
                            .into_iter()
                            .filter(|&p| p != current.time_key())
                            .filter_map(|(d, s)| current.with_time(d, s).ok())
                            .map(|a| Move::Replace(i, a)),
                    );
                }
                RepairStrategy::ClassroomReassignment => {
                    let Some(course) = data.course(&current.course_id) else {
                        continue;
                    };
                    let mut rooms: Vec<_> = data
                        .fitting_classrooms(course)
                        .into_iter()
                        .filter(|r| r.id != current.classroom_id)
                        .map(|r| r.id.clone())
                        .collect();
                    rooms.shuffle(rng);
                    moves.extend(
                        rooms
                            .into_iter()
                            .map(|r| Move::Replace(i, current.with_classroom(r))),
                    );
                }
                RepairStrategy::TeacherReassignment => {
                    let mut teachers: Vec<_> = data
                        .eligible_teachers(&current.course_id)
                        .into_iter()
                        .filter(|t| t.id != current.teacher_id)
                        .map(|t| t.id.clone())
                        .collect();
                    teachers.shuffle(rng);
                    moves.extend(
                        teachers
                            .into_iter()
                            .map(|t| Move::Replace(i, current.with_teacher(t))),
                    );
                }
                RepairStrategy::Swap => {
                    let mut partners: Vec<usize> = (0..working.len())
                        .filter(|&j| j != i && !working[j].same_time(current))
                        .collect();
                    partners.shuffle(rng);
                    moves.extend(partners.into_iter().map(|j| Move::ExchangeTime(i, j)));
                }
                RepairStrategy::Split => {}
            }
        }
        moves
    }

    /// Whether the touched sessions no longer exhibit the conflict.
    ///
    /// Hard-rule conflicts are cleared by the validity check already done
    /// on the touched positions.
    fn clears(&self, conflict: &Conflict, scratch: &[Assignment], touched: &[usize]) -> bool {
        match conflict.conflict_type() {
            ConflictType::StudentCourse => touched.iter().all(|&i| {
                conflict
                    .assignments()
                    .iter()
                    .filter(|c| c.course_id != scratch[i].course_id)
                    .all(|c| !c.same_time(&scratch[i]))
            }),
            ConflictType::TimePreference => touched.iter().all(|&i| {
                let a = &scratch[i];
                match self.manager.data().preference(&a.teacher_id, a.day(), a.slot()) {
                    Some(p) => p.is_available && p.score >= self.config.preference_threshold,
                    None => true,
                }
            }),
            _ => true,
        }
    }

    /// Whether the conflict's rule still fails for its surviving sessions.
    fn still_present(&self, conflict: &Conflict, working: &[Assignment]) -> bool {
        let survivors: Vec<&Assignment> = conflict
            .assignments()
            .iter()
            .filter(|a| working.contains(a))
            .collect();
        if survivors.len() < conflict.conflict_type().min_assignments() {
            return false;
        }
        survivors.iter().any(|a| {
            working
                .iter()
                .position(|w| w == *a)
                .is_some_and(|i| !self.manager.hard().is_valid_in_schedule(working, i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictDetector, DetectorConfig};
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};

    fn setup() -> (Arc<ConstraintManager>, ConflictDetector) {
        let data = ReferenceCatalog::new(
            vec![Course::new("C1", 40), Course::new("C2", 40), Course::new("C3", 40)],
            vec![
                Teacher::new("T1").with_qualifications(["C1", "C2", "C3"]),
                Teacher::new("T2").with_qualifications(["C2", "C3"]),
            ],
            vec![Classroom::new("R1", 50), Classroom::new("R2", 50)],
            vec![],
            TimeSlotCatalog::weekly(2, 2),
        );
        let manager = Arc::new(ConstraintManager::new(Arc::new(data)));
        let detector = ConflictDetector::new(Arc::clone(&manager), DetectorConfig::hard_only());
        (manager, detector)
    }

    fn a(course: &str, teacher: &str, room: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, teacher, room, day, slot).unwrap()
    }

    #[test]
    fn test_resolves_double_booking() {
        let (manager, detector) = setup();
        let schedule = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "R1", 1, 1)];
        let report = detector.detect(&schedule);
        assert_eq!(report.total(), 2);

        let resolver =
            ConflictResolver::new(Arc::clone(&manager), ResolverConfig::default().with_seed(7));
        let outcome = resolver.resolve(&schedule, &report.conflicts);

        assert_eq!(manager.hard_violation_count(&outcome.assignments), 0);
        assert!(detector.detect(&outcome.assignments).is_empty());
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.resolved.len(), 2);
        assert_eq!(outcome.assignments.len(), 2);
    }

    #[test]
    fn test_never_increases_violations() {
        let (manager, detector) = setup();
        // 2 days × 2 slots × 2 rooms: tight but not infeasible.
        let schedule = vec![
            a("C1", "T1", "R1", 1, 1),
            a("C2", "T1", "R1", 1, 1),
            a("C3", "T2", "R1", 1, 1),
        ];
        let before = manager.hard_violation_count(&schedule);
        for seed in 0..5 {
            let resolver = ConflictResolver::new(
                Arc::clone(&manager),
                ResolverConfig::default().with_seed(seed),
            );
            let report = detector.detect(&schedule);
            let outcome = resolver.resolve(&schedule, &report.conflicts);
            assert!(manager.hard_violation_count(&outcome.assignments) <= before);
            assert_eq!(outcome.resolved.len() + outcome.unresolved.len(), report.total());
        }
    }

    #[test]
    fn test_split_only_is_noop() {
        let (manager, detector) = setup();
        let schedule = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "R2", 1, 1)];
        let report = detector.detect(&schedule);
        let resolver = ConflictResolver::new(
            manager,
            ResolverConfig::default().with_strategies(vec![RepairStrategy::Split]),
        );
        let outcome = resolver.resolve(&schedule, &report.conflicts);
        assert_eq!(outcome.assignments, schedule);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.attempts, 0);
    }

    #[test]
    fn test_teacher_reassignment_only() {
        let (manager, detector) = setup();
        let schedule = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "R2", 1, 1)];
        let report = detector.detect(&schedule);
        let resolver = ConflictResolver::new(
            Arc::clone(&manager),
            ResolverConfig::default()
                .with_seed(1)
                .with_strategies(vec![RepairStrategy::TeacherReassignment]),
        );
        let outcome = resolver.resolve(&schedule, &report.conflicts);
        assert_eq!(manager.hard_violation_count(&outcome.assignments), 0);
        assert_eq!(outcome.assignments[1].teacher_id, "T2");
        assert_eq!(outcome.strategy_usage.get("teacher_reassignment"), Some(&1));
    }

    #[test]
    fn test_zero_budget_leaves_schedule_untouched() {
        let (manager, detector) = setup();
        let schedule = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "R1", 1, 1)];
        let report = detector.detect(&schedule);
        let resolver =
            ConflictResolver::new(manager, ResolverConfig::default().with_max_attempts(0));
        let outcome = resolver.resolve(&schedule, &report.conflicts);
        assert_eq!(outcome.assignments, schedule);
        assert_eq!(outcome.unresolved.len(), 2);
    }
}
