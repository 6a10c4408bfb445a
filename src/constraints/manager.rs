//! Constraint manager façade.
//!
//! The single entry point the search algorithms use to check and score
//! assignments and whole schedules.
//!
//! # Fitness
//!
//! ```text
//! fitness = -1000 × violations   if any hard violation
//!         = mean(soft_score)     otherwise, in [0, 1]
//! ```
//!
//! Hard checks run against the preceding assignments in construction
//! order; soft scores see the whole schedule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::hard::{HardConstraintConfig, HardConstraints};
use super::soft::{SoftConstraints, SoftScores, SoftWeights};
use crate::models::{Assignment, Conflict, ConflictType, ReferenceData};

/// Penalty per hard violation in fitness and overall scores.
pub const HARD_VIOLATION_PENALTY: f64 = 1000.0;

/// Combined hard and soft configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    pub hard: HardConstraintConfig,
    pub weights: SoftWeights,
}

impl ConstraintConfig {
    /// Sets the soft weights.
    pub fn with_weights(mut self, weights: SoftWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the hard-rule configuration.
    pub fn with_hard(mut self, hard: HardConstraintConfig) -> Self {
        self.hard = hard;
        self
    }
}

/// Evaluation of one assignment against a committed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEvaluation {
    pub is_valid: bool,
    /// Messages of failed hard rules.
    pub violations: Vec<String>,
    pub soft: SoftScores,
    pub soft_score: f64,
    /// Soft score when valid, `-1000 × violations` otherwise.
    pub overall: f64,
}

/// Aggregate evaluation of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvaluation {
    /// Assignments failing hard rules against their predecessors.
    pub violation_count: usize,
    /// Mean weighted soft score over all assignments.
    pub mean_soft_score: f64,
    pub fitness: f64,
}

impl ScheduleEvaluation {
    /// Whether the schedule has no hard violations.
    pub fn is_feasible(&self) -> bool {
        self.violation_count == 0
    }
}

/// Façade over hard and soft constraints sharing one reference snapshot.
#[derive(Clone)]
pub struct ConstraintManager {
    data: Arc<dyn ReferenceData>,
    hard: HardConstraints,
    soft: SoftConstraints,
}

impl ConstraintManager {
    /// Creates a manager with default configuration.
    pub fn new(data: Arc<dyn ReferenceData>) -> Self {
        Self::with_config(data, ConstraintConfig::default())
    }

    /// Creates a manager with explicit configuration.
    pub fn with_config(data: Arc<dyn ReferenceData>, config: ConstraintConfig) -> Self {
        let hours = config.hard.hours_per_session;
        Self {
            hard: HardConstraints::new(Arc::clone(&data), config.hard),
            soft: SoftConstraints::new(Arc::clone(&data), config.weights, hours),
            data,
        }
    }

    /// Reference data snapshot.
    pub fn data(&self) -> &dyn ReferenceData {
        self.data.as_ref()
    }

    /// Shared handle to the reference data.
    pub fn data_arc(&self) -> Arc<dyn ReferenceData> {
        Arc::clone(&self.data)
    }

    pub fn hard(&self) -> &HardConstraints {
        &self.hard
    }

    pub fn soft(&self) -> &SoftConstraints {
        &self.soft
    }

    /// All hard rules against a committed set.
    pub fn check_hard_constraints(&self, a: &Assignment, existing: &[Assignment]) -> bool {
        self.hard.is_valid_assignment(a, existing)
    }

    /// Weighted soft score in `[0, 1]`.
    pub fn calculate_soft_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        self.soft.calculate_total_score(a, schedule)
    }

    /// Hard and soft evaluation of one assignment.
    pub fn evaluate_assignment(
        &self,
        a: &Assignment,
        existing: &[Assignment],
    ) -> AssignmentEvaluation {
        let violations = self.hard.get_violations(a, existing);
        let soft = self.soft.scores(a, existing);
        let soft_score = soft.weighted_total(self.soft.weights());
        let is_valid = violations.is_empty();
        let overall = if is_valid {
            soft_score
        } else {
            -HARD_VIOLATION_PENALTY * violations.len() as f64
        };
        AssignmentEvaluation {
            is_valid,
            violations,
            soft,
            soft_score,
            overall,
        }
    }

    /// Evaluates every assignment against those preceding it.
    pub fn evaluate_schedule(&self, schedule: &[Assignment]) -> ScheduleEvaluation {
        let violation_count = self.hard_violation_count(schedule);
        let mean_soft_score = if schedule.is_empty() {
            0.0
        } else {
            schedule
                .iter()
                .map(|a| self.soft.calculate_total_score(a, schedule))
                .sum::<f64>()
                / schedule.len() as f64
        };
        let fitness = if violation_count > 0 {
            -HARD_VIOLATION_PENALTY * violation_count as f64
        } else {
            mean_soft_score
        };
        ScheduleEvaluation {
            violation_count,
            mean_soft_score,
            fitness,
        }
    }

    /// Fitness of a schedule.
    pub fn fitness(&self, schedule: &[Assignment]) -> f64 {
        self.evaluate_schedule(schedule).fitness
    }

    /// Assignments failing hard rules against their predecessors.
    pub fn hard_violation_count(&self, schedule: &[Assignment]) -> usize {
        schedule
            .iter()
            .enumerate()
            .filter(|(i, a)| !self.hard.is_valid_assignment(a, &schedule[..*i]))
            .count()
    }

    /// Pairwise double bookings, one conflict per teacher-time and
    /// classroom-time group of size > 1.
    ///
    /// Output order is deterministic: teacher groups then classroom groups,
    /// each sorted by key.
    pub fn find_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let mut by_teacher: BTreeMap<(&str, u8, u8), Vec<&Assignment>> = BTreeMap::new();
        let mut by_classroom: BTreeMap<(&str, u8, u8), Vec<&Assignment>> = BTreeMap::new();
        for a in schedule {
            by_teacher.entry(a.teacher_time_key()).or_default().push(a);
            by_classroom.entry(a.classroom_time_key()).or_default().push(a);
        }

        let mut conflicts = Vec::new();
        for ((teacher, day, slot), group) in by_teacher {
            if let Some(c) = group_conflict(
                ConflictType::TeacherTime,
                group,
                format!("Teacher {teacher} is double-booked on day {day} slot {slot}"),
            ) {
                conflicts.push(c);
            }
        }
        for ((room, day, slot), group) in by_classroom {
            if let Some(c) = group_conflict(
                ConflictType::ClassroomTime,
                group,
                format!("Classroom {room} is double-booked on day {day} slot {slot}"),
            ) {
                conflicts.push(c);
            }
        }
        conflicts
    }
}

impl std::fmt::Debug for ConstraintManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintManager")
            .field("hard", &self.hard)
            .field("soft", &self.soft)
            .finish()
    }
}

fn group_conflict(
    conflict_type: ConflictType,
    group: Vec<&Assignment>,
    description: String,
) -> Option<Conflict> {
    if group.len() < 2 {
        return None;
    }
    let assignments = group.into_iter().cloned().collect();
    Conflict::with_default_severity(conflict_type, assignments, description).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};

    fn manager() -> ConstraintManager {
        let data = ReferenceCatalog::new(
            vec![Course::new("C1", 50), Course::new("C2", 50), Course::new("C3", 50)],
            vec![
                Teacher::new("T1").with_qualifications(["C1", "C2", "C3"]),
                Teacher::new("T2").with_qualifications(["C1", "C2", "C3"]),
            ],
            vec![Classroom::new("R1", 100), Classroom::new("R2", 60)],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        );
        ConstraintManager::new(Arc::new(data))
    }

    fn a(course: &str, teacher: &str, room: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, teacher, room, day, slot).unwrap()
    }

    #[test]
    fn test_evaluate_assignment_invalid_is_negative() {
        let m = manager();
        let existing = vec![a("C1", "T1", "R1", 1, 1)];
        let ok = m.evaluate_assignment(&a("C2", "T2", "R2", 1, 1), &existing);
        assert!(ok.is_valid);
        assert!((0.0..=1.0).contains(&ok.overall));

        let bad = m.evaluate_assignment(&a("C2", "T1", "R1", 1, 1), &existing);
        assert!(!bad.is_valid);
        assert_eq!(bad.violations.len(), 2);
        assert_eq!(bad.overall, -2000.0);
    }

    #[test]
    fn test_evaluate_schedule_fitness() {
        let m = manager();
        let good = vec![
            a("C1", "T1", "R1", 1, 1),
            a("C2", "T2", "R2", 1, 1),
            a("C3", "T1", "R1", 2, 1),
        ];
        let eval = m.evaluate_schedule(&good);
        assert!(eval.is_feasible());
        assert!((0.0..=1.0).contains(&eval.fitness));
        assert_eq!(eval.fitness, eval.mean_soft_score);

        let bad = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "R2", 1, 1)];
        let eval = m.evaluate_schedule(&bad);
        assert_eq!(eval.violation_count, 1);
        assert_eq!(eval.fitness, -1000.0);
        assert_eq!(m.fitness(&[]), 0.0);
    }

    #[test]
    fn test_find_conflicts_groups_and_is_idempotent() {
        let m = manager();
        let schedule = vec![
            a("C1", "T1", "R1", 1, 1),
            a("C2", "T1", "R2", 1, 1),
            a("C3", "T2", "R1", 1, 1),
        ];
        let first = m.find_conflicts(&schedule);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].conflict_type(), ConflictType::TeacherTime);
        assert_eq!(first[0].assignments().len(), 2);
        assert_eq!(first[1].conflict_type(), ConflictType::ClassroomTime);

        let second = m.find_conflicts(&schedule);
        let keys = |cs: &[Conflict]| cs.iter().map(Conflict::conflict_key).collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
    }

    #[test]
    fn test_config_round_trip() {
        let config = ConstraintConfig::default()
            .with_hard(HardConstraintConfig::default().with_daily_hours_ceiling(6));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ConstraintConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
