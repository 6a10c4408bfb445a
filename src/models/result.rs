//! Schedule result (solution) model.
//!
//! A result is the full best-effort solution of one run: the assignment
//! list, the residual conflicts, a fitness score, the producing
//! algorithm, timing, placement failures and diagnostics.
//!
//! For storage the result flattens to a [`RecordSet`] of
//! (course, teacher, classroom, day, slot, term, status) rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Assignment, Conflict, Severity};
use crate::error::Result;

/// A course the run could not place, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub course_id: String,
    pub reason: String,
}

impl PlacementFailure {
    pub fn new(course_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            reason: reason.into(),
        }
    }
}

/// Named diagnostics attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// GA generations executed (genetic / hybrid / parallel runs).
    pub generations: Option<usize>,
    /// Optimizer iterations executed.
    pub iterations: Option<usize>,
    /// Why the main search loop stopped.
    pub convergence_reason: Option<String>,
    /// Optimizer strategy name → iterations it drove.
    pub strategy_usage: BTreeMap<String, usize>,
    /// Best fitness after each hybrid stage, in stage order.
    pub stage_fitness: Vec<(String, f64)>,
    /// Conflicts detected before repair.
    pub conflicts_before_resolution: Option<usize>,
    /// Conflicts the resolver repaired.
    pub conflicts_resolved: Option<usize>,
    /// Whether the parallel island run fell back to one population.
    pub parallel_fallback: bool,
    /// Free-form diagnostics not modelled above.
    pub diagnostics: BTreeMap<String, String>,
}

/// A complete solution returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Scheduled sessions.
    pub assignments: Vec<Assignment>,
    /// Residual conflicts.
    pub conflicts: Vec<Conflict>,
    /// Fitness (`-1000 × violations`, or mean soft score in `[0, 1]`).
    pub fitness: f64,
    /// Name of the producing algorithm.
    pub algorithm: String,
    /// Wall-clock generation time.
    pub generation_time: Duration,
    /// Courses that could not be placed.
    pub failures: Vec<PlacementFailure>,
    /// Diagnostics.
    pub metadata: ResultMetadata,
}

/// Status column of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Session placed without high-severity conflicts.
    Scheduled,
    /// Session involved in at least one high-severity conflict.
    Conflicted,
}

/// One flat storage row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub course_id: String,
    pub teacher_id: String,
    pub classroom_id: String,
    pub day: u8,
    pub slot: u8,
    pub term: String,
    pub academic_year: String,
    pub weeks: String,
    pub status: RecordStatus,
}

/// Flat storage form of a [`ScheduleResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub algorithm: String,
    pub fitness: f64,
    pub generation_time_ms: u64,
    pub records: Vec<ScheduleRecord>,
}

impl ScheduleResult {
    /// Creates a result without conflicts, failures or metadata.
    pub fn new(assignments: Vec<Assignment>, fitness: f64, algorithm: impl Into<String>) -> Self {
        Self {
            assignments,
            conflicts: Vec::new(),
            fitness,
            algorithm: algorithm.into(),
            generation_time: Duration::ZERO,
            failures: Vec::new(),
            metadata: ResultMetadata::default(),
        }
    }

    /// Sets the conflict list.
    pub fn with_conflicts(mut self, conflicts: Vec<Conflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Sets the generation time.
    pub fn with_generation_time(mut self, elapsed: Duration) -> Self {
        self.generation_time = elapsed;
        self
    }

    /// Sets the placement failures.
    pub fn with_failures(mut self, failures: Vec<PlacementFailure>) -> Self {
        self.failures = failures;
        self
    }

    /// Sets the metadata.
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// True iff no conflict has high severity.
    pub fn is_valid(&self) -> bool {
        !self.conflicts.iter().any(|c| c.severity() == Severity::High)
    }

    /// Number of high-severity conflicts.
    pub fn high_severity_count(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.severity() == Severity::High)
            .count()
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Assignments of a course.
    pub fn assignments_for_course(&self, course_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .collect()
    }

    /// Assignments taught by a teacher.
    pub fn assignments_for_teacher(&self, teacher_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.teacher_id == teacher_id)
            .collect()
    }

    /// Assignments held in a classroom.
    pub fn assignments_for_classroom(&self, classroom_id: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.classroom_id == classroom_id)
            .collect()
    }

    /// Flattens the result into storage rows.
    pub fn to_record_set(&self) -> RecordSet {
        let records = self
            .assignments
            .iter()
            .map(|a| {
                let conflicted = self
                    .conflicts
                    .iter()
                    .any(|c| c.severity() == Severity::High && c.assignments().contains(a));
                ScheduleRecord {
                    course_id: a.course_id.clone(),
                    teacher_id: a.teacher_id.clone(),
                    classroom_id: a.classroom_id.clone(),
                    day: a.day(),
                    slot: a.slot(),
                    term: a.term.clone(),
                    academic_year: a.academic_year.clone(),
                    weeks: a.weeks.clone(),
                    status: if conflicted {
                        RecordStatus::Conflicted
                    } else {
                        RecordStatus::Scheduled
                    },
                }
            })
            .collect();

        RecordSet {
            algorithm: self.algorithm.clone(),
            fitness: self.fitness,
            generation_time_ms: self.generation_time.as_millis() as u64,
            records,
        }
    }

    /// Rebuilds a result from storage rows.
    ///
    /// Each row goes through [`Assignment::new`], so out-of-range rows are
    /// rejected. Conflicts are not stored; re-run detection to restore them.
    pub fn from_record_set(set: &RecordSet) -> Result<Self> {
        let assignments = set
            .records
            .iter()
            .map(|r| {
                Ok(Assignment::new(
                    r.course_id.as_str(),
                    r.teacher_id.as_str(),
                    r.classroom_id.as_str(),
                    r.day,
                    r.slot,
                )?
                .with_term(r.term.as_str())
                .with_academic_year(r.academic_year.as_str())
                .with_weeks(r.weeks.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(assignments, set.fitness, set.algorithm.as_str())
            .with_generation_time(Duration::from_millis(set.generation_time_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictType;

    fn sample_result() -> ScheduleResult {
        let a1 = Assignment::new("C1", "T1", "R1", 1, 1).unwrap().with_term("fall");
        let a2 = Assignment::new("C2", "T1", "R2", 1, 1).unwrap();
        let a3 = Assignment::new("C3", "T2", "R1", 2, 3).unwrap();
        let conflict = Conflict::with_default_severity(
            ConflictType::TeacherTime,
            vec![a1.clone(), a2.clone()],
            "T1 double booked",
        )
        .unwrap();
        ScheduleResult::new(vec![a1, a2, a3], -1000.0, "greedy")
            .with_conflicts(vec![conflict])
            .with_generation_time(Duration::from_millis(42))
    }

    #[test]
    fn test_is_valid_follows_high_severity() {
        let r = sample_result();
        assert!(!r.is_valid());
        assert_eq!(r.high_severity_count(), 1);

        let a = Assignment::new("C1", "T1", "R1", 1, 1).unwrap();
        let low = Conflict::with_default_severity(ConflictType::TimePreference, vec![a.clone()], "meh")
            .unwrap();
        let r2 = ScheduleResult::new(vec![a], 0.5, "greedy").with_conflicts(vec![low]);
        assert!(r2.is_valid());
        assert!(ScheduleResult::new(vec![], 0.0, "x").is_valid());
    }

    #[test]
    fn test_queries() {
        let r = sample_result();
        assert_eq!(r.assignments_for_teacher("T1").len(), 2);
        assert_eq!(r.assignments_for_classroom("R1").len(), 2);
        assert_eq!(r.assignments_for_course("C3").len(), 1);
        assert_eq!(r.assignment_count(), 3);
    }

    #[test]
    fn test_record_round_trip() {
        let r = sample_result();
        let set = r.to_record_set();
        assert_eq!(set.records[0].status, RecordStatus::Conflicted);
        assert_eq!(set.records[2].status, RecordStatus::Scheduled);

        let json = serde_json::to_string(&set).unwrap();
        let parsed: RecordSet = serde_json::from_str(&json).unwrap();
        let rebuilt = ScheduleResult::from_record_set(&parsed).unwrap();

        assert_eq!(rebuilt.assignments, r.assignments);
        assert_eq!(rebuilt.fitness, r.fitness);
        assert_eq!(rebuilt.algorithm, "greedy");
        assert_eq!(rebuilt.generation_time, Duration::from_millis(42));
    }

    #[test]
    fn test_from_record_set_rejects_out_of_range() {
        let mut set = sample_result().to_record_set();
        set.records[1].slot = 30;
        assert!(ScheduleResult::from_record_set(&set).is_err());
    }
}
