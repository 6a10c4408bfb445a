//! Conflict model.
//!
//! A conflict records a set of assignments that violate a rule together
//! (double bookings, student overlaps) or a single assignment that
//! violates a per-session rule (capacity, qualification, catalog checks).
//! Every hard-rule violation maps to a `High` conflict. Conflicts are
//! immutable once built; repair produces new assignments and new
//! conflicts rather than editing existing ones.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Assignment;
use crate::error::{Result, ScheduleError};

/// Classification of conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Teacher booked twice at the same (day, slot).
    TeacherTime,
    /// Classroom booked twice at the same (day, slot).
    ClassroomTime,
    /// Classroom capacity below course enrollment cap.
    ClassroomCapacity,
    /// Teacher not qualified for the course.
    TeacherQualification,
    /// Classroom unknown, unavailable or inactive.
    ClassroomUnavailable,
    /// Course unknown, inactive or unpublished.
    CourseInactive,
    /// Day or slot outside the active time-slot catalog.
    TimeSlotInactive,
    /// Teacher's same-day load above the daily ceiling.
    TeacherWorkload,
    /// A student enrolled in two courses held at the same time.
    StudentCourse,
    /// Session placed at a time the teacher marked unavailable or disliked.
    TimePreference,
}

impl ConflictType {
    /// All conflict types, in declaration order.
    pub const ALL: [ConflictType; 10] = [
        ConflictType::TeacherTime,
        ConflictType::ClassroomTime,
        ConflictType::ClassroomCapacity,
        ConflictType::TeacherQualification,
        ConflictType::ClassroomUnavailable,
        ConflictType::CourseInactive,
        ConflictType::TimeSlotInactive,
        ConflictType::TeacherWorkload,
        ConflictType::StudentCourse,
        ConflictType::TimePreference,
    ];

    /// Minimum number of assignments a conflict of this type references.
    ///
    /// Pairwise incompatibilities need two; per-session rule violations
    /// are single-assignment conflicts with the same shape.
    pub fn min_assignments(self) -> usize {
        match self {
            ConflictType::TeacherTime | ConflictType::ClassroomTime | ConflictType::StudentCourse => 2,
            ConflictType::ClassroomCapacity
            | ConflictType::TeacherQualification
            | ConflictType::ClassroomUnavailable
            | ConflictType::CourseInactive
            | ConflictType::TimeSlotInactive
            | ConflictType::TeacherWorkload
            | ConflictType::TimePreference => 1,
        }
    }

    /// Severity assigned by the detector. Hard-rule types are `High`.
    pub fn default_severity(self) -> Severity {
        match self {
            ConflictType::TeacherTime
            | ConflictType::ClassroomTime
            | ConflictType::ClassroomCapacity
            | ConflictType::TeacherQualification
            | ConflictType::ClassroomUnavailable
            | ConflictType::CourseInactive
            | ConflictType::TimeSlotInactive
            | ConflictType::TeacherWorkload => Severity::High,
            ConflictType::StudentCourse => Severity::Medium,
            ConflictType::TimePreference => Severity::Low,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictType::TeacherTime => "teacher_time",
            ConflictType::ClassroomTime => "classroom_time",
            ConflictType::ClassroomCapacity => "classroom_capacity",
            ConflictType::TeacherQualification => "teacher_qualification",
            ConflictType::ClassroomUnavailable => "classroom_unavailable",
            ConflictType::CourseInactive => "course_inactive",
            ConflictType::TimeSlotInactive => "time_slot_inactive",
            ConflictType::TeacherWorkload => "teacher_workload",
            ConflictType::StudentCourse => "student_course",
            ConflictType::TimePreference => "time_preference",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict severity. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

/// De-duplication key: type plus the sorted session tuples involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    pub conflict_type: ConflictType,
    pub sessions: Vec<(String, String, String, u8, u8)>,
}

/// An immutable record of incompatible assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    conflict_type: ConflictType,
    assignments: Vec<Assignment>,
    description: String,
    severity: Severity,
}

impl Conflict {
    /// Creates a conflict.
    ///
    /// # Errors
    /// [`ScheduleError::ConflictArity`] when fewer assignments are given
    /// than [`ConflictType::min_assignments`] requires.
    pub fn new(
        conflict_type: ConflictType,
        assignments: Vec<Assignment>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Result<Self> {
        let required = conflict_type.min_assignments();
        if assignments.len() < required {
            return Err(ScheduleError::ConflictArity {
                conflict_type,
                required,
                actual: assignments.len(),
            });
        }
        Ok(Self {
            conflict_type,
            assignments,
            description: description.into(),
            severity,
        })
    }

    /// Creates a conflict with the type's default severity.
    pub fn with_default_severity(
        conflict_type: ConflictType,
        assignments: Vec<Assignment>,
        description: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            conflict_type,
            assignments,
            description,
            conflict_type.default_severity(),
        )
    }

    pub fn conflict_type(&self) -> ConflictType {
        self.conflict_type
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Key identifying the same violation regardless of assignment order.
    pub fn conflict_key(&self) -> ConflictKey {
        let mut sessions: Vec<_> = self
            .assignments
            .iter()
            .map(|a| {
                (
                    a.course_id.clone(),
                    a.teacher_id.clone(),
                    a.classroom_id.clone(),
                    a.day(),
                    a.slot(),
                )
            })
            .collect();
        sessions.sort();
        ConflictKey {
            conflict_type: self.conflict_type,
            sessions,
        }
    }

    /// Whether the conflict references the given course.
    pub fn involves_course(&self, course_id: &str) -> bool {
        self.assignments.iter().any(|a| a.course_id == course_id)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}",
            self.conflict_type, self.severity, self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(course: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, "T1", "R1", day, slot).unwrap()
    }

    #[test]
    fn test_pairwise_requires_two() {
        let err = Conflict::with_default_severity(ConflictType::TeacherTime, vec![a("C1", 1, 1)], "x");
        assert!(matches!(err, Err(ScheduleError::ConflictArity { required: 2, .. })));

        let ok = Conflict::with_default_severity(
            ConflictType::TeacherTime,
            vec![a("C1", 1, 1), a("C2", 1, 1)],
            "double booked",
        )
        .unwrap();
        assert_eq!(ok.severity(), Severity::High);
        assert_eq!(ok.assignments().len(), 2);
    }

    #[test]
    fn test_single_assignment_variant() {
        let c = Conflict::with_default_severity(
            ConflictType::ClassroomCapacity,
            vec![a("C1", 1, 1)],
            "too small",
        )
        .unwrap();
        assert_eq!(c.conflict_type().min_assignments(), 1);
        assert!(Conflict::new(ConflictType::ClassroomCapacity, vec![], "", Severity::High).is_err());
    }

    #[test]
    fn test_conflict_key_order_independent() {
        let c1 = Conflict::with_default_severity(
            ConflictType::ClassroomTime,
            vec![a("C1", 1, 1), a("C2", 1, 1)],
            "x",
        )
        .unwrap();
        let c2 = Conflict::with_default_severity(
            ConflictType::ClassroomTime,
            vec![a("C2", 1, 1), a("C1", 1, 1)],
            "y",
        )
        .unwrap();
        assert_eq!(c1.conflict_key(), c2.conflict_key());
    }

    #[test]
    fn test_hard_rule_types_are_high() {
        for t in [
            ConflictType::ClassroomUnavailable,
            ConflictType::CourseInactive,
            ConflictType::TimeSlotInactive,
            ConflictType::TeacherWorkload,
        ] {
            assert_eq!(t.default_severity(), Severity::High, "{t}");
            assert_eq!(t.min_assignments(), 1);
        }
        assert_eq!(ConflictType::StudentCourse.default_severity(), Severity::Medium);
        assert_eq!(ConflictType::ALL.len(), 10);
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ConflictType::TeacherTime.to_string(), "teacher_time");
        assert_eq!(
            serde_json::to_string(&ConflictType::ClassroomCapacity).unwrap(),
            "\"classroom_capacity\""
        );
    }
}
