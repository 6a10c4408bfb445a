//! Assignment model.
//!
//! An assignment is one scheduled session: a course taught by a teacher
//! in a classroom at a (day, slot) time point. Day and slot are bounded
//! at construction, so every assignment that exists is in range.
//!
//! Assignments are values. Search algorithms derive new ones through the
//! `with_*` methods instead of mutating shared copies.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Smallest valid day-of-week.
pub const MIN_DAY: u8 = 1;
/// Largest valid day-of-week.
pub const MAX_DAY: u8 = 7;
/// Smallest valid time-slot number.
pub const MIN_SLOT: u8 = 1;
/// Largest valid time-slot number.
pub const MAX_SLOT: u8 = 20;

/// A (day, slot) time point.
pub type TimeKey = (u8, u8);

/// A scheduled session (course → teacher × classroom × day × slot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AssignmentRepr")]
pub struct Assignment {
    /// Scheduled course.
    pub course_id: String,
    /// Teaching staff member.
    pub teacher_id: String,
    /// Room hosting the session.
    pub classroom_id: String,
    day: u8,
    slot: u8,
    /// Administrative term tag (e.g. "fall").
    pub term: String,
    /// Administrative academic-year tag (e.g. "2025-2026").
    pub academic_year: String,
    /// Week range the session runs in (e.g. "1-16").
    pub weeks: String,
}

/// Unchecked wire shape; converted through [`Assignment::new`] so
/// deserialized assignments obey the same range invariant.
#[derive(Deserialize)]
struct AssignmentRepr {
    course_id: String,
    teacher_id: String,
    classroom_id: String,
    day: u8,
    slot: u8,
    #[serde(default)]
    term: String,
    #[serde(default)]
    academic_year: String,
    #[serde(default)]
    weeks: String,
}

impl TryFrom<AssignmentRepr> for Assignment {
    type Error = ScheduleError;

    fn try_from(repr: AssignmentRepr) -> Result<Self> {
        Ok(Assignment::new(
            repr.course_id,
            repr.teacher_id,
            repr.classroom_id,
            repr.day,
            repr.slot,
        )?
        .with_term(repr.term)
        .with_academic_year(repr.academic_year)
        .with_weeks(repr.weeks))
    }
}

/// Checks a (day, slot) pair against the valid ranges.
pub fn check_time(day: u8, slot: u8) -> Result<()> {
    if !(MIN_DAY..=MAX_DAY).contains(&day) {
        return Err(ScheduleError::InvalidDay(day));
    }
    if !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
        return Err(ScheduleError::InvalidSlot(slot));
    }
    Ok(())
}

impl Assignment {
    /// Creates an assignment.
    ///
    /// # Errors
    /// [`ScheduleError::InvalidDay`] / [`ScheduleError::InvalidSlot`] when
    /// `day` is outside `1..=7` or `slot` outside `1..=20`.
    pub fn new(
        course_id: impl Into<String>,
        teacher_id: impl Into<String>,
        classroom_id: impl Into<String>,
        day: u8,
        slot: u8,
    ) -> Result<Self> {
        check_time(day, slot)?;
        Ok(Self {
            course_id: course_id.into(),
            teacher_id: teacher_id.into(),
            classroom_id: classroom_id.into(),
            day,
            slot,
            term: String::new(),
            academic_year: String::new(),
            weeks: String::new(),
        })
    }

    /// Day of week (1..=7).
    #[inline]
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Time-slot number (1..=20).
    #[inline]
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// `(day, slot)`.
    #[inline]
    pub fn time_key(&self) -> TimeKey {
        (self.day, self.slot)
    }

    /// `(teacher, day, slot)`.
    pub fn teacher_time_key(&self) -> (&str, u8, u8) {
        (&self.teacher_id, self.day, self.slot)
    }

    /// `(classroom, day, slot)`.
    pub fn classroom_time_key(&self) -> (&str, u8, u8) {
        (&self.classroom_id, self.day, self.slot)
    }

    /// Same session moved to another time point.
    pub fn with_time(&self, day: u8, slot: u8) -> Result<Self> {
        check_time(day, slot)?;
        Ok(Self {
            day,
            slot,
            ..self.clone()
        })
    }

    /// Same session with another teacher.
    pub fn with_teacher(&self, teacher_id: impl Into<String>) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            ..self.clone()
        }
    }

    /// Same session in another classroom.
    pub fn with_classroom(&self, classroom_id: impl Into<String>) -> Self {
        Self {
            classroom_id: classroom_id.into(),
            ..self.clone()
        }
    }

    /// Sets the term tag.
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Sets the academic-year tag.
    pub fn with_academic_year(mut self, academic_year: impl Into<String>) -> Self {
        self.academic_year = academic_year.into();
        self
    }

    /// Sets the week-range tag.
    pub fn with_weeks(mut self, weeks: impl Into<String>) -> Self {
        self.weeks = weeks.into();
        self
    }

    /// Whether two assignments occupy the same time point.
    #[inline]
    pub fn same_time(&self, other: &Assignment) -> bool {
        self.day == other.day && self.slot == other.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_in_range() {
        let a = Assignment::new("C1", "T1", "R1", 1, 20).unwrap();
        assert_eq!(a.day(), 1);
        assert_eq!(a.slot(), 20);
        assert_eq!(a.time_key(), (1, 20));
        assert_eq!(a.teacher_time_key(), ("T1", 1, 20));
        assert_eq!(a.classroom_time_key(), ("R1", 1, 20));
    }

    #[test]
    fn test_assignment_out_of_range() {
        assert!(matches!(
            Assignment::new("C1", "T1", "R1", 0, 1),
            Err(ScheduleError::InvalidDay(0))
        ));
        assert!(matches!(
            Assignment::new("C1", "T1", "R1", 8, 1),
            Err(ScheduleError::InvalidDay(8))
        ));
        assert!(matches!(
            Assignment::new("C1", "T1", "R1", 3, 0),
            Err(ScheduleError::InvalidSlot(0))
        ));
        assert!(matches!(
            Assignment::new("C1", "T1", "R1", 3, 21),
            Err(ScheduleError::InvalidSlot(21))
        ));
    }

    #[test]
    fn test_with_time_copies() {
        let a = Assignment::new("C1", "T1", "R1", 2, 3).unwrap().with_term("fall");
        let b = a.with_time(4, 5).unwrap();
        assert_eq!(a.time_key(), (2, 3));
        assert_eq!(b.time_key(), (4, 5));
        assert_eq!(b.term, "fall");
        assert!(a.with_time(4, 25).is_err());
    }

    #[test]
    fn test_with_teacher_and_classroom() {
        let a = Assignment::new("C1", "T1", "R1", 2, 3).unwrap();
        assert_eq!(a.with_teacher("T2").teacher_id, "T2");
        assert_eq!(a.with_classroom("R9").classroom_id, "R9");
        assert_eq!(a.teacher_id, "T1");
    }

    #[test]
    fn test_deserialize_validates_range() {
        let ok = r#"{"course_id":"C1","teacher_id":"T1","classroom_id":"R1","day":2,"slot":3}"#;
        let a: Assignment = serde_json::from_str(ok).unwrap();
        assert_eq!(a.time_key(), (2, 3));

        let bad = r#"{"course_id":"C1","teacher_id":"T1","classroom_id":"R1","day":9,"slot":3}"#;
        assert!(serde_json::from_str::<Assignment>(bad).is_err());
    }
}
