//! Hard constraints: pass/fail admissibility rules.
//!
//! Each predicate is independently checkable. An assignment is admissible
//! against a set of committed assignments iff every predicate holds.
//!
//! | Rule | Needs committed set |
//! |------|---------------------|
//! | teacher not double-booked | yes |
//! | classroom not double-booked | yes |
//! | classroom capacity ≥ enrollment cap | no |
//! | teacher qualified for course | no |
//! | day/slot in the active catalog | no |
//! | classroom available and active | no |
//! | course active and published | no |
//! | teacher same-day hours ≤ daily ceiling | yes |

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{Assignment, ReferenceData};

/// Tunables for the hard rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardConstraintConfig {
    /// Teaching hours one session counts toward daily load.
    pub hours_per_session: u32,
    /// Overrides every teacher's `max_daily_hours` when set.
    pub daily_hours_ceiling: Option<u32>,
}

impl Default for HardConstraintConfig {
    fn default() -> Self {
        Self {
            hours_per_session: 2,
            daily_hours_ceiling: None,
        }
    }
}

impl HardConstraintConfig {
    /// Sets the hours a session counts for.
    pub fn with_hours_per_session(mut self, hours: u32) -> Self {
        self.hours_per_session = hours;
        self
    }

    /// Sets a global daily ceiling.
    pub fn with_daily_hours_ceiling(mut self, hours: u32) -> Self {
        self.daily_hours_ceiling = Some(hours);
        self
    }
}

/// Pass/fail admissibility rules.
#[derive(Clone)]
pub struct HardConstraints {
    data: Arc<dyn ReferenceData>,
    config: HardConstraintConfig,
}

impl HardConstraints {
    /// Creates the rule set over the given reference data.
    pub fn new(data: Arc<dyn ReferenceData>, config: HardConstraintConfig) -> Self {
        Self { data, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &HardConstraintConfig {
        &self.config
    }

    /// No committed assignment uses the same teacher at the same time.
    pub fn teacher_time_check(&self, a: &Assignment, existing: &[Assignment]) -> bool {
        teacher_free(a, existing.iter())
    }

    /// No committed assignment uses the same classroom at the same time.
    pub fn classroom_time_check(&self, a: &Assignment, existing: &[Assignment]) -> bool {
        classroom_free(a, existing.iter())
    }

    /// Classroom capacity covers the course's enrollment cap.
    ///
    /// Unknown course or classroom fails the check.
    pub fn classroom_capacity_check(&self, a: &Assignment) -> bool {
        match (self.data.course(&a.course_id), self.data.classroom(&a.classroom_id)) {
            (Some(course), Some(room)) => room.capacity >= course.enrollment_cap,
            _ => false,
        }
    }

    /// Teacher is qualified for the course.
    ///
    /// When no teacher at all lists the course, any known teacher passes.
    pub fn teacher_qualification_check(&self, a: &Assignment) -> bool {
        match self.data.teacher(&a.teacher_id) {
            Some(teacher) => {
                teacher.is_qualified_for(&a.course_id)
                    || self.data.qualified_teachers(&a.course_id).is_empty()
            }
            None => false,
        }
    }

    /// Day and slot are in the active time-slot catalog.
    pub fn time_slot_check(&self, a: &Assignment) -> bool {
        let catalog = self.data.time_slots();
        catalog.contains_day(a.day()) && catalog.contains_slot(a.slot())
    }

    /// Classroom exists and is available and active.
    pub fn classroom_available_check(&self, a: &Assignment) -> bool {
        self.data
            .classroom(&a.classroom_id)
            .is_some_and(|r| r.is_usable())
    }

    /// Course exists and is active and published.
    pub fn course_active_check(&self, a: &Assignment) -> bool {
        self.data
            .course(&a.course_id)
            .is_some_and(|c| c.is_schedulable())
    }

    /// Teacher's same-day load including `a` stays within the daily ceiling.
    pub fn teacher_workload_check(&self, a: &Assignment, existing: &[Assignment]) -> bool {
        self.workload_within(a, existing.iter())
    }

    /// Logical AND of all predicates.
    pub fn is_valid_assignment(&self, a: &Assignment, existing: &[Assignment]) -> bool {
        self.is_valid_against(a, existing.iter())
    }

    /// [`Self::is_valid_assignment`] over any re-iterable set of committed
    /// assignments (e.g. a schedule minus the checked position).
    pub fn is_valid_against<'a, I>(&self, a: &Assignment, others: I) -> bool
    where
        I: Iterator<Item = &'a Assignment> + Clone,
    {
        self.course_active_check(a)
            && self.time_slot_check(a)
            && self.classroom_available_check(a)
            && self.classroom_capacity_check(a)
            && self.teacher_qualification_check(a)
            && teacher_free(a, others.clone())
            && classroom_free(a, others.clone())
            && self.workload_within(a, others)
    }

    /// Checks position `index` of `schedule` against every other position.
    pub fn is_valid_in_schedule(&self, schedule: &[Assignment], index: usize) -> bool {
        match schedule.get(index) {
            Some(a) => self.is_valid_against(a, others_of(schedule, index)),
            None => false,
        }
    }

    /// Human-readable messages for every failed predicate.
    ///
    /// Diagnostics only; search code uses the boolean checks.
    pub fn get_violations(&self, a: &Assignment, existing: &[Assignment]) -> Vec<String> {
        self.violations_against(a, existing.iter())
    }

    /// [`Self::get_violations`] over any re-iterable committed set.
    pub fn violations_against<'a, I>(&self, a: &Assignment, others: I) -> Vec<String>
    where
        I: Iterator<Item = &'a Assignment> + Clone,
    {
        let mut messages = Vec::new();

        if !teacher_free(a, others.clone()) {
            messages.push(format!(
                "Teacher {} is already booked on day {} slot {}",
                a.teacher_id,
                a.day(),
                a.slot()
            ));
        }
        if !classroom_free(a, others.clone()) {
            messages.push(format!(
                "Classroom {} is already booked on day {} slot {}",
                a.classroom_id,
                a.day(),
                a.slot()
            ));
        }
        if !self.classroom_capacity_check(a) {
            let cap = self.data.course(&a.course_id).map(|c| c.enrollment_cap);
            let seats = self.data.classroom(&a.classroom_id).map(|r| r.capacity);
            messages.push(match (cap, seats) {
                (Some(cap), Some(seats)) => format!(
                    "Classroom {} capacity {} is below course {} enrollment cap {}",
                    a.classroom_id, seats, a.course_id, cap
                ),
                _ => format!(
                    "Capacity of classroom {} for course {} cannot be determined",
                    a.classroom_id, a.course_id
                ),
            });
        }
        if !self.teacher_qualification_check(a) {
            messages.push(format!(
                "Teacher {} is not qualified for course {}",
                a.teacher_id, a.course_id
            ));
        }
        if !self.time_slot_check(a) {
            messages.push(format!(
                "Day {} slot {} is not in the active time-slot catalog",
                a.day(),
                a.slot()
            ));
        }
        if !self.classroom_available_check(a) {
            messages.push(format!("Classroom {} is not available", a.classroom_id));
        }
        if !self.course_active_check(a) {
            messages.push(format!("Course {} is not active or not published", a.course_id));
        }
        if !self.workload_within(a, others) {
            messages.push(format!(
                "Teacher {} exceeds the daily ceiling of {} hours on day {}",
                a.teacher_id,
                self.daily_ceiling(&a.teacher_id),
                a.day()
            ));
        }

        messages
    }

    /// Number of positions in `schedule` failing against all other positions.
    pub fn count_invalid(&self, schedule: &[Assignment]) -> usize {
        (0..schedule.len())
            .filter(|&i| !self.is_valid_in_schedule(schedule, i))
            .count()
    }

    /// Daily hour ceiling for a teacher.
    pub fn daily_ceiling(&self, teacher_id: &str) -> u32 {
        self.config.daily_hours_ceiling.unwrap_or_else(|| {
            self.data
                .teacher(teacher_id)
                .map(|t| t.max_daily_hours)
                .unwrap_or(0)
        })
    }

    fn workload_within<'a, I>(&self, a: &Assignment, others: I) -> bool
    where
        I: Iterator<Item = &'a Assignment>,
    {
        let same_day = others
            .filter(|o| o.teacher_id == a.teacher_id && o.day() == a.day())
            .count() as u32;
        (same_day + 1) * self.config.hours_per_session <= self.daily_ceiling(&a.teacher_id)
    }
}

impl std::fmt::Debug for HardConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardConstraints")
            .field("config", &self.config)
            .finish()
    }
}

/// Every position of `schedule` except `index`.
pub fn others_of(
    schedule: &[Assignment],
    index: usize,
) -> impl Iterator<Item = &Assignment> + Clone {
    let split = index.min(schedule.len());
    let tail = if split < schedule.len() {
        &schedule[split + 1..]
    } else {
        &[]
    };
    schedule[..split].iter().chain(tail.iter())
}

fn teacher_free<'a>(a: &Assignment, mut others: impl Iterator<Item = &'a Assignment>) -> bool {
    !others.any(|o| o.teacher_id == a.teacher_id && o.same_time(a))
}

fn classroom_free<'a>(a: &Assignment, mut others: impl Iterator<Item = &'a Assignment>) -> bool {
    !others.any(|o| o.classroom_id == a.classroom_id && o.same_time(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};

    fn data() -> Arc<dyn ReferenceData> {
        Arc::new(ReferenceCatalog::new(
            vec![
                Course::new("C1", 50),
                Course::new("C2", 50),
                Course::new("BIG", 120),
                Course::new("OFF", 10).with_active(false),
            ],
            vec![
                Teacher::new("T1").with_qualifications(["C1", "C2", "BIG", "OFF"]),
                Teacher::new("T2").with_qualification("C2").with_max_daily_hours(4),
            ],
            vec![
                Classroom::new("R1", 100),
                Classroom::new("SMALL", 80),
                Classroom::new("CLOSED", 200).with_available(false),
            ],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        ))
    }

    fn hard() -> HardConstraints {
        HardConstraints::new(data(), HardConstraintConfig::default())
    }

    fn a(course: &str, teacher: &str, room: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, teacher, room, day, slot).unwrap()
    }

    #[test]
    fn test_valid_assignment() {
        let h = hard();
        assert!(h.is_valid_assignment(&a("C1", "T1", "R1", 1, 1), &[]));
        assert!(h.get_violations(&a("C1", "T1", "R1", 1, 1), &[]).is_empty());
    }

    #[test]
    fn test_teacher_double_booking() {
        let h = hard();
        let existing = vec![a("C1", "T1", "R1", 1, 1)];
        let b = a("C2", "T1", "SMALL", 1, 1);
        assert!(!h.teacher_time_check(&b, &existing));
        assert!(!h.is_valid_assignment(&b, &existing));
        assert!(h.teacher_time_check(&b.with_time(1, 2).unwrap(), &existing));
    }

    #[test]
    fn test_classroom_double_booking() {
        let h = hard();
        let existing = vec![a("C1", "T1", "R1", 2, 2)];
        let b = a("C2", "T2", "R1", 2, 2);
        assert!(!h.classroom_time_check(&b, &existing));
        assert!(!h.is_valid_assignment(&b, &existing));
    }

    #[test]
    fn test_capacity_violation() {
        let h = hard();
        let big = a("BIG", "T1", "SMALL", 1, 1);
        assert!(!h.classroom_capacity_check(&big));
        let violations = h.get_violations(&big, &[]);
        assert!(violations.iter().any(|v| v.contains("capacity")));
    }

    #[test]
    fn test_qualification() {
        let h = hard();
        assert!(!h.teacher_qualification_check(&a("C1", "T2", "R1", 1, 1)));
        assert!(h.teacher_qualification_check(&a("C2", "T2", "R1", 1, 1)));
        assert!(!h.teacher_qualification_check(&a("C1", "NOBODY", "R1", 1, 1)));
    }

    #[test]
    fn test_catalog_availability_and_activity() {
        let h = hard();
        assert!(!h.time_slot_check(&a("C1", "T1", "R1", 6, 1)));
        assert!(!h.time_slot_check(&a("C1", "T1", "R1", 1, 5)));
        assert!(!h.classroom_available_check(&a("C1", "T1", "CLOSED", 1, 1)));
        assert!(!h.course_active_check(&a("OFF", "T1", "R1", 1, 1)));
    }

    #[test]
    fn test_daily_workload() {
        let h = hard();
        // T2: 4 hours/day, 2 hours/session → two sessions per day.
        let existing = vec![a("C2", "T2", "R1", 3, 1), a("C2", "T2", "R1", 3, 2)];
        let third = a("C2", "T2", "R1", 3, 3);
        assert!(!h.teacher_workload_check(&third, &existing));
        assert!(h.teacher_workload_check(&third.with_time(4, 3).unwrap(), &existing));
        assert!(h
            .get_violations(&third, &existing)
            .iter()
            .any(|v| v.contains("daily ceiling")));
    }

    #[test]
    fn test_is_valid_in_schedule_excludes_self() {
        let h = hard();
        let schedule = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T2", "SMALL", 1, 2)];
        assert!(h.is_valid_in_schedule(&schedule, 0));
        assert!(h.is_valid_in_schedule(&schedule, 1));
        assert!(!h.is_valid_in_schedule(&schedule, 5));
        assert_eq!(h.count_invalid(&schedule), 0);

        let clash = vec![a("C1", "T1", "R1", 1, 1), a("C2", "T1", "SMALL", 1, 1)];
        assert_eq!(h.count_invalid(&clash), 2);
    }

    #[test]
    fn test_others_of() {
        let schedule = vec![
            a("C1", "T1", "R1", 1, 1),
            a("C2", "T1", "R1", 1, 2),
            a("C3", "T1", "R1", 1, 3),
        ];
        let ids: Vec<_> = others_of(&schedule, 1).map(|x| x.course_id.clone()).collect();
        assert_eq!(ids, vec!["C1", "C3"]);
        assert_eq!(others_of(&schedule, 9).count(), 3);
    }
}
