//! Read-only reference-data repository.
//!
//! Every rule looks records up through [`ReferenceData`]. The host system
//! implements it once against its own storage; [`ReferenceCatalog`] is
//! the in-memory implementation the engine snapshots at initialization.

use std::collections::HashMap;

use super::{Classroom, Course, Enrollment, Teacher, TeacherPreference, TimeSlotCatalog};

/// Lookup interface over courses, teachers, classrooms and preferences.
pub trait ReferenceData: Send + Sync {
    /// All courses, in supply order.
    fn courses(&self) -> &[Course];
    /// All teachers, in supply order.
    fn teachers(&self) -> &[Teacher];
    /// All classrooms, in supply order.
    fn classrooms(&self) -> &[Classroom];
    /// Active days and slots.
    fn time_slots(&self) -> &TimeSlotCatalog;
    /// Student enrollments (may be empty).
    fn enrollments(&self) -> &[Enrollment];

    fn course(&self, id: &str) -> Option<&Course>;
    fn teacher(&self, id: &str) -> Option<&Teacher>;
    fn classroom(&self, id: &str) -> Option<&Classroom>;
    /// Preference entry for a teacher at a time point, if one was supplied.
    fn preference(&self, teacher_id: &str, day: u8, slot: u8) -> Option<&TeacherPreference>;

    /// Teachers listing the course among their qualifications.
    fn qualified_teachers(&self, course_id: &str) -> Vec<&Teacher> {
        self.teachers()
            .iter()
            .filter(|t| t.is_qualified_for(course_id))
            .collect()
    }

    /// Teachers that may teach the course: the qualified ones, or every
    /// teacher when nobody is formally qualified.
    fn eligible_teachers(&self, course_id: &str) -> Vec<&Teacher> {
        let qualified = self.qualified_teachers(course_id);
        if qualified.is_empty() {
            self.teachers().iter().collect()
        } else {
            qualified
        }
    }

    /// Usable classrooms whose capacity covers the course's enrollment cap.
    fn fitting_classrooms(&self, course: &Course) -> Vec<&Classroom> {
        self.classrooms()
            .iter()
            .filter(|r| r.is_usable() && r.capacity >= course.enrollment_cap)
            .collect()
    }
}

/// In-memory [`ReferenceData`] with id-indexed lookup maps.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    courses: Vec<Course>,
    teachers: Vec<Teacher>,
    classrooms: Vec<Classroom>,
    preferences: Vec<TeacherPreference>,
    enrollments: Vec<Enrollment>,
    time_slots: TimeSlotCatalog,
    course_index: HashMap<String, usize>,
    teacher_index: HashMap<String, usize>,
    classroom_index: HashMap<String, usize>,
    preference_index: HashMap<(String, u8, u8), usize>,
}

impl ReferenceCatalog {
    /// Builds a catalog and its lookup maps.
    ///
    /// Later duplicates shadow earlier ones in lookups; duplicates are
    /// reported by [`crate::validation::validate_reference_data`].
    pub fn new(
        courses: Vec<Course>,
        teachers: Vec<Teacher>,
        classrooms: Vec<Classroom>,
        preferences: Vec<TeacherPreference>,
        time_slots: TimeSlotCatalog,
    ) -> Self {
        let course_index = courses
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let teacher_index = teachers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        let classroom_index = classrooms
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let preference_index = preferences
            .iter()
            .enumerate()
            .map(|(i, p)| ((p.teacher_id.clone(), p.day, p.slot), i))
            .collect();

        Self {
            courses,
            teachers,
            classrooms,
            preferences,
            enrollments: Vec::new(),
            time_slots,
            course_index,
            teacher_index,
            classroom_index,
            preference_index,
        }
    }

    /// Attaches student enrollments.
    pub fn with_enrollments(mut self, enrollments: Vec<Enrollment>) -> Self {
        self.enrollments = enrollments;
        self
    }

    /// All supplied preferences.
    pub fn preferences(&self) -> &[TeacherPreference] {
        &self.preferences
    }
}

impl ReferenceData for ReferenceCatalog {
    fn courses(&self) -> &[Course] {
        &self.courses
    }

    fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    fn classrooms(&self) -> &[Classroom] {
        &self.classrooms
    }

    fn time_slots(&self) -> &TimeSlotCatalog {
        &self.time_slots
    }

    fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    fn course(&self, id: &str) -> Option<&Course> {
        self.course_index.get(id).map(|&i| &self.courses[i])
    }

    fn teacher(&self, id: &str) -> Option<&Teacher> {
        self.teacher_index.get(id).map(|&i| &self.teachers[i])
    }

    fn classroom(&self, id: &str) -> Option<&Classroom> {
        self.classroom_index.get(id).map(|&i| &self.classrooms[i])
    }

    fn preference(&self, teacher_id: &str, day: u8, slot: u8) -> Option<&TeacherPreference> {
        self.preference_index
            .get(&(teacher_id.to_string(), day, slot))
            .map(|&i| &self.preferences[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(
            vec![Course::new("C1", 30), Course::new("C2", 80)],
            vec![
                Teacher::new("T1").with_qualification("C1"),
                Teacher::new("T2"),
            ],
            vec![Classroom::new("R1", 50), Classroom::new("R2", 100).with_available(false)],
            vec![TeacherPreference::new("T1", 1, 2, 0.9)],
            TimeSlotCatalog::weekly(5, 4),
        )
    }

    #[test]
    fn test_lookups() {
        let cat = catalog();
        assert_eq!(cat.course("C2").unwrap().enrollment_cap, 80);
        assert!(cat.course("C9").is_none());
        assert_eq!(cat.teacher("T1").unwrap().id, "T1");
        assert_eq!(cat.classroom("R2").unwrap().capacity, 100);
        assert!((cat.preference("T1", 1, 2).unwrap().score - 0.9).abs() < 1e-10);
        assert!(cat.preference("T1", 1, 3).is_none());
    }

    #[test]
    fn test_eligible_teachers_fallback() {
        let cat = catalog();
        let c1: Vec<_> = cat.eligible_teachers("C1").iter().map(|t| t.id.clone()).collect();
        assert_eq!(c1, vec!["T1"]);
        // Nobody is qualified for C2 → every teacher is eligible.
        assert_eq!(cat.eligible_teachers("C2").len(), 2);
    }

    #[test]
    fn test_fitting_classrooms() {
        let cat = catalog();
        let c2 = cat.course("C2").unwrap().clone();
        // R2 is large enough but unavailable.
        assert!(cat.fitting_classrooms(&c2).is_empty());
        let c1 = cat.course("C1").unwrap().clone();
        assert_eq!(cat.fitting_classrooms(&c1).len(), 1);
    }
}
