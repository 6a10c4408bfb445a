//! Priority context for course-ordering rules.

use std::collections::HashMap;

use crate::models::ReferenceData;

/// Precomputed per-course resource counts passed to priority rules.
///
/// Rules normalize against the maxima stored here so every built-in rule
/// scores in `[0, 1]` and weighted combinations stay balanced.
#[derive(Debug, Clone, Default)]
pub struct PriorityContext {
    /// Eligible teachers per course.
    pub eligible_teachers: HashMap<String, usize>,
    /// Fitting (usable, large enough) classrooms per course.
    pub fitting_classrooms: HashMap<String, usize>,
    /// Usable classrooms per room type.
    pub rooms_by_type: HashMap<String, usize>,
    /// Usable classrooms in total.
    pub usable_rooms: usize,
    /// Largest `teachers × classrooms` option count over all courses.
    pub max_options: usize,
    /// Largest enrollment cap over all courses.
    pub max_enrollment: u32,
}

impl PriorityContext {
    /// Builds the context from reference data.
    pub fn from_reference(data: &dyn ReferenceData) -> Self {
        let mut ctx = Self::default();

        for room in data.classrooms().iter().filter(|r| r.is_usable()) {
            ctx.usable_rooms += 1;
            *ctx
                .rooms_by_type
                .entry(room.room_type.to_ascii_lowercase())
                .or_insert(0) += 1;
        }

        for course in data.courses() {
            let teachers = data.eligible_teachers(&course.id).len();
            let rooms = data.fitting_classrooms(course).len();
            ctx.max_options = ctx.max_options.max(teachers * rooms);
            ctx.max_enrollment = ctx.max_enrollment.max(course.enrollment_cap);
            ctx.eligible_teachers.insert(course.id.clone(), teachers);
            ctx.fitting_classrooms.insert(course.id.clone(), rooms);
        }

        ctx
    }

    /// `teachers × classrooms` the course can be placed with.
    pub fn options(&self, course_id: &str) -> usize {
        let teachers = self.eligible_teachers.get(course_id).copied().unwrap_or(0);
        let rooms = self.fitting_classrooms.get(course_id).copied().unwrap_or(0);
        teachers * rooms
    }

    /// Usable rooms of a type (case-insensitive).
    pub fn rooms_of_type(&self, room_type: &str) -> usize {
        self.rooms_by_type
            .get(&room_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }
}
