//! Built-in course priority rules.
//!
//! | Rule | Places first |
//! |------|--------------|
//! | `ByDifficulty` | harder courses |
//! | `ByScarcity` | courses with the fewest teacher × classroom options |
//! | `ByEnrollment` | larger courses (they need the big rooms) |
//! | `ByCourseType` | courses whose room type is rare |
//!
//! # Score Convention
//! All rules return lower scores for higher priority courses, in `[0, 1]`.

use super::{PriorityContext, PriorityRule, RuleScore};
use crate::models::Course;

/// Harder courses first.
#[derive(Debug, Clone, Copy)]
pub struct ByDifficulty;

impl PriorityRule for ByDifficulty {
    fn name(&self) -> &'static str {
        "DIFFICULTY"
    }

    fn evaluate(&self, course: &Course, _context: &PriorityContext) -> RuleScore {
        1.0 - course.difficulty.clamp(0.0, 1.0)
    }

    fn description(&self) -> &'static str {
        "Highest difficulty first"
    }
}

/// Fewest placement options first.
///
/// Options are `eligible teachers × fitting classrooms`. A course with
/// no options at all scores 0 so its failure is reported early.
#[derive(Debug, Clone, Copy)]
pub struct ByScarcity;

impl PriorityRule for ByScarcity {
    fn name(&self) -> &'static str {
        "SCARCITY"
    }

    fn evaluate(&self, course: &Course, context: &PriorityContext) -> RuleScore {
        if context.max_options == 0 {
            return 0.0;
        }
        context.options(&course.id) as f64 / context.max_options as f64
    }

    fn description(&self) -> &'static str {
        "Most constrained course first"
    }
}

/// Largest enrollment cap first.
#[derive(Debug, Clone, Copy)]
pub struct ByEnrollment;

impl PriorityRule for ByEnrollment {
    fn name(&self) -> &'static str {
        "ENROLLMENT"
    }

    fn evaluate(&self, course: &Course, context: &PriorityContext) -> RuleScore {
        if context.max_enrollment == 0 {
            return 0.0;
        }
        1.0 - (course.enrollment_cap as f64 / context.max_enrollment as f64).min(1.0)
    }

    fn description(&self) -> &'static str {
        "Largest enrollment first"
    }
}

/// Courses whose room type is rarest first.
///
/// Untyped courses can use any room and go last.
#[derive(Debug, Clone, Copy)]
pub struct ByCourseType;

impl PriorityRule for ByCourseType {
    fn name(&self) -> &'static str {
        "COURSE_TYPE"
    }

    fn evaluate(&self, course: &Course, context: &PriorityContext) -> RuleScore {
        let course_type = course.course_type.trim();
        if course_type.is_empty() || context.usable_rooms == 0 {
            return 1.0;
        }
        context.rooms_of_type(course_type) as f64 / context.usable_rooms as f64
    }

    fn description(&self) -> &'static str {
        "Rarest room type first"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, ReferenceCatalog, Teacher, TimeSlotCatalog};

    fn context() -> PriorityContext {
        let data = ReferenceCatalog::new(
            vec![
                Course::new("lab", 20).with_type("lab"),
                Course::new("lecture", 60).with_type("lecture"),
                Course::new("seminar", 10),
            ],
            vec![
                Teacher::new("T1").with_qualification("lab"),
                Teacher::new("T2"),
            ],
            vec![
                Classroom::new("L1", 25).with_type("lab"),
                Classroom::new("H1", 80).with_type("lecture"),
                Classroom::new("H2", 80).with_type("lecture"),
                Classroom::new("X", 200).with_type("lecture").with_available(false),
            ],
            vec![],
            TimeSlotCatalog::default(),
        );
        PriorityContext::from_reference(&data)
    }

    #[test]
    fn test_context_counts() {
        let ctx = context();
        assert_eq!(ctx.usable_rooms, 3);
        assert_eq!(ctx.rooms_of_type("LAB"), 1);
        assert_eq!(ctx.eligible_teachers["lab"], 1);
        assert_eq!(ctx.eligible_teachers["lecture"], 2);
        assert_eq!(ctx.fitting_classrooms["lecture"], 2);
        assert_eq!(ctx.max_enrollment, 60);
    }

    #[test]
    fn test_difficulty() {
        let ctx = PriorityContext::default();
        let hard = Course::new("a", 10).with_difficulty(0.9);
        let easy = Course::new("b", 10).with_difficulty(0.1);
        assert!(ByDifficulty.evaluate(&hard, &ctx) < ByDifficulty.evaluate(&easy, &ctx));
    }

    #[test]
    fn test_scarcity() {
        let ctx = context();
        // lab: 1 teacher × 3 rooms; seminar: 2 × 3.
        let lab = Course::new("lab", 20);
        let seminar = Course::new("seminar", 10);
        assert!(ByScarcity.evaluate(&lab, &ctx) < ByScarcity.evaluate(&seminar, &ctx));
        assert_eq!(ByScarcity.evaluate(&Course::new("unknown", 1), &ctx), 0.0);
    }

    #[test]
    fn test_enrollment() {
        let ctx = context();
        let big = Course::new("lecture", 60);
        let small = Course::new("seminar", 10);
        assert_eq!(ByEnrollment.evaluate(&big, &ctx), 0.0);
        assert!(ByEnrollment.evaluate(&big, &ctx) < ByEnrollment.evaluate(&small, &ctx));
    }

    #[test]
    fn test_course_type() {
        let ctx = context();
        let lab = Course::new("lab", 20).with_type("lab");
        let lecture = Course::new("lecture", 60).with_type("lecture");
        let untyped = Course::new("seminar", 10);
        assert!(ByCourseType.evaluate(&lab, &ctx) < ByCourseType.evaluate(&lecture, &ctx));
        assert_eq!(ByCourseType.evaluate(&untyped, &ctx), 1.0);
    }
}
