//! Rule engine for multi-criteria course ordering.
//!
//! Composes several priority rules with a sequential (lexicographic) or
//! weighted evaluation mode and a final tie-breaker.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::{PriorityContext, PriorityRule, RuleScore};
use crate::models::Course;

/// How the rules combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Lexicographic: a later rule only decides when earlier ones tie.
    #[default]
    Sequential,
    /// Lowest weighted sum first.
    Weighted,
}

/// Final decision once every rule ties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreaker {
    /// Leave the tie (stable sort keeps supply order).
    #[default]
    NextRule,
    /// Lexicographic course id.
    ById,
}

/// A rule and its weight in the engine.
#[derive(Clone)]
struct Slot {
    rule: Arc<dyn PriorityRule>,
    weight: f64,
}

/// Orders courses by a chain of priority rules.
///
/// Scores are computed once per (course, rule) before sorting.
///
/// # Example
/// ```
/// use u_timetable::dispatching::{rules, EvaluationMode, RuleEngine};
///
/// let hybrid = RuleEngine::new()
///     .with_mode(EvaluationMode::Weighted)
///     .with_weighted_rule(rules::ByScarcity, 0.4)
///     .with_weighted_rule(rules::ByDifficulty, 0.3)
///     .with_weighted_rule(rules::ByEnrollment, 0.2)
///     .with_weighted_rule(rules::ByCourseType, 0.1);
/// assert_eq!(hybrid.rule_count(), 4);
/// ```
#[derive(Clone, Default)]
pub struct RuleEngine {
    slots: Vec<Slot>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
}

/// Scores closer than this count as equal in sequential mode.
const SCORE_EPSILON: f64 = 1e-9;

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn push<R: PriorityRule + 'static>(mut self, rule: R, weight: f64) -> Self {
        self.slots.push(Slot {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Adds a rule with weight 1.
    pub fn with_rule<R: PriorityRule + 'static>(self, rule: R) -> Self {
        self.push(rule, 1.0)
    }

    /// Adds a rule with an explicit weight (weighted mode).
    pub fn with_weighted_rule<R: PriorityRule + 'static>(self, rule: R, weight: f64) -> Self {
        self.push(rule, weight)
    }

    /// Adds a rule consulted only on ties in sequential mode; it carries
    /// no weight in weighted mode.
    pub fn with_tie_breaker<R: PriorityRule + 'static>(self, rule: R) -> Self {
        self.push(rule, 0.0)
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets what decides once every rule ties.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Number of rules, tie-breakers included.
    pub fn rule_count(&self) -> usize {
        self.slots.len()
    }

    /// Raw score of every rule for every course, course-major.
    fn score_table(&self, courses: &[Course], context: &PriorityContext) -> Vec<Vec<RuleScore>> {
        courses
            .iter()
            .map(|c| self.slots.iter().map(|s| s.rule.evaluate(c, context)).collect())
            .collect()
    }

    /// Course indices in placement order (highest priority first).
    ///
    /// The sort is stable: courses tied on every criterion keep their
    /// supply order.
    pub fn sort_indices(&self, courses: &[Course], context: &PriorityContext) -> Vec<usize> {
        let table = self.score_table(courses, context);
        let mut order: Vec<usize> = (0..courses.len()).collect();

        match self.mode {
            EvaluationMode::Sequential => order.sort_by(|&a, &b| {
                table[a]
                    .iter()
                    .zip(&table[b])
                    .find(|(x, y)| (*x - *y).abs() > SCORE_EPSILON)
                    .map_or(Ordering::Equal, |(x, y)| x.total_cmp(y))
                    .then_with(|| self.final_tie(&courses[a], &courses[b]))
            }),
            EvaluationMode::Weighted => {
                let totals: Vec<f64> = table
                    .iter()
                    .map(|row| {
                        row.iter()
                            .zip(&self.slots)
                            .map(|(score, slot)| score * slot.weight)
                            .sum()
                    })
                    .collect();
                order.sort_by(|&a, &b| {
                    totals[a]
                        .total_cmp(&totals[b])
                        .then_with(|| self.final_tie(&courses[a], &courses[b]))
                });
            }
        }
        order
    }

    /// Index of the course placed first.
    pub fn select_best(&self, courses: &[Course], context: &PriorityContext) -> Option<usize> {
        self.sort_indices(courses, context).into_iter().next()
    }

    /// Weighted score of each rule for one course.
    pub fn evaluate(&self, course: &Course, context: &PriorityContext) -> Vec<RuleScore> {
        self.slots
            .iter()
            .map(|s| s.rule.evaluate(course, context) * s.weight)
            .collect()
    }

    fn final_tie(&self, a: &Course, b: &Course) -> Ordering {
        match self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.id.cmp(&b.id),
        }
    }
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{}×{}", s.rule.name(), s.weight))
            .collect();
        f.debug_struct("RuleEngine")
            .field("rules", &rules)
            .field("mode", &self.mode)
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::rules;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};

    fn courses() -> Vec<Course> {
        vec![
            Course::new("easy", 20).with_difficulty(0.2),
            Course::new("hard", 20).with_difficulty(0.9),
            Course::new("big", 90).with_difficulty(0.2),
        ]
    }

    fn context(courses: &[Course]) -> PriorityContext {
        let data = ReferenceCatalog::new(
            courses.to_vec(),
            vec![Teacher::new("T1"), Teacher::new("T2")],
            vec![Classroom::new("R1", 30), Classroom::new("R2", 100)],
            vec![],
            TimeSlotCatalog::default(),
        );
        PriorityContext::from_reference(&data)
    }

    #[test]
    fn test_difficulty_ordering() {
        let cs = courses();
        let ctx = context(&cs);
        let engine = RuleEngine::new()
            .with_rule(rules::ByDifficulty)
            .with_final_tie_breaker(TieBreaker::ById);

        let indices = engine.sort_indices(&cs, &ctx);
        assert_eq!(cs[indices[0]].id, "hard");
        // easy and big tie on difficulty → ById
        assert_eq!(cs[indices[1]].id, "big");
        assert_eq!(cs[indices[2]].id, "easy");
    }

    #[test]
    fn test_sequential_with_tie_breaker() {
        let cs = courses();
        let ctx = context(&cs);
        let engine = RuleEngine::new()
            .with_rule(rules::ByDifficulty)
            .with_tie_breaker(rules::ByScarcity);

        let indices = engine.sort_indices(&cs, &ctx);
        // easy/big tie on difficulty; big fits only R2 → scarcer → first
        assert_eq!(cs[indices[1]].id, "big");
    }

    #[test]
    fn test_weighted_mode() {
        let cs = courses();
        let ctx = context(&cs);
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_weighted_rule(rules::ByEnrollment, 0.9)
            .with_weighted_rule(rules::ByDifficulty, 0.1);

        assert_eq!(cs[engine.select_best(&cs, &ctx).unwrap()].id, "big");
    }

    #[test]
    fn test_empty_courses() {
        let ctx = PriorityContext::default();
        let engine = RuleEngine::new().with_rule(rules::ByDifficulty);
        assert!(engine.sort_indices(&[], &ctx).is_empty());
        assert!(engine.select_best(&[], &ctx).is_none());
    }

    #[test]
    fn test_evaluate_scores() {
        let cs = courses();
        let ctx = context(&cs);
        let engine = RuleEngine::new()
            .with_rule(rules::ByDifficulty)
            .with_weighted_rule(rules::ByEnrollment, 0.5);

        let scores = engine.evaluate(&cs[2], &ctx);
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 0.8).abs() < 1e-10);
        assert!((scores[1] - 0.0).abs() < 1e-10);
        assert_eq!(engine.rule_count(), 2);
    }
}
