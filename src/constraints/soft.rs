//! Soft constraints: continuous quality scores in `[0, 1]`.
//!
//! Every score is independent and bounded. The weighted total uses
//! normalized weights, so it stays in `[0, 1]` for any non-negative
//! weight vector.
//!
//! # Scores
//!
//! | Score | Signal |
//! |-------|--------|
//! | preference | teacher's preference for the (day, slot) |
//! | workload | teacher's weekly hours vs. ideal load |
//! | distribution | even spacing of a course's sessions over the week |
//! | utilization | fill ratio in the 70–90% sweet spot |
//! | day balance | teacher's sessions spread over teaching days |
//! | consecutive | run of back-to-back sessions (≤2 free, then penalized) |
//! | type match | room type vs. course type |

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Assignment, ReferenceData};

/// Neutral score for lookups that have nothing to say.
const NEUTRAL: f64 = 0.5;

/// Weights of the individual soft scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftWeights {
    pub preference: f64,
    pub workload: f64,
    pub distribution: f64,
    pub utilization: f64,
    pub day_balance: f64,
    pub consecutive: f64,
    pub type_match: f64,
}

impl Default for SoftWeights {
    fn default() -> Self {
        Self {
            preference: 0.25,
            workload: 0.20,
            distribution: 0.15,
            utilization: 0.15,
            day_balance: 0.10,
            consecutive: 0.10,
            type_match: 0.05,
        }
    }
}

impl SoftWeights {
    /// Parses weights from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.preference
            + self.workload
            + self.distribution
            + self.utilization
            + self.day_balance
            + self.consecutive
            + self.type_match
    }

    /// Weights scaled to sum to 1 (negative weights count as 0).
    ///
    /// An all-zero vector falls back to the defaults.
    pub fn normalized(&self) -> Self {
        let clamped = Self {
            preference: self.preference.max(0.0),
            workload: self.workload.max(0.0),
            distribution: self.distribution.max(0.0),
            utilization: self.utilization.max(0.0),
            day_balance: self.day_balance.max(0.0),
            consecutive: self.consecutive.max(0.0),
            type_match: self.type_match.max(0.0),
        };
        let total = clamped.sum();
        if total <= f64::EPSILON {
            return Self::default();
        }
        Self {
            preference: clamped.preference / total,
            workload: clamped.workload / total,
            distribution: clamped.distribution / total,
            utilization: clamped.utilization / total,
            day_balance: clamped.day_balance / total,
            consecutive: clamped.consecutive / total,
            type_match: clamped.type_match / total,
        }
    }
}

/// Per-score breakdown for one assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftScores {
    pub preference: f64,
    pub workload: f64,
    pub distribution: f64,
    pub utilization: f64,
    pub day_balance: f64,
    pub consecutive: f64,
    pub type_match: f64,
}

impl SoftScores {
    /// Weighted sum with normalized weights.
    pub fn weighted_total(&self, weights: &SoftWeights) -> f64 {
        let w = weights.normalized();
        let total = self.preference * w.preference
            + self.workload * w.workload
            + self.distribution * w.distribution
            + self.utilization * w.utilization
            + self.day_balance * w.day_balance
            + self.consecutive * w.consecutive
            + self.type_match * w.type_match;
        total.clamp(0.0, 1.0)
    }
}

/// Soft-constraint scorer.
///
/// `schedule` arguments are the surrounding assignments; an entry equal
/// to the scored assignment is ignored so callers may pass a schedule
/// that already contains it.
#[derive(Clone)]
pub struct SoftConstraints {
    data: Arc<dyn ReferenceData>,
    weights: SoftWeights,
    hours_per_session: u32,
}

impl SoftConstraints {
    pub fn new(data: Arc<dyn ReferenceData>, weights: SoftWeights, hours_per_session: u32) -> Self {
        Self {
            data,
            weights,
            hours_per_session,
        }
    }

    /// Active weights (as configured, not normalized).
    pub fn weights(&self) -> &SoftWeights {
        &self.weights
    }

    /// Teacher preference for the time point.
    ///
    /// Unavailable → 0, no entry → 0.5.
    pub fn preference_score(&self, a: &Assignment) -> f64 {
        match self.data.preference(&a.teacher_id, a.day(), a.slot()) {
            Some(p) if !p.is_available => 0.0,
            Some(p) => p.score.clamp(0.0, 1.0),
            None => NEUTRAL,
        }
    }

    /// Closeness of the teacher's weekly hours to their ideal load.
    pub fn workload_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        let Some(teacher) = self.data.teacher(&a.teacher_id) else {
            return NEUTRAL;
        };
        let sessions = others(a, schedule)
            .filter(|o| o.teacher_id == a.teacher_id)
            .count() as f64
            + 1.0;
        let hours = sessions * self.hours_per_session as f64;
        let ideal = teacher.ideal_hours() as f64;
        let diff = (hours - ideal).abs();
        (1.0 - diff / ideal.max(hours)).clamp(0.0, 1.0)
    }

    /// Evenness of gaps between the course's sessions over the week.
    ///
    /// Scored as `1 / (1 + cv)` where `cv` is the coefficient of variation
    /// of consecutive gaps. One session scores 1.
    pub fn distribution_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        let slots_per_day = self.data.time_slots().slots.len().max(1);
        let mut points: Vec<usize> = others(a, schedule)
            .filter(|o| o.course_id == a.course_id)
            .chain(std::iter::once(a))
            .map(|o| (o.day() as usize - 1) * slots_per_day + o.slot() as usize)
            .collect();
        if points.len() < 2 {
            return 1.0;
        }
        points.sort_unstable();

        let gaps: Vec<f64> = points.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if mean <= f64::EPSILON {
            return 0.0;
        }
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
        let cv = variance.sqrt() / mean;
        (1.0 / (1.0 + cv)).clamp(0.0, 1.0)
    }

    /// Fill ratio score: 1 inside 70–90%, linear falloff outside.
    ///
    /// Below 70% the score is `ratio / 0.7`; above 90% it drops to 0 at 110%.
    pub fn utilization_score(&self, a: &Assignment) -> f64 {
        let (Some(course), Some(room)) =
            (self.data.course(&a.course_id), self.data.classroom(&a.classroom_id))
        else {
            return NEUTRAL;
        };
        if room.capacity == 0 {
            return 0.0;
        }
        let ratio = course.enrollment_cap as f64 / room.capacity as f64;
        utilization_curve(ratio)
    }

    /// How evenly the teacher's sessions spread over teaching days.
    ///
    /// 1 when the busiest day holds no more than the even share, 0 when
    /// every session lands on one day.
    pub fn day_balance_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        let days = &self.data.time_slots().days;
        if days.is_empty() {
            return NEUTRAL;
        }
        let mut counts = vec![0usize; days.len()];
        for o in others(a, schedule)
            .filter(|o| o.teacher_id == a.teacher_id)
            .chain(std::iter::once(a))
        {
            if let Ok(i) = days.binary_search(&o.day()) {
                counts[i] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        let even_share = total.div_ceil(days.len());
        let busiest = counts.iter().copied().max().unwrap_or(0);
        if total <= even_share {
            return 1.0;
        }
        let excess = busiest.saturating_sub(even_share) as f64;
        (1.0 - excess / (total - even_share) as f64).clamp(0.0, 1.0)
    }

    /// Penalty for long back-to-back runs of the teacher on that day.
    pub fn consecutive_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        let slots: BTreeSet<u8> = others(a, schedule)
            .filter(|o| o.teacher_id == a.teacher_id && o.day() == a.day())
            .map(|o| o.slot())
            .chain(std::iter::once(a.slot()))
            .collect();

        let mut run = 1usize;
        let mut s = a.slot();
        while s > 1 && slots.contains(&(s - 1)) {
            run += 1;
            s -= 1;
        }
        let mut s = a.slot();
        while slots.contains(&(s + 1)) {
            run += 1;
            s += 1;
        }
        consecutive_penalty(run)
    }

    /// Room type vs. course type affinity.
    ///
    /// Same type → 1.0, general-purpose room or untyped course → 0.7,
    /// mismatch → 0.3.
    pub fn type_match_score(&self, a: &Assignment) -> f64 {
        let (Some(course), Some(room)) =
            (self.data.course(&a.course_id), self.data.classroom(&a.classroom_id))
        else {
            return NEUTRAL;
        };
        let course_type = course.course_type.trim();
        let room_type = room.room_type.trim();
        if !course_type.is_empty() && course_type.eq_ignore_ascii_case(room_type) {
            1.0
        } else if course_type.is_empty()
            || room_type.is_empty()
            || room_type.eq_ignore_ascii_case("general")
        {
            0.7
        } else {
            0.3
        }
    }

    /// All scores for one assignment.
    pub fn scores(&self, a: &Assignment, schedule: &[Assignment]) -> SoftScores {
        SoftScores {
            preference: self.preference_score(a),
            workload: self.workload_score(a, schedule),
            distribution: self.distribution_score(a, schedule),
            utilization: self.utilization_score(a),
            day_balance: self.day_balance_score(a, schedule),
            consecutive: self.consecutive_score(a, schedule),
            type_match: self.type_match_score(a),
        }
    }

    /// Weighted total in `[0, 1]`.
    pub fn calculate_total_score(&self, a: &Assignment, schedule: &[Assignment]) -> f64 {
        self.scores(a, schedule).weighted_total(&self.weights)
    }
}

impl std::fmt::Debug for SoftConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftConstraints")
            .field("weights", &self.weights)
            .field("hours_per_session", &self.hours_per_session)
            .finish()
    }
}

fn others<'a>(a: &'a Assignment, schedule: &'a [Assignment]) -> impl Iterator<Item = &'a Assignment> {
    schedule.iter().filter(move |o| *o != a)
}

fn utilization_curve(ratio: f64) -> f64 {
    if ratio < 0.7 {
        (ratio / 0.7).clamp(0.0, 1.0)
    } else if ratio <= 0.9 {
        1.0
    } else {
        (1.0 - (ratio - 0.9) / 0.2).clamp(0.0, 1.0)
    }
}

fn consecutive_penalty(run: usize) -> f64 {
    match run {
        0..=2 => 1.0,
        3 => 0.7,
        4 => 0.4,
        _ => 0.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Classroom, Course, ReferenceCatalog, Teacher, TeacherPreference, TimeSlotCatalog,
    };

    fn soft() -> SoftConstraints {
        let data = ReferenceCatalog::new(
            vec![
                Course::new("C1", 80).with_type("lecture"),
                Course::new("C2", 20).with_type("lab"),
                Course::new("C3", 100),
            ],
            vec![Teacher::new("T1").with_ideal_weekly_hours(4)],
            vec![
                Classroom::new("R1", 100).with_type("lecture"),
                Classroom::new("LAB", 100).with_type("lab"),
                Classroom::new("GEN", 100),
            ],
            vec![
                TeacherPreference::new("T1", 1, 1, 0.9),
                TeacherPreference::unavailable("T1", 1, 2),
            ],
            TimeSlotCatalog::weekly(5, 6),
        );
        SoftConstraints::new(Arc::new(data), SoftWeights::default(), 2)
    }

    fn a(course: &str, room: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, "T1", room, day, slot).unwrap()
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((SoftWeights::default().sum() - 1.0).abs() < 1e-10);
        let n = SoftWeights {
            preference: 2.0,
            ..SoftWeights::default()
        }
        .normalized();
        assert!((n.sum() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_weights_from_json_partial() {
        let w = SoftWeights::from_json(r#"{"preference": 0.5}"#).unwrap();
        assert!((w.preference - 0.5).abs() < 1e-10);
        assert!((w.workload - 0.20).abs() < 1e-10);
        assert!(SoftWeights::from_json("not json").is_err());
    }

    #[test]
    fn test_preference_score() {
        let s = soft();
        assert!((s.preference_score(&a("C1", "R1", 1, 1)) - 0.9).abs() < 1e-10);
        assert_eq!(s.preference_score(&a("C1", "R1", 1, 2)), 0.0);
        assert_eq!(s.preference_score(&a("C1", "R1", 3, 3)), 0.5);
    }

    #[test]
    fn test_utilization_curve() {
        assert_eq!(utilization_curve(0.8), 1.0);
        assert_eq!(utilization_curve(0.7), 1.0);
        assert!((utilization_curve(0.35) - 0.5).abs() < 1e-10);
        assert!((utilization_curve(1.0) - 0.5).abs() < 1e-10);
        assert_eq!(utilization_curve(2.0), 0.0);

        let s = soft();
        assert_eq!(s.utilization_score(&a("C1", "R1", 1, 1)), 1.0);
        assert!(s.utilization_score(&a("C2", "R1", 1, 1)) < 0.5);
    }

    #[test]
    fn test_consecutive_penalty() {
        let s = soft();
        let day: Vec<_> = (1..=5).map(|slot| a("C1", "R1", 2, slot)).collect();
        assert_eq!(s.consecutive_score(&day[0], &day[..2]), 1.0);
        assert_eq!(s.consecutive_score(&day[2], &day[..3]), 0.7);
        assert_eq!(s.consecutive_score(&day[3], &day[..4]), 0.4);
        assert_eq!(s.consecutive_score(&day[4], &day), 0.1);
    }

    #[test]
    fn test_type_match() {
        let s = soft();
        assert_eq!(s.type_match_score(&a("C1", "R1", 1, 1)), 1.0);
        assert_eq!(s.type_match_score(&a("C1", "GEN", 1, 1)), 0.7);
        assert_eq!(s.type_match_score(&a("C3", "LAB", 1, 1)), 0.7);
        assert_eq!(s.type_match_score(&a("C2", "R1", 1, 1)), 0.3);
    }

    #[test]
    fn test_workload_toward_ideal() {
        let s = soft();
        let first = a("C1", "R1", 1, 1);
        let second = a("C2", "LAB", 2, 1);
        // Ideal 4 h: one session (2 h) → 0.5, two sessions (4 h) → 1.0.
        assert!((s.workload_score(&first, &[]) - 0.5).abs() < 1e-10);
        assert!((s.workload_score(&first, &[first.clone(), second]) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_day_balance() {
        let s = soft();
        let spread = vec![a("C1", "R1", 1, 1), a("C2", "LAB", 2, 1), a("C3", "GEN", 3, 1)];
        assert_eq!(s.day_balance_score(&spread[0], &spread), 1.0);
        let stacked = vec![a("C1", "R1", 1, 1), a("C2", "LAB", 1, 3), a("C3", "GEN", 1, 5)];
        assert_eq!(s.day_balance_score(&stacked[0], &stacked), 0.0);
    }

    #[test]
    fn test_distribution_even_vs_uneven() {
        let s = soft();
        let even = vec![a("C1", "R1", 1, 1), a("C1", "R1", 3, 1), a("C1", "R1", 5, 1)];
        let uneven = vec![a("C1", "R1", 1, 1), a("C1", "R1", 1, 2), a("C1", "R1", 5, 1)];
        assert_eq!(s.distribution_score(&even[0], &even), 1.0);
        assert!(s.distribution_score(&uneven[0], &uneven) < 1.0);
        assert_eq!(s.distribution_score(&even[0], &[]), 1.0);
    }

    #[test]
    fn test_scores_bounded() {
        let s = soft();
        let schedule: Vec<_> = (1..=6)
            .map(|slot| a(["C1", "C2", "C3"][slot as usize % 3], "R1", 1, slot))
            .collect();
        for x in &schedule {
            let total = s.calculate_total_score(x, &schedule);
            assert!((0.0..=1.0).contains(&total));
            let sc = s.scores(x, &schedule);
            for v in [
                sc.preference,
                sc.workload,
                sc.distribution,
                sc.utilization,
                sc.day_balance,
                sc.consecutive,
                sc.type_match,
            ] {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
