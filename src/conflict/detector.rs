//! Conflict detection.
//!
//! Runs every detection rule over the full assignment set and returns the
//! union, de-duplicated by [`ConflictKey`], with per-type counts. The
//! always-on rules cover every hard predicate, so a schedule with hard
//! violations always yields at least one `High` conflict.
//!
//! | Rule | Conflict type | Always on |
//! |------|---------------|-----------|
//! | teacher double booking | `teacher_time` | yes |
//! | classroom double booking | `classroom_time` | yes |
//! | capacity below enrollment cap | `classroom_capacity` | yes |
//! | unqualified teacher | `teacher_qualification` | yes |
//! | unusable classroom | `classroom_unavailable` | yes |
//! | inactive or unpublished course | `course_inactive` | yes |
//! | day or slot outside the catalog | `time_slot_inactive` | yes |
//! | same-day hours above ceiling | `teacher_workload` | yes |
//! | unavailable / disliked time | `time_preference` | optional |
//! | student in two courses at once | `student_course` | optional, needs enrollments |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::constraints::ConstraintManager;
use crate::models::{Assignment, Conflict, ConflictKey, ConflictType};

/// Which optional rules run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub check_preferences: bool,
    /// Runs only when enrollment data is present.
    pub check_student_overlap: bool,
    /// Preference scores below this produce a `time_preference` conflict.
    pub preference_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            check_preferences: true,
            check_student_overlap: true,
            preference_threshold: 0.2,
        }
    }
}

impl DetectorConfig {
    /// Only the always-on hard rules.
    pub fn hard_only() -> Self {
        Self {
            check_preferences: false,
            check_student_overlap: false,
            ..Self::default()
        }
    }

    pub fn with_preference_threshold(mut self, threshold: f64) -> Self {
        self.preference_threshold = threshold;
        self
    }
}

/// Detected conflicts with provenance counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub conflicts: Vec<Conflict>,
    pub counts_by_type: BTreeMap<ConflictType, usize>,
}

impl DetectionReport {
    pub fn total(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Conflicts of one type.
    pub fn of_type(&self, conflict_type: ConflictType) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(move |c| c.conflict_type() == conflict_type)
    }

    /// Number of conflicts of one type.
    pub fn count(&self, conflict_type: ConflictType) -> usize {
        self.counts_by_type.get(&conflict_type).copied().unwrap_or(0)
    }
}

/// Runs detection rules over a schedule.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    manager: Arc<ConstraintManager>,
    config: DetectorConfig,
}

impl ConflictDetector {
    pub fn new(manager: Arc<ConstraintManager>, config: DetectorConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects every conflict in the schedule.
    #[tracing::instrument(level = "debug", skip_all, fields(assignments = schedule.len()))]
    pub fn detect(&self, schedule: &[Assignment]) -> DetectionReport {
        let mut found = self.manager.find_conflicts(schedule);
        found.extend(self.capacity_conflicts(schedule));
        found.extend(self.qualification_conflicts(schedule));
        found.extend(self.catalog_conflicts(schedule));
        found.extend(self.workload_conflicts(schedule));
        if self.config.check_preferences {
            found.extend(self.preference_conflicts(schedule));
        }
        if self.config.check_student_overlap && !self.manager.data().enrollments().is_empty() {
            found.extend(self.student_conflicts(schedule));
        }

        let mut seen: BTreeSet<ConflictKey> = BTreeSet::new();
        let mut report = DetectionReport::default();
        for conflict in found {
            if seen.insert(conflict.conflict_key()) {
                *report
                    .counts_by_type
                    .entry(conflict.conflict_type())
                    .or_insert(0) += 1;
                report.conflicts.push(conflict);
            }
        }

        tracing::debug!(
            conflicts = report.total(),
            counts = ?report.counts_by_type,
            "conflict detection finished"
        );
        report
    }

    fn capacity_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let data = self.manager.data();
        schedule
            .iter()
            .filter(|a| !self.manager.hard().classroom_capacity_check(a))
            .filter_map(|a| {
                let cap = data.course(&a.course_id).map(|c| c.enrollment_cap);
                let seats = data.classroom(&a.classroom_id).map(|r| r.capacity);
                let description = match (cap, seats) {
                    (Some(cap), Some(seats)) => format!(
                        "Course {} needs {} seats but classroom {} has {}",
                        a.course_id, cap, a.classroom_id, seats
                    ),
                    _ => format!(
                        "Capacity of classroom {} for course {} is unknown",
                        a.classroom_id, a.course_id
                    ),
                };
                single(ConflictType::ClassroomCapacity, a, description)
            })
            .collect()
    }

    fn qualification_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        schedule
            .iter()
            .filter(|a| !self.manager.hard().teacher_qualification_check(a))
            .filter_map(|a| {
                single(
                    ConflictType::TeacherQualification,
                    a,
                    format!(
                        "Teacher {} is not qualified for course {}",
                        a.teacher_id, a.course_id
                    ),
                )
            })
            .collect()
    }

    /// Classroom availability, course activity and time-slot range.
    fn catalog_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let hard = self.manager.hard();
        let mut out = Vec::new();
        for a in schedule {
            if !hard.classroom_available_check(a) {
                out.extend(single(
                    ConflictType::ClassroomUnavailable,
                    a,
                    format!(
                        "Classroom {} is unknown, unavailable or inactive",
                        a.classroom_id
                    ),
                ));
            }
            if !hard.course_active_check(a) {
                out.extend(single(
                    ConflictType::CourseInactive,
                    a,
                    format!("Course {} is unknown, inactive or unpublished", a.course_id),
                ));
            }
            if !hard.time_slot_check(a) {
                out.extend(single(
                    ConflictType::TimeSlotInactive,
                    a,
                    format!(
                        "Day {} slot {} is outside the active time-slot catalog",
                        a.day(),
                        a.slot()
                    ),
                ));
            }
        }
        out
    }

    fn workload_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let hard = self.manager.hard();
        let per_session = hard.config().hours_per_session;

        let mut by_teacher_day: BTreeMap<(&str, u8), Vec<&Assignment>> = BTreeMap::new();
        for a in schedule {
            by_teacher_day
                .entry((a.teacher_id.as_str(), a.day()))
                .or_default()
                .push(a);
        }

        by_teacher_day
            .into_iter()
            .filter_map(|((teacher, day), group)| {
                let hours = group.len() as u32 * per_session;
                let ceiling = hard.daily_ceiling(teacher);
                if hours <= ceiling {
                    return None;
                }
                Conflict::with_default_severity(
                    ConflictType::TeacherWorkload,
                    group.into_iter().cloned().collect(),
                    format!(
                        "Teacher {teacher} teaches {hours} hours on day {day}, above the {ceiling}-hour ceiling"
                    ),
                )
                .ok()
            })
            .collect()
    }

    fn preference_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let data = self.manager.data();
        schedule
            .iter()
            .filter_map(|a| {
                let pref = data.preference(&a.teacher_id, a.day(), a.slot())?;
                let description = if !pref.is_available {
                    format!(
                        "Teacher {} is unavailable on day {} slot {}",
                        a.teacher_id,
                        a.day(),
                        a.slot()
                    )
                } else if pref.score < self.config.preference_threshold {
                    format!(
                        "Teacher {} dislikes day {} slot {} (preference {:.2})",
                        a.teacher_id,
                        a.day(),
                        a.slot(),
                        pref.score
                    )
                } else {
                    return None;
                };
                single(ConflictType::TimePreference, a, description)
            })
            .collect()
    }

    fn student_conflicts(&self, schedule: &[Assignment]) -> Vec<Conflict> {
        let mut by_course: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, a) in schedule.iter().enumerate() {
            by_course.entry(a.course_id.as_str()).or_default().push(i);
        }

        // (first position, second position) → affected students
        let mut overlaps: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for enrollment in self.manager.data().enrollments() {
            let sessions: Vec<usize> = enrollment
                .course_ids
                .iter()
                .filter_map(|c| by_course.get(c.as_str()))
                .flatten()
                .copied()
                .collect();
            for (n, &i) in sessions.iter().enumerate() {
                for &j in &sessions[n + 1..] {
                    let (x, y) = (&schedule[i], &schedule[j]);
                    if x.course_id != y.course_id && x.same_time(y) {
                        *overlaps.entry((i.min(j), i.max(j))).or_insert(0) += 1;
                    }
                }
            }
        }

        overlaps
            .into_iter()
            .filter_map(|((i, j), students)| {
                let (x, y) = (&schedule[i], &schedule[j]);
                Conflict::with_default_severity(
                    ConflictType::StudentCourse,
                    vec![x.clone(), y.clone()],
                    format!(
                        "{} student(s) enrolled in both {} and {} on day {} slot {}",
                        students,
                        x.course_id,
                        y.course_id,
                        x.day(),
                        x.slot()
                    ),
                )
                .ok()
            })
            .collect()
    }
}

fn single(conflict_type: ConflictType, a: &Assignment, description: String) -> Option<Conflict> {
    Conflict::with_default_severity(conflict_type, vec![a.clone()], description).ok()
}
