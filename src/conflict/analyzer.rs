//! Conflict analysis.
//!
//! Read-only aggregation over detected conflicts: frequencies, recurring
//! signatures, cascades, time clusters, hotspots, and remediation
//! suggestions. Never touches the schedule.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Conflict, ConflictType, Severity};

/// Conflicts sharing a time point at or above this count form a cluster.
const CLUSTER_THRESHOLD: usize = 3;

/// The same resource and time point implicated more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPattern {
    /// `teacher:<id>` or `classroom:<id>`.
    pub resource: String,
    pub day: u8,
    pub slot: u8,
    pub occurrences: usize,
}

/// One resource implicated in several conflict types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    pub resource: String,
    pub conflict_types: Vec<ConflictType>,
}

/// A time point shared by many conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCluster {
    pub day: u8,
    pub slot: u8,
    pub conflict_count: usize,
}

/// A ranked hotspot entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub key: String,
    pub conflict_count: usize,
}

/// Hotspot rankings by resource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hotspots {
    pub teachers: Vec<Hotspot>,
    pub classrooms: Vec<Hotspot>,
    /// Keys are `day<d>-slot<s>`.
    pub time_slots: Vec<Hotspot>,
}

/// Aggregate view of a conflict list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    pub total: usize,
    pub by_type: BTreeMap<ConflictType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub recurring: Vec<RecurringPattern>,
    pub cascades: Vec<Cascade>,
    pub time_clusters: Vec<TimeCluster>,
    pub hotspots: Hotspots,
    pub suggestions: Vec<String>,
}

impl ConflictAnalysis {
    /// Most frequent conflict type (ties go to the earlier-declared type).
    pub fn dominant_type(&self) -> Option<ConflictType> {
        self.by_type
            .iter()
            .fold(None, |best: Option<(ConflictType, usize)>, (&t, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((t, n)),
            })
            .map(|(t, _)| t)
    }
}

/// Builds [`ConflictAnalysis`] reports.
#[derive(Debug, Clone)]
pub struct ConflictAnalyzer {
    top_n: usize,
}

impl Default for ConflictAnalyzer {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

impl ConflictAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many hotspots per kind are reported.
    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Analyzes a conflict list.
    pub fn analyze(&self, conflicts: &[Conflict]) -> ConflictAnalysis {
        let mut analysis = ConflictAnalysis {
            total: conflicts.len(),
            ..ConflictAnalysis::default()
        };

        let mut signatures: BTreeMap<(String, u8, u8), usize> = BTreeMap::new();
        let mut resource_types: BTreeMap<String, BTreeSet<ConflictType>> = BTreeMap::new();
        let mut time_counts: BTreeMap<(u8, u8), usize> = BTreeMap::new();
        let mut teacher_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut classroom_counts: BTreeMap<String, usize> = BTreeMap::new();

        for conflict in conflicts {
            *analysis.by_type.entry(conflict.conflict_type()).or_insert(0) += 1;
            *analysis.by_severity.entry(conflict.severity()).or_insert(0) += 1;

            // Each conflict counts once per resource and per time point.
            let mut teachers = BTreeSet::new();
            let mut classrooms = BTreeSet::new();
            let mut times = BTreeSet::new();
            let mut sigs = BTreeSet::new();
            for a in conflict.assignments() {
                teachers.insert(a.teacher_id.clone());
                classrooms.insert(a.classroom_id.clone());
                times.insert(a.time_key());
                sigs.insert((format!("teacher:{}", a.teacher_id), a.day(), a.slot()));
                sigs.insert((format!("classroom:{}", a.classroom_id), a.day(), a.slot()));
            }

            for t in teachers {
                resource_types
                    .entry(format!("teacher:{t}"))
                    .or_default()
                    .insert(conflict.conflict_type());
                *teacher_counts.entry(t).or_insert(0) += 1;
            }
            for r in classrooms {
                resource_types
                    .entry(format!("classroom:{r}"))
                    .or_default()
                    .insert(conflict.conflict_type());
                *classroom_counts.entry(r).or_insert(0) += 1;
            }
            for t in times {
                *time_counts.entry(t).or_insert(0) += 1;
            }
            for s in sigs {
                *signatures.entry(s).or_insert(0) += 1;
            }
        }

        analysis.recurring = signatures
            .into_iter()
            .filter(|(_, n)| *n >= 2)
            .map(|((resource, day, slot), occurrences)| RecurringPattern {
                resource,
                day,
                slot,
                occurrences,
            })
            .collect();

        analysis.cascades = resource_types
            .into_iter()
            .filter(|(_, types)| types.len() >= 2)
            .map(|(resource, types)| Cascade {
                resource,
                conflict_types: types.into_iter().collect(),
            })
            .collect();

        analysis.time_clusters = time_counts
            .iter()
            .filter(|(_, &n)| n >= CLUSTER_THRESHOLD)
            .map(|(&(day, slot), &conflict_count)| TimeCluster {
                day,
                slot,
                conflict_count,
            })
            .collect();

        analysis.hotspots = Hotspots {
            teachers: self.rank(teacher_counts),
            classrooms: self.rank(classroom_counts),
            time_slots: self.rank(
                time_counts
                    .into_iter()
                    .map(|((d, s), n)| (format!("day{d}-slot{s}"), n))
                    .collect(),
            ),
        };

        analysis.suggestions = suggestions(&analysis);
        analysis
    }

    fn rank(&self, counts: BTreeMap<String, usize>) -> Vec<Hotspot> {
        let mut ranked: Vec<Hotspot> = counts
            .into_iter()
            .map(|(key, conflict_count)| Hotspot {
                key,
                conflict_count,
            })
            .collect();
        // Stable sort keeps key order among equal counts.
        ranked.sort_by(|a, b| b.conflict_count.cmp(&a.conflict_count));
        ranked.truncate(self.top_n);
        ranked
    }
}

fn suggestions(analysis: &ConflictAnalysis) -> Vec<String> {
    let mut out = Vec::new();
    let Some(dominant) = analysis.dominant_type() else {
        return out;
    };

    out.push(
        match dominant {
            ConflictType::TeacherTime => {
                "Teacher double bookings dominate: add qualified teachers for busy courses or widen their available time slots"
            }
            ConflictType::ClassroomTime => {
                "Classroom double bookings dominate: open more classrooms or spread sessions over more time slots"
            }
            ConflictType::ClassroomCapacity => {
                "Capacity shortfalls dominate: assign larger classrooms or split large courses into sections"
            }
            ConflictType::TeacherQualification => {
                "Qualification gaps dominate: extend teacher qualification lists for the affected courses"
            }
            ConflictType::ClassroomUnavailable => {
                "Unavailable classrooms dominate: reactivate the classrooms or restrict placement to usable ones"
            }
            ConflictType::CourseInactive => {
                "Inactive courses dominate: publish the courses or drop them from the request"
            }
            ConflictType::TimeSlotInactive => {
                "Out-of-catalog times dominate: extend the time-slot catalog or move sessions into active slots"
            }
            ConflictType::TeacherWorkload => {
                "Daily overloads dominate: raise daily hour ceilings or spread sessions across more days"
            }
            ConflictType::StudentCourse => {
                "Student overlaps dominate: keep commonly co-enrolled courses in different time slots"
            }
            ConflictType::TimePreference => {
                "Preference violations dominate: review teacher availability or relax low-score preferences"
            }
        }
        .to_string(),
    );

    for cascade in &analysis.cascades {
        out.push(format!(
            "{} is involved in {} conflict types; review its load first",
            cascade.resource,
            cascade.conflict_types.len()
        ));
    }
    for cluster in &analysis.time_clusters {
        out.push(format!(
            "Day {} slot {} has {} conflicts; move some sessions to quieter slots",
            cluster.day, cluster.slot, cluster.conflict_count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Assignment;

    fn a(course: &str, teacher: &str, room: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, teacher, room, day, slot).unwrap()
    }

    fn conflicts() -> Vec<Conflict> {
        let x = a("C1", "T1", "R1", 1, 1);
        let y = a("C2", "T1", "R1", 1, 1);
        let z = a("C3", "T2", "R2", 1, 1);
        vec![
            Conflict::with_default_severity(ConflictType::TeacherTime, vec![x.clone(), y.clone()], "t")
                .unwrap(),
            Conflict::with_default_severity(ConflictType::ClassroomTime, vec![x.clone(), y], "c")
                .unwrap(),
            Conflict::with_default_severity(ConflictType::ClassroomCapacity, vec![z], "cap")
                .unwrap(),
            Conflict::with_default_severity(ConflictType::TimePreference, vec![x], "pref").unwrap(),
        ]
    }

    #[test]
    fn test_frequencies() {
        let analysis = ConflictAnalyzer::new().analyze(&conflicts());
        assert_eq!(analysis.total, 4);
        assert_eq!(analysis.by_type[&ConflictType::TeacherTime], 1);
        assert_eq!(analysis.by_severity[&Severity::High], 3);
        assert_eq!(analysis.by_severity[&Severity::Low], 1);
    }

    #[test]
    fn test_patterns() {
        let analysis = ConflictAnalyzer::new().analyze(&conflicts());

        let t1 = analysis
            .recurring
            .iter()
            .find(|p| p.resource == "teacher:T1")
            .unwrap();
        assert_eq!((t1.day, t1.slot, t1.occurrences), (1, 1, 3));

        let cascade = analysis
            .cascades
            .iter()
            .find(|c| c.resource == "teacher:T1")
            .unwrap();
        assert_eq!(cascade.conflict_types.len(), 3);
        assert!(analysis.cascades.iter().all(|c| c.resource != "teacher:T2"));

        assert_eq!(analysis.time_clusters.len(), 1);
        assert_eq!(analysis.time_clusters[0].conflict_count, 4);
    }

    #[test]
    fn test_hotspots_and_suggestions() {
        let analysis = ConflictAnalyzer::new().with_top_n(1).analyze(&conflicts());
        assert_eq!(analysis.hotspots.teachers.len(), 1);
        assert_eq!(analysis.hotspots.teachers[0].key, "T1");
        assert_eq!(analysis.hotspots.teachers[0].conflict_count, 3);
        assert_eq!(analysis.hotspots.time_slots[0].key, "day1-slot1");

        // All types tie at one; the earliest declared wins.
        assert_eq!(analysis.dominant_type(), Some(ConflictType::TeacherTime));
        assert!(analysis.suggestions[0].starts_with("Teacher double bookings"));
        assert!(analysis.suggestions.iter().any(|s| s.contains("Day 1 slot 1")));
    }

    #[test]
    fn test_empty() {
        let analysis = ConflictAnalyzer::new().analyze(&[]);
        assert_eq!(analysis.total, 0);
        assert!(analysis.suggestions.is_empty());
        assert!(analysis.dominant_type().is_none());
    }
}
