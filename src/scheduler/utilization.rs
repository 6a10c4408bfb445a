//! Resource utilization metrics.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Teacher load | weekly hours / weekly ceiling |
//! | Classroom occupancy | sessions / active time points |
//! | Classroom fill | mean enrollment cap / capacity |
//! | Slot demand | sessions per (day, slot) |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Assignment, ReferenceData};

/// Per-teacher load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherLoad {
    pub teacher_id: String,
    pub sessions: usize,
    pub hours: u32,
    pub max_weekly_hours: u32,
    /// `hours / max_weekly_hours` (may exceed 1).
    pub load_ratio: f64,
}

/// Per-classroom usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomUsage {
    pub classroom_id: String,
    pub sessions: usize,
    /// Sessions over active time points (0.0..1.0 without double bookings).
    pub occupancy: f64,
    /// Mean enrollment cap over capacity for hosted sessions.
    pub mean_fill_ratio: f64,
}

/// Sessions held at one time point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDemand {
    pub day: u8,
    pub slot: u8,
    pub sessions: usize,
}

/// Utilization breakdown of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    /// Every known teacher, including idle ones.
    pub teachers: Vec<TeacherLoad>,
    /// Every known classroom, including unused ones.
    pub classrooms: Vec<ClassroomUsage>,
    /// Every active time point, day-major.
    pub time_slots: Vec<SlotDemand>,
    pub average_teacher_load: f64,
    pub average_classroom_occupancy: f64,
    /// Busiest time point (earliest on ties).
    pub peak_slot: Option<SlotDemand>,
}

impl UtilizationReport {
    /// Computes utilization for a schedule.
    ///
    /// # Arguments
    /// * `schedule` - The assignments to measure.
    /// * `data` - Reference data (ceilings, capacities, time catalog).
    /// * `hours_per_session` - Teaching hours one session counts for.
    pub fn calculate(
        schedule: &[Assignment],
        data: &dyn ReferenceData,
        hours_per_session: u32,
    ) -> Self {
        let mut teacher_sessions: BTreeMap<&str, usize> = BTreeMap::new();
        let mut room_sessions: BTreeMap<&str, usize> = BTreeMap::new();
        let mut room_fill: BTreeMap<&str, f64> = BTreeMap::new();
        let mut slot_sessions: BTreeMap<(u8, u8), usize> = BTreeMap::new();

        for a in schedule {
            *teacher_sessions.entry(a.teacher_id.as_str()).or_insert(0) += 1;
            *room_sessions.entry(a.classroom_id.as_str()).or_insert(0) += 1;
            *slot_sessions.entry(a.time_key()).or_insert(0) += 1;

            let fill = match (data.course(&a.course_id), data.classroom(&a.classroom_id)) {
                (Some(c), Some(r)) if r.capacity > 0 => {
                    c.enrollment_cap as f64 / r.capacity as f64
                }
                _ => 0.0,
            };
            *room_fill.entry(a.classroom_id.as_str()).or_insert(0.0) += fill;
        }

        let teachers: Vec<TeacherLoad> = data
            .teachers()
            .iter()
            .map(|t| {
                let sessions = teacher_sessions.get(t.id.as_str()).copied().unwrap_or(0);
                let hours = sessions as u32 * hours_per_session;
                TeacherLoad {
                    teacher_id: t.id.clone(),
                    sessions,
                    hours,
                    max_weekly_hours: t.max_weekly_hours,
                    load_ratio: if t.max_weekly_hours == 0 {
                        0.0
                    } else {
                        hours as f64 / t.max_weekly_hours as f64
                    },
                }
            })
            .collect();

        let time_points = data.time_slots().len();
        let classrooms: Vec<ClassroomUsage> = data
            .classrooms()
            .iter()
            .map(|r| {
                let sessions = room_sessions.get(r.id.as_str()).copied().unwrap_or(0);
                let fill_sum = room_fill.get(r.id.as_str()).copied().unwrap_or(0.0);
                ClassroomUsage {
                    classroom_id: r.id.clone(),
                    sessions,
                    occupancy: if time_points == 0 {
                        0.0
                    } else {
                        sessions as f64 / time_points as f64
                    },
                    mean_fill_ratio: if sessions == 0 {
                        0.0
                    } else {
                        fill_sum / sessions as f64
                    },
                }
            })
            .collect();

        let time_slots: Vec<SlotDemand> = data
            .time_slots()
            .time_points()
            .into_iter()
            .map(|(day, slot)| SlotDemand {
                day,
                slot,
                sessions: slot_sessions.get(&(day, slot)).copied().unwrap_or(0),
            })
            .collect();

        let peak_slot = time_slots
            .iter()
            .filter(|s| s.sessions > 0)
            .fold(None::<&SlotDemand>, |best, s| match best {
                Some(b) if b.sessions >= s.sessions => Some(b),
                _ => Some(s),
            })
            .cloned();

        Self {
            average_teacher_load: mean(teachers.iter().map(|t| t.load_ratio)),
            average_classroom_occupancy: mean(classrooms.iter().map(|c| c.occupancy)),
            teachers,
            classrooms,
            time_slots,
            peak_slot,
        }
    }

    /// Teachers above their weekly ceiling.
    pub fn overloaded_teachers(&self) -> Vec<&TeacherLoad> {
        self.teachers.iter().filter(|t| t.load_ratio > 1.0).collect()
    }

    /// Classrooms hosting no session.
    pub fn idle_classrooms(&self) -> Vec<&ClassroomUsage> {
        self.classrooms.iter().filter(|c| c.sessions == 0).collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
