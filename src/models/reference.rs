//! Reference data records.
//!
//! Courses, teachers, classrooms, the time-slot catalog, teacher
//! preferences and enrollments are supplied by the host system and are
//! read-only to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::assignment::{MAX_DAY, MAX_SLOT, MIN_DAY, MIN_SLOT};

/// A course to be scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Unique course identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Maximum number of enrolled students.
    pub enrollment_cap: u32,
    /// Course type (e.g. "lecture", "lab"). Matched against room types.
    pub course_type: String,
    /// Relative difficulty in `[0, 1]`. Harder courses are placed first
    /// by the difficulty priority rule.
    pub difficulty: f64,
    /// Whether the course is active this term.
    pub is_active: bool,
    /// Whether the course is published in the catalog.
    pub is_published: bool,
}

impl Course {
    /// Creates an active, published course.
    pub fn new(id: impl Into<String>, enrollment_cap: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            enrollment_cap,
            course_type: String::new(),
            difficulty: 0.5,
            is_active: true,
            is_published: true,
        }
    }

    /// Sets the course name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the course type.
    pub fn with_type(mut self, course_type: impl Into<String>) -> Self {
        self.course_type = course_type.into();
        self
    }

    /// Sets the difficulty (clamped to `[0, 1]`).
    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty.clamp(0.0, 1.0);
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Sets the published flag.
    pub fn with_published(mut self, published: bool) -> Self {
        self.is_published = published;
        self
    }

    /// Whether the course may be scheduled.
    pub fn is_schedulable(&self) -> bool {
        self.is_active && self.is_published
    }
}

/// A teacher with qualifications and load ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    /// Unique teacher identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Courses this teacher is qualified (or assigned) to teach.
    pub qualified_courses: BTreeSet<String>,
    /// Weekly teaching-hour ceiling.
    pub max_weekly_hours: u32,
    /// Daily teaching-hour ceiling.
    pub max_daily_hours: u32,
    /// Ideal weekly load used by the workload-balance score.
    /// `None` = half of `max_weekly_hours`.
    pub ideal_weekly_hours: Option<u32>,
}

impl Teacher {
    /// Creates a teacher with default ceilings (20 h/week, 8 h/day).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            qualified_courses: BTreeSet::new(),
            max_weekly_hours: 20,
            max_daily_hours: 8,
            ideal_weekly_hours: None,
        }
    }

    /// Sets the teacher name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a qualified course.
    pub fn with_qualification(mut self, course_id: impl Into<String>) -> Self {
        self.qualified_courses.insert(course_id.into());
        self
    }

    /// Adds several qualified courses.
    pub fn with_qualifications<I, S>(mut self, course_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualified_courses
            .extend(course_ids.into_iter().map(Into::into));
        self
    }

    /// Sets the weekly ceiling.
    pub fn with_max_weekly_hours(mut self, hours: u32) -> Self {
        self.max_weekly_hours = hours;
        self
    }

    /// Sets the daily ceiling.
    pub fn with_max_daily_hours(mut self, hours: u32) -> Self {
        self.max_daily_hours = hours;
        self
    }

    /// Sets the ideal weekly load.
    pub fn with_ideal_weekly_hours(mut self, hours: u32) -> Self {
        self.ideal_weekly_hours = Some(hours);
        self
    }

    /// Whether the teacher lists the course among their qualifications.
    pub fn is_qualified_for(&self, course_id: &str) -> bool {
        self.qualified_courses.contains(course_id)
    }

    /// Ideal weekly hours (explicit or half the weekly ceiling, at least 1).
    pub fn ideal_hours(&self) -> u32 {
        self.ideal_weekly_hours
            .unwrap_or(self.max_weekly_hours / 2)
            .max(1)
    }
}

/// A classroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classroom {
    /// Unique classroom identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Seat count.
    pub capacity: u32,
    /// Room type (e.g. "lecture", "lab", "general").
    pub room_type: String,
    /// Whether the room can be booked.
    pub is_available: bool,
    /// Whether the room is in service.
    pub is_active: bool,
}

impl Classroom {
    /// Creates an available, active classroom of type "general".
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            capacity,
            room_type: "general".to_string(),
            is_available: true,
            is_active: true,
        }
    }

    /// Sets the room name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the room type.
    pub fn with_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = room_type.into();
        self
    }

    /// Sets the availability flag.
    pub fn with_available(mut self, available: bool) -> Self {
        self.is_available = available;
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Whether the room may host sessions.
    pub fn is_usable(&self) -> bool {
        self.is_available && self.is_active
    }
}

/// A teacher's preference for one (day, slot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherPreference {
    pub teacher_id: String,
    pub day: u8,
    pub slot: u8,
    /// Preference score in `[0, 1]` (1 = most preferred).
    pub score: f64,
    /// Whether the teacher can teach at this time at all.
    pub is_available: bool,
}

impl TeacherPreference {
    /// Creates an available preference entry (score clamped to `[0, 1]`).
    pub fn new(teacher_id: impl Into<String>, day: u8, slot: u8, score: f64) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            day,
            slot,
            score: score.clamp(0.0, 1.0),
            is_available: true,
        }
    }

    /// Creates an "unavailable" entry.
    pub fn unavailable(teacher_id: impl Into<String>, day: u8, slot: u8) -> Self {
        Self {
            is_available: false,
            ..Self::new(teacher_id, day, slot, 0.0)
        }
    }
}

/// Active days and slot numbers the engine may place sessions in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotCatalog {
    /// Teaching days (1 = Monday).
    pub days: Vec<u8>,
    /// Active slot numbers, ordered.
    pub slots: Vec<u8>,
}

impl TimeSlotCatalog {
    /// Creates a catalog from explicit day and slot lists.
    ///
    /// Values are sorted and de-duplicated; range checks happen in
    /// reference-data validation.
    pub fn new(mut days: Vec<u8>, mut slots: Vec<u8>) -> Self {
        days.sort_unstable();
        days.dedup();
        slots.sort_unstable();
        slots.dedup();
        Self { days, slots }
    }

    /// Days `1..=days` × slots `1..=slots`, clamped to the valid ranges.
    pub fn weekly(days: u8, slots: u8) -> Self {
        Self::new(
            (MIN_DAY..=days.min(MAX_DAY)).collect(),
            (MIN_SLOT..=slots.min(MAX_SLOT)).collect(),
        )
    }

    /// Whether the slot number is active.
    pub fn contains_slot(&self, slot: u8) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    /// Whether the day is a teaching day.
    pub fn contains_day(&self, day: u8) -> bool {
        self.days.binary_search(&day).is_ok()
    }

    /// All (day, slot) time points, day-major.
    pub fn time_points(&self) -> Vec<(u8, u8)> {
        self.days
            .iter()
            .flat_map(|&d| self.slots.iter().map(move |&s| (d, s)))
            .collect()
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.days.len() * self.slots.len()
    }

    /// Whether there are no time points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimeSlotCatalog {
    /// Monday–Friday, slots 1–10.
    fn default() -> Self {
        Self::weekly(5, 10)
    }
}

/// A student's course enrollments (input to student-overlap detection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub course_ids: Vec<String>,
}

impl Enrollment {
    pub fn new<I, S>(student_id: impl Into<String>, course_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            student_id: student_id.into(),
            course_ids: course_ids.into_iter().map(Into::into).collect(),
        }
    }
}
