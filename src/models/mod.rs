//! Timetabling domain models.
//!
//! Value types produced and consumed by the search algorithms
//! (`Assignment`, `Conflict`, `ScheduleResult`) and the read-only
//! reference data they are checked against.
//!
//! # Domain Mappings
//!
//! | u-timetable | University | School | Training center |
//! |-------------|------------|--------|-----------------|
//! | Course | Course section | Class lesson | Workshop |
//! | Teacher | Lecturer | Teacher | Trainer |
//! | Classroom | Lecture hall / lab | Classroom | Room |
//! | (day, slot) | Weekly period | Timetable period | Session block |

mod assignment;
mod conflict;
mod reference;
mod repository;
mod result;

pub use assignment::{check_time, Assignment, TimeKey, MAX_DAY, MAX_SLOT, MIN_DAY, MIN_SLOT};
pub use conflict::{Conflict, ConflictKey, ConflictType, Severity};
pub use reference::{Classroom, Course, Enrollment, Teacher, TeacherPreference, TimeSlotCatalog};
pub use repository::{ReferenceCatalog, ReferenceData};
pub use result::{
    PlacementFailure, RecordSet, RecordStatus, ResultMetadata, ScheduleRecord, ScheduleResult,
};
