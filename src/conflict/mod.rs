//! Conflict subsystem: detect → resolve → analyze.
//!
//! - [`ConflictDetector`] finds every rule violation in a schedule.
//! - [`ConflictResolver`] repairs them best-effort without ever making
//!   the schedule less valid.
//! - [`ConflictAnalyzer`] summarizes them for reporting.

mod analyzer;
mod detector;
mod resolver;

pub use analyzer::{
    Cascade, ConflictAnalysis, ConflictAnalyzer, Hotspot, Hotspots, RecurringPattern, TimeCluster,
};
pub use detector::{ConflictDetector, DetectionReport, DetectorConfig};
pub use resolver::{ConflictResolver, RepairStrategy, ResolutionOutcome, ResolverConfig};
