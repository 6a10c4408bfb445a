//! Input validation for timetabling problems.
//!
//! Checks reference data and run parameters before any search starts.
//! Every problem is collected; nothing stops at the first error.
//!
//! Reference data:
//! - Duplicate course, teacher and classroom IDs
//! - Qualifications and enrollments naming unknown courses
//! - Preferences naming unknown teachers, or with out-of-range day, slot
//!   or score
//! - Empty or out-of-range time-slot catalog
//!
//! Parameters: rates outside `[0, 1]`, zero sizes and budgets, inverted
//! phase boundaries, empty stage and strategy lists.

use std::collections::HashSet;
use std::fmt;

use crate::conflict::{DetectorConfig, ResolverConfig};
use crate::constraints::ConstraintConfig;
use crate::engine::ScheduleParams;
use crate::ga::{GaConfig, SelectionType};
use crate::models::{ReferenceCatalog, ReferenceData, MAX_DAY, MAX_SLOT, MIN_DAY, MIN_SLOT};
use crate::optimizer::OptimizerConfig;
use crate::orchestration::{HybridConfig, IslandConfig};
use crate::scheduler::GreedyConfig;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two records share the same ID.
    DuplicateId,
    /// A record references a course or teacher that doesn't exist.
    UnknownReference,
    /// A day, slot, score or rate is outside its valid range.
    OutOfRange,
    /// The time-slot catalog has no days or no slots.
    EmptyCatalog,
    /// A size, budget or list parameter is unusable.
    InvalidParameter,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Messages of a batch of errors, in detection order.
pub fn messages(errors: &[ValidationError]) -> Vec<String> {
    errors.iter().map(|e| e.message.clone()).collect()
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_unique<'a>(
    errors: &mut Vec<ValidationError>,
    label: &str,
    ids: impl Iterator<Item = &'a str>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate {label} ID: {id}"),
            ));
        }
    }
    seen
}

/// Validates reference data before it is handed to the engine.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_reference_data(data: &ReferenceCatalog) -> ValidationResult {
    let mut errors = Vec::new();

    let course_ids = check_unique(&mut errors, "course", data.courses().iter().map(|c| c.id.as_str()));
    let teacher_ids =
        check_unique(&mut errors, "teacher", data.teachers().iter().map(|t| t.id.as_str()));
    check_unique(
        &mut errors,
        "classroom",
        data.classrooms().iter().map(|r| r.id.as_str()),
    );

    for teacher in data.teachers() {
        for course in &teacher.qualified_courses {
            if !course_ids.contains(course.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!(
                        "Teacher '{}' is qualified for unknown course '{}'",
                        teacher.id, course
                    ),
                ));
            }
        }
    }

    for p in data.preferences() {
        if !teacher_ids.contains(p.teacher_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Preference references unknown teacher '{}'", p.teacher_id),
            ));
        }
        if !(MIN_DAY..=MAX_DAY).contains(&p.day) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!("Preference of '{}' has day {} outside 1..=7", p.teacher_id, p.day),
            ));
        }
        if !(MIN_SLOT..=MAX_SLOT).contains(&p.slot) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!("Preference of '{}' has slot {} outside 1..=20", p.teacher_id, p.slot),
            ));
        }
        if !(0.0..=1.0).contains(&p.score) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!(
                    "Preference of '{}' at ({}, {}) has score {} outside [0, 1]",
                    p.teacher_id, p.day, p.slot, p.score
                ),
            ));
        }
    }

    for e in data.enrollments() {
        for course in &e.course_ids {
            if !course_ids.contains(course.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!(
                        "Student '{}' is enrolled in unknown course '{}'",
                        e.student_id, course
                    ),
                ));
            }
        }
    }

    let catalog = data.time_slots();
    if catalog.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyCatalog,
            "Time-slot catalog has no active days or slots",
        ));
    }
    for &day in catalog.days.iter().filter(|d| !(MIN_DAY..=MAX_DAY).contains(*d)) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("Time-slot catalog day {day} is outside 1..=7"),
        ));
    }
    for &slot in catalog.slots.iter().filter(|s| !(MIN_SLOT..=MAX_SLOT).contains(*s)) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("Time-slot catalog slot {slot} is outside 1..=20"),
        ));
    }

    finish(errors)
}

fn check_rate(errors: &mut Vec<ValidationError>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("{name} must be in [0, 1], got {value}"),
        ));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, name: &str, value: usize) {
    if value == 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            format!("{name} must be greater than zero"),
        ));
    }
}

fn check_greedy(errors: &mut Vec<ValidationError>, c: &GreedyConfig) {
    check_positive(errors, "greedy.max_attempts_per_course", c.max_attempts_per_course);
    check_rate(errors, "greedy.early_accept_score", c.early_accept_score);
}

fn check_genetic(errors: &mut Vec<ValidationError>, c: &GaConfig) {
    check_positive(errors, "genetic.population_size", c.population_size);
    check_positive(errors, "genetic.max_generations", c.max_generations);
    check_positive(errors, "genetic.convergence_threshold", c.convergence_threshold);
    check_rate(errors, "genetic.elite_rate", c.elite_rate);
    check_rate(errors, "genetic.crossover_rate", c.crossover_rate);
    check_rate(errors, "genetic.mutation_rate", c.mutation_rate);
    check_rate(errors, "genetic.max_mutation_rate", c.max_mutation_rate);
    check_rate(errors, "genetic.greedy_seed_ratio", c.greedy_seed_ratio);
    if c.adaptive_mutation && c.max_mutation_rate < c.mutation_rate {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            format!(
                "genetic.max_mutation_rate ({}) must not be below genetic.mutation_rate ({})",
                c.max_mutation_rate, c.mutation_rate
            ),
        ));
    }
    if !c.target_fitness.is_finite() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "genetic.target_fitness must be finite",
        ));
    }
    if let SelectionType::Tournament { size } = c.operators.selection {
        check_positive(errors, "genetic.operators.selection.tournament.size", size);
    }
}

fn check_optimizer(errors: &mut Vec<ValidationError>, c: &OptimizerConfig) {
    check_positive(errors, "optimizer.max_iterations", c.max_iterations);
    check_positive(errors, "optimizer.no_improvement_limit", c.no_improvement_limit);
    check_positive(errors, "optimizer.neighborhood_sample", c.neighborhood_sample);
    if !(c.initial_temperature > 0.0 && c.initial_temperature.is_finite()) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!(
                "optimizer.initial_temperature must be positive, got {}",
                c.initial_temperature
            ),
        ));
    }
    if !(c.cooling_rate > 0.0 && c.cooling_rate < 1.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("optimizer.cooling_rate must be in (0, 1), got {}", c.cooling_rate),
        ));
    }
    if !(c.min_temperature > 0.0 && c.min_temperature < c.initial_temperature) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!(
                "optimizer.min_temperature must be in (0, initial_temperature), got {}",
                c.min_temperature
            ),
        ));
    }
    check_rate(errors, "optimizer.early_phase", c.early_phase);
    check_rate(errors, "optimizer.late_phase", c.late_phase);
    if c.early_phase > c.late_phase {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            format!(
                "optimizer.early_phase ({}) must not exceed optimizer.late_phase ({})",
                c.early_phase, c.late_phase
            ),
        ));
    }
}

fn check_hybrid(errors: &mut Vec<ValidationError>, c: &HybridConfig) {
    if c.stages.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "hybrid.stages must not be empty",
        ));
    }
    if c.quality_threshold.is_some_and(|t| !t.is_finite()) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "hybrid.quality_threshold must be finite",
        ));
    }
}

fn check_island(errors: &mut Vec<ValidationError>, c: &IslandConfig, population: usize) {
    check_positive(errors, "island.islands", c.islands);
    check_positive(errors, "island.migration_interval", c.migration_interval);
    if c.workers == Some(0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "island.workers must be greater than zero",
        ));
    }
    if c.migrants > population {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            format!(
                "island.migrants ({}) must not exceed genetic.population_size ({population})",
                c.migrants
            ),
        ));
    }
}

fn check_conflicts(errors: &mut Vec<ValidationError>, d: &DetectorConfig, r: &ResolverConfig) {
    check_rate(errors, "detector.preference_threshold", d.preference_threshold);
    check_rate(errors, "resolver.preference_threshold", r.preference_threshold);
    check_positive(errors, "resolver.max_attempts_per_conflict", r.max_attempts_per_conflict);
    if r.strategies.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "resolver.strategies must not be empty",
        ));
    }
}

fn check_constraints(errors: &mut Vec<ValidationError>, c: &ConstraintConfig) {
    let w = &c.weights;
    let named = [
        ("preference", w.preference),
        ("workload", w.workload),
        ("distribution", w.distribution),
        ("utilization", w.utilization),
        ("day_balance", w.day_balance),
        ("consecutive", w.consecutive),
        ("type_match", w.type_match),
    ];
    for (name, value) in named {
        if !(value >= 0.0 && value.is_finite()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!("constraints.weights.{name} must be a non-negative number, got {value}"),
            ));
        }
    }
    if w.sum() <= 0.0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "constraints.weights must not all be zero",
        ));
    }
    if c.hard.hours_per_session == 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "constraints.hard.hours_per_session must be greater than zero",
        ));
    }
}

/// Validates every configuration block of a run.
///
/// Blocks are checked whether or not the chosen algorithm uses them, so
/// a bad configuration is reported on the first run.
pub fn validate_params(params: &ScheduleParams) -> ValidationResult {
    let mut errors = Vec::new();
    check_greedy(&mut errors, &params.greedy);
    check_genetic(&mut errors, &params.genetic);
    check_optimizer(&mut errors, &params.optimizer);
    check_hybrid(&mut errors, &params.hybrid);
    check_island(&mut errors, &params.island, params.genetic.population_size);
    check_conflicts(&mut errors, &params.detector, &params.resolver);
    check_constraints(&mut errors, &params.constraints);
    finish(errors)
}
