//! Scheduling engine façade.
//!
//! Holds the reference-data snapshot and runs one algorithm per call:
//!
//! ```text
//! initialize ─► generate_schedule(algorithm, params)
//!                 ├─ validate params
//!                 ├─ run greedy | genetic | optimizer | hybrid | parallel
//!                 ├─ detect conflicts
//!                 ├─ resolve (optional)
//!                 ├─ post-optimize (optional)
//!                 └─ ScheduleResult
//! ```
//!
//! # Example
//!
//! ```
//! use u_timetable::engine::{Algorithm, ScheduleParams, SchedulingEngine};
//! use u_timetable::models::{Classroom, Course, Teacher};
//!
//! let mut engine = SchedulingEngine::new();
//! engine
//!     .initialize(
//!         vec![Course::new("C1", 30), Course::new("C2", 30)],
//!         vec![Teacher::new("T1").with_qualifications(["C1", "C2"])],
//!         vec![Classroom::new("R1", 40)],
//!         vec![],
//!     )
//!     .unwrap();
//! let result = engine
//!     .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
//!     .unwrap();
//! assert_eq!(result.assignments.len(), 2);
//! assert!(result.is_valid());
//! ```

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::conflict::{
    ConflictAnalysis, ConflictAnalyzer, ConflictDetector, ConflictResolver, DetectionReport,
    DetectorConfig, ResolverConfig,
};
use crate::constraints::{ConstraintConfig, ConstraintManager, ScheduleEvaluation};
use crate::error::{Result, ScheduleError};
use crate::ga::{GaConfig, GaProblem, GeneticAlgorithm};
use crate::models::{
    Assignment, Classroom, Course, PlacementFailure, ReferenceCatalog, ReferenceData,
    ResultMetadata, ScheduleResult, Teacher, TeacherPreference, TimeSlotCatalog,
};
use crate::optimizer::{Optimizer, OptimizerConfig};
use crate::orchestration::{
    HybridConfig, HybridOptimizer, IslandConfig, IslandModel, NoopObserver, ProgressObserver,
};
use crate::scheduler::{GreedyConfig, GreedyScheduler, UtilizationReport};
use crate::validation::{messages, validate_params, validate_reference_data};

/// Top-level algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Greedy,
    Genetic,
    /// Local search only, from the initial assignments or a random genome.
    Optimizer,
    Hybrid,
    /// Island-model GA.
    Parallel,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Greedy => "greedy",
            Algorithm::Genetic => "genetic",
            Algorithm::Optimizer => "optimizer",
            Algorithm::Hybrid => "hybrid",
            Algorithm::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(Algorithm::Greedy),
            "genetic" | "ga" => Ok(Algorithm::Genetic),
            "optimizer" | "local_search" => Ok(Algorithm::Optimizer),
            "hybrid" => Ok(Algorithm::Hybrid),
            "parallel" | "island" => Ok(Algorithm::Parallel),
            _ => Err(ScheduleError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Parameters of one `generate_schedule` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleParams {
    pub greedy: GreedyConfig,
    pub genetic: GaConfig,
    pub optimizer: OptimizerConfig,
    pub hybrid: HybridConfig,
    pub island: IslandConfig,
    pub detector: DetectorConfig,
    pub resolver: ResolverConfig,
    pub constraints: ConstraintConfig,
    /// Run the resolver when detection finds conflicts.
    pub resolve_conflicts: bool,
    /// Run the optimizer over the final schedule.
    pub post_optimize: bool,
    /// Overall budget; tightens every algorithm's own limit.
    pub time_limit: Option<Duration>,
    /// Seeds the genetic, optimizer, hybrid and parallel runs.
    pub initial_assignments: Vec<Assignment>,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            greedy: GreedyConfig::default(),
            genetic: GaConfig::default(),
            optimizer: OptimizerConfig::default(),
            hybrid: HybridConfig::default(),
            island: IslandConfig::default(),
            detector: DetectorConfig::default(),
            resolver: ResolverConfig::default(),
            constraints: ConstraintConfig::default(),
            resolve_conflicts: true,
            post_optimize: false,
            time_limit: None,
            initial_assignments: Vec::new(),
        }
    }
}

impl ScheduleParams {
    /// Parses parameters from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_greedy(mut self, greedy: GreedyConfig) -> Self {
        self.greedy = greedy;
        self
    }

    pub fn with_genetic(mut self, genetic: GaConfig) -> Self {
        self.genetic = genetic;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_hybrid(mut self, hybrid: HybridConfig) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn with_island(mut self, island: IslandConfig) -> Self {
        self.island = island;
        self
    }

    pub fn with_constraints(mut self, constraints: ConstraintConfig) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_resolution(mut self, enabled: bool) -> Self {
        self.resolve_conflicts = enabled;
        self
    }

    pub fn with_post_optimization(mut self, enabled: bool) -> Self {
        self.post_optimize = enabled;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_initial_assignments(mut self, assignments: Vec<Assignment>) -> Self {
        self.initial_assignments = assignments;
        self
    }

    fn seeds(&self) -> Vec<Vec<Assignment>> {
        if self.initial_assignments.is_empty() {
            Vec::new()
        } else {
            vec![self.initial_assignments.clone()]
        }
    }
}

/// Analysis of a finished schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub algorithm: String,
    pub fitness: f64,
    pub is_valid: bool,
    pub assignment_count: usize,
    pub failures: Vec<PlacementFailure>,
    pub analysis: ConflictAnalysis,
    pub evaluation: ScheduleEvaluation,
    pub utilization: UtilizationReport,
}

impl ScheduleReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn tighten(own: Option<Duration>, overall: Option<Duration>) -> Option<Duration> {
    match (own, overall) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

/// Raw output of the dispatched algorithm.
struct Draft {
    assignments: Vec<Assignment>,
    failures: Vec<PlacementFailure>,
    metadata: ResultMetadata,
}

/// Timetabling engine.
#[derive(Debug, Clone)]
pub struct SchedulingEngine {
    data: Option<Arc<ReferenceCatalog>>,
    observer: Arc<dyn ProgressObserver>,
}

impl Default for SchedulingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingEngine {
    /// Creates an uninitialized engine.
    pub fn new() -> Self {
        Self {
            data: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Routes progress of every run to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Loads reference data with the default time-slot catalog
    /// (Monday–Friday, slots 1–10).
    pub fn initialize(
        &mut self,
        courses: Vec<Course>,
        teachers: Vec<Teacher>,
        classrooms: Vec<Classroom>,
        preferences: Vec<TeacherPreference>,
    ) -> Result<()> {
        self.initialize_with(ReferenceCatalog::new(
            courses,
            teachers,
            classrooms,
            preferences,
            TimeSlotCatalog::default(),
        ))
    }

    /// Loads a prepared catalog, replacing any earlier snapshot.
    ///
    /// # Errors
    /// [`ScheduleError::InvalidReferenceData`] listing every problem found.
    pub fn initialize_with(&mut self, catalog: ReferenceCatalog) -> Result<()> {
        validate_reference_data(&catalog)
            .map_err(|errors| ScheduleError::InvalidReferenceData(messages(&errors)))?;
        tracing::info!(
            courses = catalog.courses().len(),
            teachers = catalog.teachers().len(),
            classrooms = catalog.classrooms().len(),
            time_points = catalog.time_slots().len(),
            "scheduling engine initialized"
        );
        self.data = Some(Arc::new(catalog));
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// The loaded snapshot.
    pub fn reference_data(&self) -> Option<&ReferenceCatalog> {
        self.data.as_deref()
    }

    fn manager(&self, config: &ConstraintConfig) -> Result<Arc<ConstraintManager>> {
        let data = self.data.clone().ok_or(ScheduleError::NotInitialized)?;
        Ok(Arc::new(ConstraintManager::with_config(data, config.clone())))
    }

    /// Runs one algorithm and post-processes its output.
    ///
    /// # Errors
    /// - [`ScheduleError::NotInitialized`] before [`Self::initialize`].
    /// - [`ScheduleError::InvalidConfig`] listing every bad parameter.
    #[tracing::instrument(level = "info", skip_all, fields(algorithm = %algorithm))]
    pub fn generate_schedule(
        &self,
        algorithm: Algorithm,
        params: &ScheduleParams,
    ) -> Result<ScheduleResult> {
        let started = Instant::now();
        let manager = self.manager(&params.constraints)?;
        validate_params(params).map_err(|errors| ScheduleError::InvalidConfig(messages(&errors)))?;

        let Draft {
            mut assignments,
            failures,
            mut metadata,
        } = self.dispatch(algorithm, params, &manager);

        let detector = ConflictDetector::new(manager.clone(), params.detector.clone());
        let mut report = detector.detect(&assignments);
        metadata.conflicts_before_resolution = Some(report.total());

        if params.resolve_conflicts && !report.is_empty() {
            let resolver = ConflictResolver::new(manager.clone(), params.resolver.clone());
            let outcome = resolver.resolve(&assignments, &report.conflicts);
            metadata.conflicts_resolved = Some(outcome.resolved.len());
            for (name, count) in &outcome.strategy_usage {
                metadata
                    .diagnostics
                    .insert(format!("repair.{name}"), count.to_string());
            }
            assignments = outcome.assignments;
            report = detector.detect(&assignments);
        }

        if params.post_optimize && !assignments.is_empty() {
            let mut config = params.optimizer.clone();
            config.time_limit = tighten(config.time_limit, params.time_limit);
            let out = Optimizer::new(manager.clone(), config)
                .with_observer(self.observer.clone())
                .optimize(&assignments);
            metadata
                .diagnostics
                .insert("post_optimization.iterations".into(), out.iterations.to_string());
            if out.improved() {
                assignments = out.best;
                report = detector.detect(&assignments);
            }
        }

        let fitness = manager.fitness(&assignments);
        let result = ScheduleResult::new(assignments, fitness, algorithm.as_str())
            .with_conflicts(report.conflicts)
            .with_failures(failures)
            .with_metadata(metadata)
            .with_generation_time(started.elapsed());

        tracing::info!(
            sessions = result.assignment_count(),
            conflicts = result.conflicts.len(),
            failures = result.failures.len(),
            fitness = result.fitness,
            "schedule generated"
        );
        Ok(result)
    }

    fn dispatch(
        &self,
        algorithm: Algorithm,
        params: &ScheduleParams,
        manager: &Arc<ConstraintManager>,
    ) -> Draft {
        let mut metadata = ResultMetadata::default();
        match algorithm {
            Algorithm::Greedy => {
                let mut config = params.greedy.clone();
                config.time_limit = tighten(config.time_limit, params.time_limit);
                let outcome = GreedyScheduler::new(manager.clone(), config).schedule();
                metadata
                    .diagnostics
                    .insert("backtracks".into(), outcome.backtracks.to_string());
                Draft {
                    assignments: outcome.assignments,
                    failures: outcome.failures,
                    metadata,
                }
            }
            Algorithm::Genetic => {
                let mut config = params.genetic.clone();
                config.time_limit = tighten(config.time_limit, params.time_limit);
                let out = GeneticAlgorithm::from_manager(manager.clone(), config)
                    .with_greedy(params.greedy.clone())
                    .with_observer(self.observer.clone())
                    .run_seeded(&params.seeds());
                metadata.generations = Some(out.generations);
                metadata.convergence_reason = Some(out.convergence_reason.as_str().to_string());
                Draft {
                    assignments: out.best,
                    failures: out.failures,
                    metadata,
                }
            }
            Algorithm::Optimizer => {
                let mut config = params.optimizer.clone();
                config.time_limit = tighten(config.time_limit, params.time_limit);
                let (start, failures) = if params.initial_assignments.is_empty() {
                    let problem = GaProblem::new(manager.clone());
                    let genes = problem
                        .random_individual(&mut seeded_rng(config.seed))
                        .into_genes();
                    (genes, problem.failures().to_vec())
                } else {
                    (params.initial_assignments.clone(), Vec::new())
                };
                let out = Optimizer::new(manager.clone(), config)
                    .with_observer(self.observer.clone())
                    .optimize(&start);
                metadata.iterations = Some(out.iterations);
                metadata.strategy_usage = out.strategy_usage;
                metadata.convergence_reason = Some(out.stop_reason.as_str().to_string());
                Draft {
                    assignments: out.best,
                    failures,
                    metadata,
                }
            }
            Algorithm::Hybrid => {
                let mut config = params.hybrid.clone();
                config.stage_time_limit = tighten(config.stage_time_limit, params.time_limit);
                let out = HybridOptimizer::new(manager.clone(), config)
                    .with_greedy(params.greedy.clone())
                    .with_genetic(params.genetic.clone())
                    .with_optimizer(params.optimizer.clone())
                    .with_observer(self.observer.clone())
                    .run(&params.initial_assignments);
                metadata.generations = out.generations;
                metadata.iterations = out.iterations;
                metadata.strategy_usage = out.strategy_usage;
                metadata.convergence_reason = out.convergence_reason;
                metadata.stage_fitness = out
                    .stages
                    .iter()
                    .map(|s| (s.stage.clone(), s.fitness))
                    .collect();
                if let Some(stage) = out.best_stage {
                    metadata
                        .diagnostics
                        .insert("best_stage".into(), stage.as_str().to_string());
                }
                Draft {
                    assignments: out.best,
                    failures: out.failures,
                    metadata,
                }
            }
            Algorithm::Parallel => {
                let mut genetic = params.genetic.clone();
                genetic.time_limit = tighten(genetic.time_limit, params.time_limit);
                let out = IslandModel::new(manager.clone(), genetic, params.island.clone())
                    .with_greedy(params.greedy.clone())
                    .with_observer(self.observer.clone())
                    .run(&params.seeds());
                metadata.generations = Some(out.result.generations);
                metadata.convergence_reason =
                    Some(out.result.convergence_reason.as_str().to_string());
                metadata.parallel_fallback = out.fallback;
                metadata
                    .diagnostics
                    .insert("epochs".into(), out.epochs.to_string());
                metadata
                    .diagnostics
                    .insert("islands".into(), out.island_best.len().to_string());
                Draft {
                    assignments: out.result.best,
                    failures: out.result.failures,
                    metadata,
                }
            }
        }
    }

    /// Runs conflict detection over an arbitrary assignment list.
    pub fn detect_conflicts(
        &self,
        assignments: &[Assignment],
        config: &DetectorConfig,
    ) -> Result<DetectionReport> {
        let manager = self.manager(&ConstraintConfig::default())?;
        Ok(ConflictDetector::new(manager, config.clone()).detect(assignments))
    }

    /// Builds a report for a result with the default constraint configuration.
    pub fn analyze_schedule(&self, result: &ScheduleResult) -> Result<ScheduleReport> {
        self.analyze_schedule_with(result, &ConstraintConfig::default())
    }

    /// Builds a report combining conflict analysis, constraint evaluation
    /// and resource utilization.
    pub fn analyze_schedule_with(
        &self,
        result: &ScheduleResult,
        constraints: &ConstraintConfig,
    ) -> Result<ScheduleReport> {
        let manager = self.manager(constraints)?;
        let analysis = ConflictAnalyzer::new().analyze(&result.conflicts);
        let evaluation = manager.evaluate_schedule(&result.assignments);
        let utilization = UtilizationReport::calculate(
            &result.assignments,
            manager.data(),
            constraints.hard.hours_per_session,
        );
        Ok(ScheduleReport {
            algorithm: result.algorithm.clone(),
            fitness: result.fitness,
            is_valid: result.is_valid(),
            assignment_count: result.assignment_count(),
            failures: result.failures.clone(),
            analysis,
            evaluation,
            utilization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, RecordSet};
    use crate::orchestration::StageStats;
    use std::sync::Mutex;

    fn three_course_engine() -> SchedulingEngine {
        let mut engine = SchedulingEngine::new();
        engine
            .initialize_with(ReferenceCatalog::new(
                (1..=3).map(|i| Course::new(format!("C{i}"), 50)).collect(),
                vec![
                    Teacher::new("T1").with_qualifications(["C1", "C2", "C3"]),
                    Teacher::new("T2").with_qualifications(["C1", "C2", "C3"]),
                ],
                vec![Classroom::new("R1", 100)],
                vec![],
                TimeSlotCatalog::weekly(5, 4),
            ))
            .unwrap();
        engine
    }

    fn quick_params() -> ScheduleParams {
        ScheduleParams::default()
            .with_genetic(
                GaConfig::default()
                    .with_population_size(12)
                    .with_max_generations(15)
                    .with_seed(11),
            )
            .with_optimizer(OptimizerConfig::default().with_max_iterations(40).with_seed(11))
            .with_island(IslandConfig::default().with_islands(2).with_migration(5, 1).with_workers(2))
    }

    #[test]
    fn test_not_initialized() {
        let engine = SchedulingEngine::new();
        let err = engine
            .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NotInitialized));
        let result = ScheduleResult::new(vec![], 0.0, "greedy");
        assert!(matches!(
            engine.analyze_schedule(&result),
            Err(ScheduleError::NotInitialized)
        ));
    }

    #[test]
    fn test_invalid_reference_data_rejected() {
        let mut engine = SchedulingEngine::new();
        let err = engine
            .initialize(
                vec![Course::new("C1", 10), Course::new("C1", 10)],
                vec![Teacher::new("T1")],
                vec![Classroom::new("R1", 20)],
                vec![TeacherPreference::new("T9", 1, 1, 0.5)],
            )
            .unwrap_err();
        match err {
            ScheduleError::InvalidReferenceData(msgs) => assert_eq!(msgs.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let engine = three_course_engine();
        let mut params = ScheduleParams::default();
        params.genetic.mutation_rate = 2.0;
        let err = engine
            .generate_schedule(Algorithm::Genetic, &params)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidConfig(_)));
    }

    #[test]
    fn test_greedy_places_three_courses() {
        let engine = three_course_engine();
        let result = engine
            .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
            .unwrap();
        assert_eq!(result.assignments.len(), 3);
        assert!(result.conflicts.is_empty());
        assert!(result.failures.is_empty());
        assert!(result.is_valid());
        assert_eq!(result.algorithm, "greedy");
        assert_eq!(result.metadata.conflicts_before_resolution, Some(0));
    }

    #[test]
    fn test_every_algorithm_produces_valid_schedule() {
        let engine = three_course_engine();
        for algorithm in [
            Algorithm::Greedy,
            Algorithm::Genetic,
            Algorithm::Optimizer,
            Algorithm::Hybrid,
            Algorithm::Parallel,
        ] {
            let result = engine.generate_schedule(algorithm, &quick_params()).unwrap();
            assert_eq!(result.assignments.len(), 3, "{algorithm}");
            assert_eq!(result.algorithm, algorithm.as_str());
            assert!(result.fitness >= 0.0, "{algorithm}: {}", result.fitness);
        }
    }

    #[test]
    fn test_metadata_per_algorithm() {
        let engine = three_course_engine();
        let hybrid = engine
            .generate_schedule(Algorithm::Hybrid, &quick_params())
            .unwrap();
        let stages: Vec<&str> = hybrid
            .metadata
            .stage_fitness
            .iter()
            .map(|(s, _)| s.as_str())
            .collect();
        assert_eq!(stages, vec!["greedy", "genetic", "local_search"]);

        let parallel = engine
            .generate_schedule(Algorithm::Parallel, &quick_params())
            .unwrap();
        assert!(!parallel.metadata.parallel_fallback);
        assert_eq!(parallel.metadata.diagnostics["islands"], "2");

        let optimizer = engine
            .generate_schedule(Algorithm::Optimizer, &quick_params())
            .unwrap();
        assert!(optimizer.metadata.iterations.is_some());
        assert!(!optimizer.metadata.strategy_usage.is_empty());
    }

    #[test]
    fn test_optimizer_starts_from_initial_assignments() {
        let engine = three_course_engine();
        let initial = vec![
            Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
            Assignment::new("C2", "T1", "R1", 1, 1).unwrap(),
            Assignment::new("C3", "T2", "R1", 2, 1).unwrap(),
        ];
        let params = quick_params()
            .with_initial_assignments(initial)
            .with_resolution(false);
        let result = engine
            .generate_schedule(Algorithm::Optimizer, &params)
            .unwrap();
        // Starting point has a double booking; the optimizer must move off it.
        assert!(result.fitness >= 0.0);
    }

    #[test]
    fn test_unresolvable_preference_conflict_is_reported() {
        let mut engine = SchedulingEngine::new();
        engine
            .initialize_with(ReferenceCatalog::new(
                vec![Course::new("C1", 20)],
                vec![Teacher::new("T1").with_qualification("C1")],
                vec![Classroom::new("R1", 30)],
                vec![
                    TeacherPreference::new("T1", 1, 1, 0.1),
                    TeacherPreference::new("T1", 1, 2, 0.1),
                ],
                TimeSlotCatalog::weekly(1, 2),
            ))
            .unwrap();
        let params = ScheduleParams::default();
        let result = engine.generate_schedule(Algorithm::Greedy, &params).unwrap();
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.metadata.conflicts_before_resolution, Some(1));
        assert_eq!(result.metadata.conflicts_resolved, Some(0));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].conflict_type(), ConflictType::TimePreference);
        // Low severity keeps the schedule valid.
        assert!(result.is_valid());
    }

    #[test]
    fn test_shared_teacher_single_slot_conflict() {
        let mut engine = SchedulingEngine::new();
        engine
            .initialize_with(ReferenceCatalog::new(
                vec![Course::new("C1", 20), Course::new("C2", 20)],
                vec![Teacher::new("T1").with_qualifications(["C1", "C2"])],
                vec![Classroom::new("R1", 30), Classroom::new("R2", 30)],
                vec![TeacherPreference::new("T1", 2, 3, 1.0)],
                TimeSlotCatalog::weekly(5, 4),
            ))
            .unwrap();
        let schedule = vec![
            Assignment::new("C1", "T1", "R1", 2, 3).unwrap(),
            Assignment::new("C2", "T1", "R2", 2, 3).unwrap(),
        ];
        let report = engine
            .detect_conflicts(&schedule, &DetectorConfig::default())
            .unwrap();
        let teacher_time: Vec<_> = report.of_type(ConflictType::TeacherTime).collect();
        assert_eq!(teacher_time.len(), 1);
        assert_eq!(teacher_time[0].assignments().len(), 2);
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn test_unusable_classroom_start_is_invalid() {
        let mut engine = SchedulingEngine::new();
        engine
            .initialize(
                vec![Course::new("C1", 20)],
                vec![Teacher::new("T1").with_qualification("C1")],
                vec![Classroom::new("R1", 30).with_available(false)],
                vec![],
            )
            .unwrap();
        let params = quick_params()
            .with_initial_assignments(vec![Assignment::new("C1", "T1", "R1", 1, 1).unwrap()]);
        let result = engine
            .generate_schedule(Algorithm::Optimizer, &params)
            .unwrap();

        let manager = engine.manager(&params.constraints).unwrap();
        assert!(manager.hard_violation_count(&result.assignments) > 0);
        assert!(result.fitness < 0.0);
        assert!(!result.is_valid());
        assert!(result
            .conflicts
            .iter()
            .any(|c| c.conflict_type() == ConflictType::ClassroomUnavailable));
    }

    #[test]
    fn test_hard_violations_imply_invalid_result() {
        let engine = three_course_engine();
        let schedules = [
            vec![
                Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
                Assignment::new("C2", "T1", "R1", 1, 1).unwrap(),
            ],
            vec![Assignment::new("C1", "T1", "R1", 6, 1).unwrap()],
            vec![Assignment::new("C1", "T9", "R9", 1, 1).unwrap()],
        ];
        for initial in schedules {
            let params = quick_params()
                .with_initial_assignments(initial)
                .with_resolution(false)
                .with_optimizer(OptimizerConfig::default().with_max_iterations(1).with_seed(3));
            let result = engine
                .generate_schedule(Algorithm::Optimizer, &params)
                .unwrap();
            let manager = engine.manager(&params.constraints).unwrap();
            if manager.hard_violation_count(&result.assignments) > 0 {
                assert!(!result.is_valid(), "{:?}", result.assignments);
            }
        }
    }

    #[test]
    fn test_oversized_course_fails_placement() {
        let mut engine = SchedulingEngine::new();
        engine
            .initialize(
                vec![Course::new("BIG", 120)],
                vec![Teacher::new("T1").with_qualification("BIG")],
                vec![Classroom::new("R1", 80)],
                vec![],
            )
            .unwrap();
        let result = engine
            .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
            .unwrap();
        assert!(result.assignments.is_empty());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].course_id, "BIG");
    }

    #[test]
    fn test_record_set_round_trip() {
        let engine = three_course_engine();
        let result = engine
            .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
            .unwrap();
        let json = serde_json::to_string(&result.to_record_set()).unwrap();
        let set: RecordSet = serde_json::from_str(&json).unwrap();
        let restored = ScheduleResult::from_record_set(&set).unwrap();
        assert_eq!(restored.assignments, result.assignments);
        assert_eq!(restored.fitness, result.fitness);
        assert_eq!(restored.algorithm, "greedy");
    }

    #[test]
    fn test_analyze_schedule() {
        let engine = three_course_engine();
        let result = engine
            .generate_schedule(Algorithm::Greedy, &ScheduleParams::default())
            .unwrap();
        let report = engine.analyze_schedule(&result).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.assignment_count, 3);
        assert_eq!(report.analysis.total, 0);
        assert!(report.evaluation.is_feasible());
        assert_eq!(report.utilization.classrooms.len(), 1);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"utilization\""));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("Greedy".parse::<Algorithm>().unwrap(), Algorithm::Greedy);
        assert_eq!(" parallel ".parse::<Algorithm>().unwrap(), Algorithm::Parallel);
        assert_eq!("local_search".parse::<Algorithm>().unwrap(), Algorithm::Optimizer);
        assert!(matches!(
            "quantum".parse::<Algorithm>(),
            Err(ScheduleError::UnknownAlgorithm(name)) if name == "quantum"
        ));
    }

    #[test]
    fn test_params_from_json() {
        let params = ScheduleParams::from_json(
            r#"{"genetic": {"population_size": 20}, "post_optimize": true,
                "hybrid": {"stages": ["greedy", "local_search"]}}"#,
        )
        .unwrap();
        assert_eq!(params.genetic.population_size, 20);
        assert_eq!(params.genetic.max_generations, 1000);
        assert!(params.post_optimize);
        assert!(params.resolve_conflicts);
        assert_eq!(params.hybrid.stages.len(), 2);
        assert!(ScheduleParams::from_json("{not json").is_err());
    }

    #[derive(Debug, Default)]
    struct Stages(Mutex<Vec<StageStats>>);

    impl ProgressObserver for Stages {
        fn on_stage_complete(&self, stats: &StageStats) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(stats.clone());
            }
        }
    }

    #[test]
    fn test_observer_receives_stages() {
        let stages = Arc::new(Stages::default());
        let engine = three_course_engine().with_observer(stages.clone());
        engine
            .generate_schedule(Algorithm::Hybrid, &quick_params().with_post_optimization(true))
            .unwrap();
        assert_eq!(stages.0.lock().unwrap().len(), 3);
    }
}
