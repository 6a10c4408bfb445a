//! Staged hybrid pipeline: constructive heuristic, evolution, local search.
//!
//! Each stage starts from the incumbent (best schedule so far) and runs
//! under its own wall-clock budget. A stage that does not beat the
//! incumbent leaves it in place. The quality threshold never cuts the
//! pipeline short; it is only reported.
//!
//! Incumbent ordering:
//!
//! | Candidate vs incumbent | Winner |
//! |------------------------|--------|
//! | feasible vs infeasible | feasible |
//! | both feasible | more sessions, then higher fitness |
//! | both infeasible | higher fitness |

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{NoopObserver, ProgressObserver, StageStats};
use crate::constraints::ConstraintManager;
use crate::ga::{GaConfig, GaProblem, GeneticAlgorithm};
use crate::models::{Assignment, PlacementFailure};
use crate::optimizer::{Optimizer, OptimizerConfig};
use crate::scheduler::{GreedyConfig, GreedyScheduler};

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Greedy,
    Genetic,
    LocalSearch,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Greedy => "greedy",
            Stage::Genetic => "genetic",
            Stage::LocalSearch => "local_search",
        }
    }
}

/// Hybrid pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Stages in execution order.
    pub stages: Vec<Stage>,
    /// Wall-clock budget per stage; tightens the stage's own limit.
    pub stage_time_limit: Option<Duration>,
    /// Fitness regarded as good enough (reported, never short-circuits).
    pub quality_threshold: Option<f64>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            stages: vec![Stage::Greedy, Stage::Genetic, Stage::LocalSearch],
            stage_time_limit: None,
            quality_threshold: None,
        }
    }
}

impl HybridConfig {
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_stage_time_limit(mut self, limit: Duration) -> Self {
        self.stage_time_limit = Some(limit);
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }
}

/// Outcome of a hybrid run.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridResult {
    pub best: Vec<Assignment>,
    pub best_fitness: f64,
    /// Stage that produced the incumbent (`None` if the initial schedule
    /// was never beaten).
    pub best_stage: Option<Stage>,
    pub stages: Vec<StageStats>,
    /// Placement failures reported alongside the incumbent.
    pub failures: Vec<PlacementFailure>,
    /// GA generations, when a genetic stage ran.
    pub generations: Option<usize>,
    /// Optimizer iterations, when a local search stage ran.
    pub iterations: Option<usize>,
    pub strategy_usage: BTreeMap<String, usize>,
    /// Stop reason of the last search stage.
    pub convergence_reason: Option<String>,
    pub elapsed: Duration,
}

struct Candidate {
    schedule: Vec<Assignment>,
    fitness: f64,
    failures: Vec<PlacementFailure>,
}

impl Candidate {
    fn is_feasible(&self) -> bool {
        self.fitness >= 0.0
    }

    fn beats(&self, other: &Candidate) -> bool {
        match (self.is_feasible(), other.is_feasible()) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => (self.schedule.len(), self.fitness) > (other.schedule.len(), other.fitness),
            (false, false) => self.fitness > other.fitness,
        }
    }
}

/// Runs the configured stages in order, carrying the incumbent forward.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use u_timetable::constraints::ConstraintManager;
/// use u_timetable::ga::GaConfig;
/// use u_timetable::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
/// use u_timetable::optimizer::OptimizerConfig;
/// use u_timetable::orchestration::{HybridConfig, HybridOptimizer};
///
/// let data = ReferenceCatalog::new(
///     vec![Course::new("C1", 30), Course::new("C2", 30)],
///     vec![Teacher::new("T1")],
///     vec![Classroom::new("R1", 40)],
///     vec![],
///     TimeSlotCatalog::weekly(5, 4),
/// );
/// let manager = Arc::new(ConstraintManager::new(Arc::new(data)));
/// let result = HybridOptimizer::new(manager, HybridConfig::default())
///     .with_genetic(GaConfig::default().with_population_size(10).with_max_generations(5).with_seed(1))
///     .with_optimizer(OptimizerConfig::default().with_max_iterations(20).with_seed(1))
///     .run(&[]);
/// assert_eq!(result.stages.len(), 3);
/// assert!(result.best_fitness >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct HybridOptimizer {
    manager: Arc<ConstraintManager>,
    config: HybridConfig,
    greedy: GreedyConfig,
    genetic: GaConfig,
    optimizer: OptimizerConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl HybridOptimizer {
    pub fn new(manager: Arc<ConstraintManager>, config: HybridConfig) -> Self {
        Self {
            manager,
            config,
            greedy: GreedyConfig::default(),
            genetic: GaConfig::default(),
            optimizer: OptimizerConfig::default(),
            observer: Arc::new(NoopObserver),
        }
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

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    fn stage_limit(&self, own: Option<Duration>) -> Option<Duration> {
        match (own, self.config.stage_time_limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs every stage starting from `initial` (may be empty).
    #[tracing::instrument(level = "debug", skip_all, fields(stages = self.config.stages.len()))]
    pub fn run(&self, initial: &[Assignment]) -> HybridResult {
        let started = Instant::now();
        let mut incumbent = Candidate {
            schedule: initial.to_vec(),
            fitness: self.manager.fitness(initial),
            failures: Vec::new(),
        };
        let mut result = HybridResult {
            best: Vec::new(),
            best_fitness: incumbent.fitness,
            best_stage: None,
            stages: Vec::with_capacity(self.config.stages.len()),
            failures: Vec::new(),
            generations: None,
            iterations: None,
            strategy_usage: BTreeMap::new(),
            convergence_reason: None,
            elapsed: Duration::ZERO,
        };

        for &stage in &self.config.stages {
            let stage_started = Instant::now();
            let candidate = self.run_stage(stage, &incumbent, &mut result);
            let stage_fitness = candidate.fitness;
            let improved = (result.best_stage.is_none() && incumbent.schedule.is_empty())
                || candidate.beats(&incumbent);
            if improved {
                incumbent = candidate;
                result.best_stage = Some(stage);
            }

            let threshold_met = self
                .config
                .quality_threshold
                .is_some_and(|t| incumbent.fitness >= t);
            let stats = StageStats {
                stage: stage.as_str().to_string(),
                fitness: stage_fitness,
                improved,
                elapsed: stage_started.elapsed(),
                threshold_met,
            };
            if threshold_met {
                tracing::info!(stage = stage.as_str(), fitness = incumbent.fitness, "quality threshold met");
            }
            self.observer.on_stage_complete(&stats);
            result.stages.push(stats);
        }

        result.best = incumbent.schedule;
        result.best_fitness = incumbent.fitness;
        result.failures = incumbent.failures;
        result.elapsed = started.elapsed();
        tracing::debug!(
            best = result.best_fitness,
            stage = result.best_stage.map(Stage::as_str),
            "hybrid run finished"
        );
        result
    }

    fn run_stage(&self, stage: Stage, incumbent: &Candidate, result: &mut HybridResult) -> Candidate {
        match stage {
            Stage::Greedy => {
                let mut config = self.greedy.clone();
                config.time_limit = self.stage_limit(config.time_limit);
                let outcome = GreedyScheduler::new(self.manager.clone(), config).schedule();
                Candidate {
                    fitness: self.manager.fitness(&outcome.assignments),
                    schedule: outcome.assignments,
                    failures: outcome.failures,
                }
            }
            Stage::Genetic => {
                let mut config = self.genetic.clone();
                config.time_limit = self.stage_limit(config.time_limit);
                let ga = GeneticAlgorithm::from_manager(self.manager.clone(), config)
                    .with_greedy(self.greedy.clone())
                    .with_observer(self.observer.clone());
                let seeds = if incumbent.schedule.is_empty() {
                    Vec::new()
                } else {
                    vec![incumbent.schedule.clone()]
                };
                let out = ga.run_seeded(&seeds);
                result.generations = Some(out.generations);
                result.convergence_reason = Some(out.convergence_reason.as_str().to_string());
                Candidate {
                    schedule: out.best,
                    fitness: out.best_fitness,
                    failures: out.failures,
                }
            }
            Stage::LocalSearch => {
                let mut config = self.optimizer.clone();
                config.time_limit = self.stage_limit(config.time_limit);
                let (start, failures) = if incumbent.schedule.is_empty() {
                    let problem = GaProblem::new(self.manager.clone());
                    let mut rng = match config.seed {
                        Some(seed) => SmallRng::seed_from_u64(seed),
                        None => SmallRng::from_os_rng(),
                    };
                    let genes = problem.random_individual(&mut rng).into_genes();
                    (genes, problem.failures().to_vec())
                } else {
                    (incumbent.schedule.clone(), incumbent.failures.clone())
                };
                let out = Optimizer::new(self.manager.clone(), config)
                    .with_observer(self.observer.clone())
                    .optimize(&start);
                result.iterations = Some(out.iterations);
                for (name, count) in &out.strategy_usage {
                    *result.strategy_usage.entry(name.clone()).or_default() += count;
                }
                result.convergence_reason = Some(out.stop_reason.as_str().to_string());
                Candidate {
                    schedule: out.best,
                    fitness: out.best_fitness,
                    failures,
                }
            }
        }
    }
}
