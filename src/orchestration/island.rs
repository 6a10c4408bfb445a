//! Parallel island-model GA.
//!
//! # Algorithm
//!
//! 1. Start one independent population per island (distinct RNG streams).
//! 2. Evolve every island for `migration_interval` generations in parallel;
//!    each worker owns its island for the whole epoch.
//! 3. Between epochs, copy the top `migrants` of each source island over
//!    the worst individuals of its destinations (per [`MigrationTopology`]).
//! 4. Stop when any island reaches the target fitness or every island
//!    has terminated; the result is the best island's best individual.
//!
//! If a worker panics the whole run falls back to a single-population GA.
//!
//! # Reference
//! Whitley, Rana & Heckendorn (1999), "The island model genetic algorithm:
//! On separability, population size and convergence"

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::{NoopObserver, ProgressObserver};
use crate::constraints::ConstraintManager;
use crate::error::{Result, ScheduleError};
use crate::ga::{ConvergenceReason, EvolutionState, GaConfig, GaProblem, GaResult, GeneticAlgorithm};
use crate::models::Assignment;
use crate::scheduler::GreedyConfig;

/// Golden-ratio increment used to derive per-island seeds.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Fixed-size pool of scoped worker threads.
///
/// One worker degrades to running jobs inline on the caller's thread; the
/// panic-to-error mapping is the same either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelExecutor {
    workers: usize,
}

impl ParallelExecutor {
    /// Pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Pool sized to the machine's available parallelism.
    pub fn available() -> Self {
        Self::new(thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job(index, input)` for every input, at most `workers` at a
    /// time, preserving input order. A panicking job yields
    /// [`ScheduleError::WorkerPanicked`] with its index.
    pub fn map<T, U, F>(&self, inputs: Vec<T>, job: F) -> Vec<Result<U>>
    where
        T: Send,
        U: Send,
        F: Fn(usize, T) -> U + Sync,
    {
        if self.workers == 1 {
            return inputs
                .into_iter()
                .enumerate()
                .map(|(i, input)| {
                    catch_unwind(AssertUnwindSafe(|| job(i, input)))
                        .map_err(|_| ScheduleError::WorkerPanicked(i))
                })
                .collect();
        }

        let mut results = Vec::with_capacity(inputs.len());
        let mut pending = inputs.into_iter().enumerate().peekable();
        let job = &job;
        while pending.peek().is_some() {
            let wave: Vec<(usize, T)> = pending.by_ref().take(self.workers).collect();
            thread::scope(|scope| {
                let handles: Vec<_> = wave
                    .into_iter()
                    .map(|(i, input)| (i, scope.spawn(move || job(i, input))))
                    .collect();
                for (i, handle) in handles {
                    results.push(handle.join().map_err(|_| ScheduleError::WorkerPanicked(i)));
                }
            });
        }
        results
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::available()
    }
}

/// Which islands exchange individuals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationTopology {
    /// Island `i` receives from island `i - 1`.
    #[default]
    Ring,
    /// Island 0 receives from all; the others receive from island 0.
    Star,
    /// Every island receives from every other.
    Complete,
}

impl MigrationTopology {
    /// Islands that send migrants to `island` out of `count`.
    pub fn sources(self, island: usize, count: usize) -> Vec<usize> {
        if count < 2 || island >= count {
            return Vec::new();
        }
        match self {
            MigrationTopology::Ring => vec![(island + count - 1) % count],
            MigrationTopology::Star if island == 0 => (1..count).collect(),
            MigrationTopology::Star => vec![0],
            MigrationTopology::Complete => (0..count).filter(|&j| j != island).collect(),
        }
    }
}

/// Island model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandConfig {
    pub islands: usize,
    /// Generations between migrations.
    pub migration_interval: usize,
    /// Individuals each source sends per migration.
    pub migrants: usize,
    pub topology: MigrationTopology,
    /// Worker threads; defaults to available parallelism.
    pub workers: Option<usize>,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            islands: 4,
            migration_interval: 10,
            migrants: 2,
            topology: MigrationTopology::Ring,
            workers: None,
        }
    }
}

impl IslandConfig {
    pub fn with_islands(mut self, islands: usize) -> Self {
        self.islands = islands;
        self
    }

    pub fn with_migration(mut self, interval: usize, migrants: usize) -> Self {
        self.migration_interval = interval;
        self.migrants = migrants;
        self
    }

    pub fn with_topology(mut self, topology: MigrationTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

/// Outcome of an island run.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandResult {
    /// Global best, reported like a single GA run.
    pub result: GaResult,
    /// Best fitness per island (empty after a fallback).
    pub island_best: Vec<f64>,
    /// Migration epochs completed.
    pub epochs: usize,
    /// Whether the run degraded to a single population.
    pub fallback: bool,
}

type Island = (GeneticAlgorithm, EvolutionState);

/// Island-model genetic algorithm.
#[derive(Debug, Clone)]
pub struct IslandModel {
    problem: Arc<GaProblem>,
    genetic: GaConfig,
    greedy: GreedyConfig,
    config: IslandConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl IslandModel {
    pub fn new(manager: Arc<ConstraintManager>, genetic: GaConfig, config: IslandConfig) -> Self {
        Self {
            problem: Arc::new(GaProblem::new(manager)),
            genetic,
            greedy: GreedyConfig::default(),
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_greedy(mut self, greedy: GreedyConfig) -> Self {
        self.greedy = greedy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    fn executor(&self) -> ParallelExecutor {
        match self.config.workers {
            Some(n) => ParallelExecutor::new(n),
            None => ParallelExecutor::available(),
        }
    }

    fn island_ga(&self, index: usize) -> GeneticAlgorithm {
        let mut config = self.genetic.clone();
        config.seed = self
            .genetic
            .seed
            .map(|s| s ^ (index as u64 + 1).wrapping_mul(SEED_MIX));
        GeneticAlgorithm::new(self.problem.clone(), config)
            .with_greedy(self.greedy.clone())
            .with_observer(self.observer.clone())
            .with_island(index)
    }

    /// Runs the islands; `seeds` go into every island's initial population.
    #[tracing::instrument(level = "debug", skip_all, fields(islands = self.config.islands))]
    pub fn run(&self, seeds: &[Vec<Assignment>]) -> IslandResult {
        let started = Instant::now();
        match self.run_islands(seeds) {
            Ok(mut result) => {
                result.result.elapsed = started.elapsed();
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "island run failed, falling back to a single population");
                let ga = GeneticAlgorithm::new(self.problem.clone(), self.genetic.clone())
                    .with_greedy(self.greedy.clone())
                    .with_observer(self.observer.clone());
                let mut result = ga.run_seeded(seeds);
                result.elapsed = started.elapsed();
                IslandResult {
                    result,
                    island_best: Vec::new(),
                    epochs: 0,
                    fallback: true,
                }
            }
        }
    }

    fn run_islands(&self, seeds: &[Vec<Assignment>]) -> Result<IslandResult> {
        let count = self.config.islands.max(1);
        let executor = self.executor();
        let interval = self.config.migration_interval.max(1);

        let mut islands: Vec<Island> = executor
            .map((0..count).collect::<Vec<usize>>(), |_, i| {
                let ga = self.island_ga(i);
                let state = ga.start(seeds, &mut ga.rng());
                (ga, state)
            })
            .into_iter()
            .collect::<Result<_>>()?;

        let mut epochs = 0;
        loop {
            let target_hit = islands
                .iter()
                .any(|(_, s)| s.convergence_reason() == Some(ConvergenceReason::TargetReached));
            if target_hit || islands.iter().all(|(_, s)| s.is_finished()) {
                break;
            }

            islands = executor
                .map(islands, |_, (ga, mut state)| {
                    ga.evolve(&mut state, interval);
                    (ga, state)
                })
                .into_iter()
                .collect::<Result<_>>()?;
            epochs += 1;

            self.migrate(&mut islands);
        }

        let island_best: Vec<f64> = islands.iter().map(|(_, s)| s.best_fitness()).collect();
        let generations = islands
            .iter()
            .map(|(_, s)| s.generation())
            .max()
            .unwrap_or(0);
        let winner = islands
            .into_iter()
            .max_by(|a, b| a.1.best_fitness().total_cmp(&b.1.best_fitness()));

        let (ga, state) = winner.ok_or(ScheduleError::WorkerPanicked(0))?;
        let mut result = ga.finish(state);
        result.generations = generations;

        tracing::debug!(epochs, best = result.best_fitness, "island run finished");
        Ok(IslandResult {
            result,
            island_best,
            epochs,
            fallback: false,
        })
    }

    fn migrate(&self, islands: &mut [Island]) {
        let count = islands.len();
        if count < 2 || self.config.migrants == 0 {
            return;
        }
        let outgoing: Vec<_> = islands
            .iter()
            .map(|(_, s)| s.population().top(self.config.migrants))
            .collect();
        for (i, (_, state)) in islands.iter_mut().enumerate() {
            if state.is_finished() {
                continue;
            }
            let incoming: Vec<_> = self
                .config
                .topology
                .sources(i, count)
                .into_iter()
                .flat_map(|j| outgoing[j].iter().cloned())
                .collect();
            state.immigrate(incoming);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
    use crate::orchestration::GenerationStats;

    fn manager() -> Arc<ConstraintManager> {
        let data = ReferenceCatalog::new(
            (1..=6).map(|i| Course::new(format!("C{i}"), 20)).collect(),
            vec![Teacher::new("T1"), Teacher::new("T2")],
            vec![Classroom::new("R1", 30), Classroom::new("R2", 30)],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        );
        Arc::new(ConstraintManager::new(Arc::new(data)))
    }

    fn genetic() -> GaConfig {
        GaConfig::default()
            .with_population_size(12)
            .with_max_generations(20)
            .with_target_fitness(2.0)
            .with_seed(42)
    }

    #[test]
    fn test_executor_preserves_order() {
        for workers in [1, 2, 8] {
            let out = ParallelExecutor::new(workers).map((0..5).collect(), |i, x: i32| {
                assert_eq!(i as i32, x);
                x * 10
            });
            let values: Vec<i32> = out.into_iter().map(|r| r.unwrap()).collect();
            assert_eq!(values, vec![0, 10, 20, 30, 40]);
        }
    }

    #[test]
    fn test_executor_maps_panics() {
        for workers in [1, 3] {
            let out = ParallelExecutor::new(workers).map(vec![0, 1, 2], |_, x: i32| {
                if x == 1 {
                    panic!("boom");
                }
                x
            });
            assert!(out[0].is_ok());
            assert!(matches!(out[1], Err(ScheduleError::WorkerPanicked(1))));
            assert!(out[2].is_ok());
        }
    }

    #[test]
    fn test_topology_sources() {
        assert_eq!(MigrationTopology::Ring.sources(0, 4), vec![3]);
        assert_eq!(MigrationTopology::Ring.sources(2, 4), vec![1]);
        assert_eq!(MigrationTopology::Star.sources(0, 4), vec![1, 2, 3]);
        assert_eq!(MigrationTopology::Star.sources(3, 4), vec![0]);
        assert_eq!(MigrationTopology::Complete.sources(1, 3), vec![0, 2]);
        assert!(MigrationTopology::Ring.sources(0, 1).is_empty());
    }

    #[test]
    fn test_island_run() {
        for topology in [
            MigrationTopology::Ring,
            MigrationTopology::Star,
            MigrationTopology::Complete,
        ] {
            let config = IslandConfig::default()
                .with_islands(3)
                .with_migration(5, 2)
                .with_topology(topology)
                .with_workers(2);
            let out = IslandModel::new(manager(), genetic(), config).run(&[]);
            assert!(!out.fallback);
            assert_eq!(out.island_best.len(), 3);
            assert_eq!(out.result.best.len(), 6);
            let global = out
                .island_best
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(out.result.best_fitness, global);
            assert!(out.epochs >= 1);
        }
    }

    #[derive(Debug)]
    struct PanicOnIsland(usize);

    impl ProgressObserver for PanicOnIsland {
        fn on_generation(&self, stats: &GenerationStats) {
            if stats.island == Some(self.0) {
                panic!("island {} failed", self.0);
            }
        }
    }

    #[test]
    fn test_worker_panic_falls_back() {
        let config = IslandConfig::default().with_islands(3).with_workers(3);
        let out = IslandModel::new(manager(), genetic(), config)
            .with_observer(Arc::new(PanicOnIsland(1)))
            .run(&[]);
        assert!(out.fallback);
        assert!(out.island_best.is_empty());
        assert_eq!(out.result.best.len(), 6);
    }

    #[test]
    fn test_single_island_runs_inline() {
        let config = IslandConfig::default().with_islands(1).with_workers(1);
        let out = IslandModel::new(manager(), genetic(), config).run(&[]);
        assert!(!out.fallback);
        assert_eq!(out.island_best.len(), 1);
    }
}
