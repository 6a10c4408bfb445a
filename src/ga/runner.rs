//! Generational GA loop.
//!
//! # Algorithm
//!
//! 1. Seed the population: caller-supplied schedules, then randomized
//!    greedy constructions (`greedy_seed_ratio`), then random genomes.
//! 2. [`GaRunner`] evolves it: elites carried over, the rest filled with
//!    selected, recombined and mutated children; it stops on
//!    `convergence_threshold` stagnant generations.
//! 3. A run-scoped adapter adds the timetabling controls: adaptive
//!    mutation gating, target fitness, the wall-clock limit and progress
//!    reports. Target and time stops cancel the runner.
//! 4. Runs can be split into epochs with [`GeneticAlgorithm::evolve`]. The
//!    best distinct individuals seen in an epoch seed the next one.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use u_metaheur::ga::{GaConfig as RunnerConfig, GaProblem as EvolutionProblem, GaRunner};

use super::{GaConfig, GaProblem, Individual};
use crate::constraints::ConstraintManager;
use crate::models::{Assignment, PlacementFailure};
use crate::orchestration::{GenerationStats, NoopObserver, ProgressObserver};
use crate::scheduler::{GreedyConfig, GreedyScheduler};

/// Why a GA run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceReason {
    TargetReached,
    Stagnation,
    MaxGenerations,
    TimeLimit,
    /// No course had a non-empty gene domain.
    EmptyProblem,
}

impl ConvergenceReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvergenceReason::TargetReached => "target_reached",
            ConvergenceReason::Stagnation => "stagnation",
            ConvergenceReason::MaxGenerations => "max_generations",
            ConvergenceReason::TimeLimit => "time_limit",
            ConvergenceReason::EmptyProblem => "empty_problem",
        }
    }
}

impl fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evaluated population.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    /// Wraps individuals; callers are expected to have evaluated them.
    pub fn new(individuals: Vec<Individual>) -> Self {
        Self { individuals }
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .max_by(|a, b| a.fitness_or_worst().total_cmp(&b.fitness_or_worst()))
    }

    pub fn mean_fitness(&self) -> f64 {
        if self.individuals.is_empty() {
            return 0.0;
        }
        self.individuals
            .iter()
            .map(Individual::fitness_or_worst)
            .sum::<f64>()
            / self.individuals.len() as f64
    }

    /// Indices sorted by fitness, best first.
    fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| {
            self.individuals[b]
                .fitness_or_worst()
                .total_cmp(&self.individuals[a].fitness_or_worst())
        });
        order
    }

    /// Copies of the `n` best individuals.
    pub fn top(&self, n: usize) -> Vec<Individual> {
        self.ranking()
            .into_iter()
            .take(n)
            .map(|i| self.individuals[i].clone())
            .collect()
    }

    /// Replaces the worst individuals with `incoming` (at most `len()`).
    pub fn replace_worst(&mut self, incoming: Vec<Individual>) {
        let ranking = self.ranking();
        for (slot, individual) in ranking.into_iter().rev().zip(incoming) {
            self.individuals[slot] = individual;
        }
    }

    /// Admits a copy of `candidate` with the given fitness when its genes
    /// are new and it beats the worst member of a full population. Holds
    /// at most `capacity` individuals.
    pub fn offer(&mut self, candidate: &Individual, fitness: f64, capacity: usize) -> bool {
        if capacity == 0 {
            return false;
        }
        let worst = if self.individuals.len() < capacity {
            None
        } else {
            let Some((slot, member)) = self
                .individuals
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.fitness_or_worst().total_cmp(&b.1.fitness_or_worst()))
            else {
                return false;
            };
            if fitness <= member.fitness_or_worst() {
                return false;
            }
            Some(slot)
        };
        if self.individuals.iter().any(|i| i.genes() == candidate.genes()) {
            return false;
        }
        let kept = candidate.clone().with_fitness(fitness);
        match worst {
            Some(slot) => self.individuals[slot] = kept,
            None => self.individuals.push(kept),
        }
        true
    }
}

/// Resumable state of one GA run.
#[derive(Debug, Clone)]
pub struct EvolutionState {
    population: Population,
    best: Individual,
    generation: usize,
    stagnant: usize,
    history: Vec<f64>,
    reason: Option<ConvergenceReason>,
    started: Instant,
}

impl EvolutionState {
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Best individual ever seen.
    pub fn best(&self) -> &Individual {
        &self.best
    }

    pub fn best_fitness(&self) -> f64 {
        self.best.fitness_or_worst()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best fitness after each generation.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn is_finished(&self) -> bool {
        self.reason.is_some()
    }

    pub fn convergence_reason(&self) -> Option<ConvergenceReason> {
        self.reason
    }

    /// Replaces the worst individuals with evaluated migrants.
    pub fn immigrate(&mut self, migrants: Vec<Individual>) {
        for m in &migrants {
            if m.fitness_or_worst() > self.best.fitness_or_worst() {
                self.best = m.clone();
                self.stagnant = 0;
            }
        }
        self.population.replace_worst(migrants);
    }
}

/// Outcome of a GA run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaResult {
    /// Best schedule ever seen.
    pub best: Vec<Assignment>,
    pub best_fitness: f64,
    pub generations: usize,
    pub convergence_reason: ConvergenceReason,
    /// Best fitness after each generation (non-decreasing).
    pub history: Vec<f64>,
    /// Courses with no gene domain.
    pub failures: Vec<PlacementFailure>,
    pub elapsed: Duration,
}

impl GaResult {
    pub fn is_feasible(&self) -> bool {
        self.best_fitness >= 0.0
    }
}

/// Genetic algorithm over course-indexed genomes.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use u_timetable::constraints::ConstraintManager;
/// use u_timetable::ga::{GaConfig, GeneticAlgorithm};
/// use u_timetable::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
///
/// let data = ReferenceCatalog::new(
///     vec![Course::new("C1", 30), Course::new("C2", 30)],
///     vec![Teacher::new("T1")],
///     vec![Classroom::new("R1", 40)],
///     vec![],
///     TimeSlotCatalog::weekly(5, 4),
/// );
/// let manager = Arc::new(ConstraintManager::new(Arc::new(data)));
/// let config = GaConfig::default()
///     .with_population_size(20)
///     .with_max_generations(30)
///     .with_seed(42);
/// let result = GeneticAlgorithm::from_manager(manager, config).run();
/// assert_eq!(result.best.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    problem: Arc<GaProblem>,
    config: GaConfig,
    greedy: GreedyConfig,
    observer: Arc<dyn ProgressObserver>,
    island: Option<usize>,
}

impl GeneticAlgorithm {
    /// Creates the algorithm; the problem's hooks use `config.operators`.
    pub fn new(problem: Arc<GaProblem>, config: GaConfig) -> Self {
        let problem = if *problem.operators() == config.operators {
            problem
        } else {
            Arc::new((*problem).clone().with_operators(config.operators))
        };
        Self {
            problem,
            config,
            greedy: GreedyConfig::default(),
            observer: Arc::new(NoopObserver),
            island: None,
        }
    }

    pub fn from_manager(manager: Arc<ConstraintManager>, config: GaConfig) -> Self {
        Self::new(Arc::new(GaProblem::new(manager)), config)
    }

    /// Greedy settings used for seeding.
    pub fn with_greedy(mut self, greedy: GreedyConfig) -> Self {
        self.greedy = greedy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Tags generation reports with an island index. Island runs evaluate
    /// on their own worker thread.
    pub fn with_island(mut self, island: usize) -> Self {
        self.island = Some(island);
        self
    }

    pub fn problem(&self) -> &Arc<GaProblem> {
        &self.problem
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// RNG from the configured seed, or OS entropy.
    pub fn rng(&self) -> SmallRng {
        match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        }
    }

    fn population_size(&self) -> usize {
        self.config.population_size.max(2)
    }

    /// Runs to termination from a freshly seeded population.
    pub fn run(&self) -> GaResult {
        self.run_seeded(&[])
    }

    /// Runs to termination with `seeds` placed first in the population.
    #[tracing::instrument(level = "debug", skip_all, fields(genes = self.problem.gene_count(), seeds = seeds.len()))]
    pub fn run_seeded(&self, seeds: &[Vec<Assignment>]) -> GaResult {
        let mut rng = self.rng();
        let mut state = self.start(seeds, &mut rng);
        self.evolve(&mut state, usize::MAX);
        let result = self.finish(state);
        tracing::debug!(
            generations = result.generations,
            best = result.best_fitness,
            reason = %result.convergence_reason,
            "genetic run finished"
        );
        result
    }

    /// Builds and evaluates the initial population.
    pub fn initialize<R: Rng + ?Sized>(&self, seeds: &[Vec<Assignment>], rng: &mut R) -> Population {
        let n = self.population_size();
        let mut individuals: Vec<Individual> = Vec::with_capacity(n);

        for seed in seeds.iter().take(n) {
            individuals.push(self.problem.from_assignments(seed, rng));
        }

        let greedy_target =
            ((n as f64 * super::config::unit_rate(self.config.greedy_seed_ratio)).round() as usize)
                .min(n);
        if individuals.len() < greedy_target {
            let greedy = GreedyScheduler::new(self.problem.manager().clone(), self.greedy.clone());
            let mut first = true;
            while individuals.len() < greedy_target {
                let outcome = if first {
                    greedy.schedule()
                } else {
                    greedy.schedule_randomized(rng)
                };
                first = false;
                individuals.push(self.problem.from_assignments(&outcome.assignments, rng));
            }
        }

        while individuals.len() < n {
            individuals.push(self.problem.random_individual(rng));
        }

        for ind in &mut individuals {
            self.problem.score(ind);
        }
        Population::new(individuals)
    }

    /// Initial state; already finished when the target is met at once or
    /// the genome is empty.
    pub fn start<R: Rng + ?Sized>(&self, seeds: &[Vec<Assignment>], rng: &mut R) -> EvolutionState {
        let started = Instant::now();
        let population = self.initialize(seeds, rng);
        let mut best = population
            .best()
            .cloned()
            .unwrap_or_else(|| Individual::new(Vec::new()));
        self.problem.score(&mut best);

        let reason = if self.problem.gene_count() == 0 {
            Some(ConvergenceReason::EmptyProblem)
        } else if best.fitness_or_worst() >= self.config.target_fitness {
            Some(ConvergenceReason::TargetReached)
        } else {
            None
        };

        EvolutionState {
            population,
            best,
            generation: 0,
            stagnant: 0,
            history: Vec::new(),
            reason,
            started,
        }
    }

    /// Advances at most `generations` generations with [`GaRunner`],
    /// stopping early when a termination condition is met.
    ///
    /// The runner starts from the state's population. When the run can be
    /// resumed, the best distinct individuals it evaluated become the
    /// state's population for the next call.
    pub fn evolve(&self, state: &mut EvolutionState, generations: usize) {
        if state.reason.is_some() || generations == 0 {
            return;
        }
        let remaining = self.config.max_generations.saturating_sub(state.generation);
        if remaining == 0 {
            state.reason = Some(ConvergenceReason::MaxGenerations);
            return;
        }
        let deadline = self.config.time_limit.map(|limit| state.started + limit);
        if deadline.is_some_and(|d| Instant::now() >= d) {
            state.reason = Some(ConvergenceReason::TimeLimit);
            return;
        }

        let budget = generations.min(remaining);
        let stagnation_limit = self
            .config
            .convergence_threshold
            .saturating_sub(state.stagnant)
            .max(1);
        let seed = self
            .config
            .seed
            .map(|s| s.wrapping_add(state.generation as u64));
        let runner = self.runner_config(budget, stagnation_limit, seed);

        let (outcome, stagnant, halted, archive) = {
            let evolution = Evolution {
                ga: self,
                seeds: state.population.individuals(),
                next_seed: AtomicUsize::new(0),
                population_size: runner.population_size,
                evaluations: AtomicUsize::new(0),
                offspring: Mutex::new((0.0, 0)),
                archive: (budget < remaining).then(|| Mutex::new(Population::default())),
                progress: Mutex::new(Progress {
                    generation: state.generation,
                    best: state.best.fitness_or_worst(),
                    stagnant: state.stagnant,
                }),
                deadline,
                cancel: Arc::new(AtomicBool::new(false)),
                reason: OnceLock::new(),
            };
            let outcome =
                GaRunner::run_with_cancel(&evolution, &runner, Some(evolution.cancel.clone()));
            let stagnant = lock(&evolution.progress).stagnant;
            let halted = evolution.reason.get().copied();
            let archive = evolution
                .archive
                .map(|a| a.into_inner().unwrap_or_else(PoisonError::into_inner));
            (outcome, stagnant, halted, archive)
        };

        let mut running = state.best.fitness_or_worst();
        for cost in outcome.fitness_history.iter().skip(1) {
            running = running.max(-cost);
            state.history.push(running);
        }
        if outcome.best.fitness_or_worst() > state.best.fitness_or_worst() {
            state.best = outcome.best;
        }
        if let Some(archive) = archive.filter(|a| !a.is_empty()) {
            state.population = archive;
        }
        state.generation += outcome.generations;
        state.stagnant = stagnant;
        state.reason = halted
            .or_else(|| outcome.stagnated.then_some(ConvergenceReason::Stagnation))
            .or_else(|| {
                (state.generation >= self.config.max_generations)
                    .then_some(ConvergenceReason::MaxGenerations)
            });
    }

    fn runner_config(&self, generations: usize, stagnation_limit: usize, seed: Option<u64>) -> RunnerConfig {
        let n = self.population_size();
        let elites = self.config.elite_count().min(n - 1);
        let config = RunnerConfig::default()
            .with_population_size(n)
            .with_max_generations(generations.max(1))
            .with_selection(self.config.operators.selection.into())
            .with_elite_ratio((elites as f64 + 0.5) / n as f64)
            .with_crossover_rate(self.config.crossover_probability())
            // Mutation is gated by the adaptive rate inside the adapter.
            .with_mutation_rate(1.0)
            .with_stagnation_limit(stagnation_limit)
            .with_convergence_threshold(0.0)
            .with_parallel(self.island.is_none());
        match seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }

    /// Converts a state into a result.
    pub fn finish(&self, state: EvolutionState) -> GaResult {
        GaResult {
            best_fitness: state.best.fitness_or_worst(),
            best: state.best.into_genes(),
            generations: state.generation,
            convergence_reason: state.reason.unwrap_or(ConvergenceReason::MaxGenerations),
            history: state.history,
            failures: self.problem.failures().to_vec(),
            elapsed: state.started.elapsed(),
        }
    }
}

/// Generation counters shared with the runner callbacks.
#[derive(Debug)]
struct Progress {
    /// Generations completed before this run.
    generation: usize,
    best: f64,
    stagnant: usize,
}

/// One [`GeneticAlgorithm::evolve`] call as seen by [`GaRunner`].
struct Evolution<'a> {
    ga: &'a GeneticAlgorithm,
    /// Handed out before any random genome.
    seeds: &'a [Individual],
    next_seed: AtomicUsize,
    population_size: usize,
    evaluations: AtomicUsize,
    /// Fitness sum and count of this generation's offspring.
    offspring: Mutex<(f64, usize)>,
    archive: Option<Mutex<Population>>,
    progress: Mutex<Progress>,
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
    reason: OnceLock<ConvergenceReason>,
}

impl Evolution<'_> {
    fn halt(&self, reason: ConvergenceReason) {
        let _ = self.reason.set(reason);
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EvolutionProblem for Evolution<'_> {
    type Individual = Individual;

    fn create_individual<R: Rng>(&self, rng: &mut R) -> Individual {
        let i = self.next_seed.fetch_add(1, Ordering::Relaxed);
        match self.seeds.get(i) {
            Some(seed) => seed.clone(),
            None => self.ga.problem.random_individual(rng),
        }
    }

    fn evaluate(&self, individual: &Individual) -> f64 {
        let cost = EvolutionProblem::evaluate(self.ga.problem.as_ref(), individual);
        // The first `population_size` evaluations are the initial population.
        if self.evaluations.fetch_add(1, Ordering::Relaxed) >= self.population_size {
            let mut offspring = lock(&self.offspring);
            offspring.0 -= cost;
            offspring.1 += 1;
        }
        if let Some(archive) = &self.archive {
            lock(archive).offer(individual, -cost, self.population_size);
        }
        cost
    }

    fn crossover<R: Rng>(&self, p1: &Individual, p2: &Individual, rng: &mut R) -> Vec<Individual> {
        EvolutionProblem::crossover(self.ga.problem.as_ref(), p1, p2, rng)
    }

    fn mutate<R: Rng>(&self, individual: &mut Individual, rng: &mut R) {
        let rate = self.ga.config.mutation_rate_for(lock(&self.progress).stagnant);
        if rng.random_bool(rate) {
            EvolutionProblem::mutate(self.ga.problem.as_ref(), individual, rng);
        }
    }

    fn on_generation(&self, generation: usize, best_cost: f64) {
        let stats = {
            let mut progress = lock(&self.progress);
            let mutation_rate = self.ga.config.mutation_rate_for(progress.stagnant);
            if -best_cost > progress.best {
                progress.best = -best_cost;
                progress.stagnant = 0;
            } else {
                progress.stagnant += 1;
            }
            let (sum, count) = std::mem::take(&mut *lock(&self.offspring));
            GenerationStats {
                island: self.ga.island,
                generation: progress.generation + generation,
                best_fitness: progress.best,
                mean_fitness: if count > 0 { sum / count as f64 } else { progress.best },
                mutation_rate,
            }
        };
        self.ga.observer.on_generation(&stats);

        if stats.best_fitness >= self.ga.config.target_fitness {
            self.halt(ConvergenceReason::TargetReached);
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.halt(ConvergenceReason::TimeLimit);
        }
    }
}
