//! Trajectory shared between the optimizer and the u-metaheur runners.
//!
//! A [`Walk`] implements the annealing, tabu and variable neighbourhood
//! problem traits over complete schedules. The runners own acceptance;
//! the walk counts iterations, keeps the best schedule ever evaluated,
//! reports progress and halts a runner when the run must stop or the
//! strategy selection moves on.

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use u_metaheur::sa::SaProblem;
use u_metaheur::tabu::{TabuMove, TabuProblem};
use u_metaheur::vns::VnsProblem;

use super::neighborhood::{solution_hash, Neighborhood};
use super::search::{Optimizer, StopReason};
use super::SearchStrategy;
use crate::models::Assignment;
use crate::orchestration::IterationStats;

/// Minimum gain counted as an improvement.
pub(super) const IMPROVEMENT_EPS: f64 = 1e-12;

/// Runner costs are `-fitness × ANNEALING_SCALE`, so a temperature of 100
/// is meaningful on the `[0, 1]` soft-score scale.
pub(super) const ANNEALING_SCALE: f64 = 100.0;

/// An iteration whose outcome is known once the next one starts.
#[derive(Debug, Clone, Copy)]
struct Pending {
    strategy: SearchStrategy,
    best_before: f64,
    temperature: Option<f64>,
}

#[derive(Debug)]
struct Progress {
    current: Vec<Assignment>,
    current_fitness: f64,
    best: Vec<Assignment>,
    best_fitness: f64,
    iterations: usize,
    improvements: usize,
    stagnant: usize,
    usage: BTreeMap<String, usize>,
    stop: Option<StopReason>,
    pending: Option<Pending>,
    /// Schedules scored since the last iteration began.
    evaluated: Vec<(u64, f64)>,
    /// Annealing temperature for the next annealing iteration.
    temperature: f64,
    /// Set by a shake; the following local search may run.
    armed: bool,
}

/// Totals of a finished walk.
#[derive(Debug)]
pub(super) struct WalkOutcome {
    pub best: Vec<Assignment>,
    pub best_fitness: f64,
    pub iterations: usize,
    pub improvements: usize,
    pub usage: BTreeMap<String, usize>,
    pub stop: StopReason,
}

pub(super) struct Walk<'a> {
    optimizer: &'a Optimizer,
    progress: Mutex<Progress>,
    deadline: Option<Instant>,
    /// Raised to stop the annealing runner.
    cancel: Arc<AtomicBool>,
    /// Draws for the variable neighbourhood local search.
    rng: Mutex<SmallRng>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<'a> Walk<'a> {
    pub(super) fn new(
        optimizer: &'a Optimizer,
        initial: &[Assignment],
        initial_fitness: f64,
        deadline: Option<Instant>,
        rng: SmallRng,
    ) -> Self {
        Self {
            optimizer,
            progress: Mutex::new(Progress {
                current: initial.to_vec(),
                current_fitness: initial_fitness,
                best: initial.to_vec(),
                best_fitness: initial_fitness,
                iterations: 0,
                improvements: 0,
                stagnant: 0,
                usage: BTreeMap::new(),
                stop: None,
                pending: None,
                evaluated: Vec::new(),
                temperature: optimizer.config().initial_temperature,
                armed: false,
            }),
            deadline,
            cancel: Arc::new(AtomicBool::new(false)),
            rng: Mutex::new(rng),
        }
    }

    pub(super) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub(super) fn iterations(&self) -> usize {
        lock(&self.progress).iterations
    }

    pub(super) fn current(&self) -> Vec<Assignment> {
        lock(&self.progress).current.clone()
    }

    /// Current schedule and its fitness.
    pub(super) fn position(&self) -> (Vec<Assignment>, f64) {
        let p = lock(&self.progress);
        (p.current.clone(), p.current_fitness)
    }

    /// Temperature for a new annealing run; reheats once the floor is hit.
    pub(super) fn annealing_start(&self) -> f64 {
        let config = self.optimizer.config();
        let mut p = lock(&self.progress);
        if p.temperature <= config.min_temperature {
            tracing::debug!(iteration = p.iterations, "annealing reheated");
            p.temperature = config.initial_temperature;
        }
        p.temperature
    }

    /// Closes the last iteration of a runner and picks the next strategy,
    /// or `None` once the walk has stopped.
    pub(super) fn next_strategy(&self) -> Option<SearchStrategy> {
        self.cancel.store(false, Ordering::Relaxed);
        let (next, stats) = {
            let mut p = lock(&self.progress);
            let current = p.current.clone();
            let stats = self.settle(&mut p, &current);
            let next = match self.admit(&p) {
                Ok(strategy) => Some(strategy),
                Err(reason) => {
                    p.stop = Some(reason);
                    None
                }
            };
            (next, stats)
        };
        self.report(stats);
        next
    }

    /// Starts an iteration of `strategy` from `current`. Returns `false`
    /// when the walk stops or another strategy takes over.
    pub(super) fn tick(&self, current: &[Assignment], strategy: SearchStrategy) -> bool {
        let (go, stats) = {
            let mut p = lock(&self.progress);
            let stats = self.settle(&mut p, current);
            let go = match self.admit(&p) {
                Ok(next) if next == strategy => {
                    self.begin(&mut p, strategy);
                    true
                }
                Ok(_) => false,
                Err(reason) => {
                    p.stop = Some(reason);
                    false
                }
            };
            (go, stats)
        };
        if !go {
            self.cancel.store(true, Ordering::Relaxed);
        }
        self.report(stats);
        go
    }

    /// Fitness of `schedule`, recording it as the best when it is.
    pub(super) fn score(&self, schedule: &[Assignment]) -> f64 {
        let fitness = self.optimizer.manager().fitness(schedule);
        let mut p = lock(&self.progress);
        p.evaluated.push((solution_hash(schedule), fitness));
        if fitness > p.best_fitness + IMPROVEMENT_EPS {
            p.best = schedule.to_vec();
            p.best_fitness = fitness;
        }
        fitness
    }

    pub(super) fn finish(self) -> WalkOutcome {
        let p = self
            .progress
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        WalkOutcome {
            best: p.best,
            best_fitness: p.best_fitness,
            iterations: p.iterations,
            improvements: p.improvements,
            usage: p.usage,
            stop: p.stop.unwrap_or(StopReason::MaxIterations),
        }
    }

    fn admit(&self, p: &Progress) -> Result<SearchStrategy, StopReason> {
        let config = self.optimizer.config();
        if let Some(reason) = p.stop {
            return Err(reason);
        }
        if p.iterations >= config.max_iterations {
            return Err(StopReason::MaxIterations);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StopReason::TimeLimit);
        }
        if p.stagnant >= config.no_improvement_limit {
            return Err(StopReason::NoImprovement);
        }
        Ok(config.strategy_for(p.iterations, p.stagnant))
    }

    fn begin(&self, p: &mut Progress, strategy: SearchStrategy) {
        let temperature = (strategy == SearchStrategy::SimulatedAnnealing).then(|| {
            let t = p.temperature;
            p.temperature = t * self.optimizer.config().cooling_rate;
            t
        });
        p.pending = Some(Pending {
            strategy,
            best_before: p.best_fitness,
            temperature,
        });
        p.iterations += 1;
        *p.usage.entry(strategy.as_str().to_string()).or_insert(0) += 1;
    }

    /// Completes the pending iteration with `current` as where it ended.
    fn settle(&self, p: &mut Progress, current: &[Assignment]) -> Option<IterationStats> {
        let pending = p.pending.take()?;
        let hash = solution_hash(current);
        let known = p
            .evaluated
            .iter()
            .rev()
            .find(|(h, _)| *h == hash)
            .map(|&(_, f)| f);
        p.evaluated.clear();
        if current != p.current.as_slice() {
            p.current_fitness = known.unwrap_or_else(|| self.optimizer.manager().fitness(current));
            p.current = current.to_vec();
        }
        if p.best_fitness > pending.best_before + IMPROVEMENT_EPS {
            p.improvements += 1;
            p.stagnant = 0;
        } else {
            p.stagnant += 1;
        }
        Some(IterationStats {
            iteration: p.iterations,
            strategy: pending.strategy.as_str(),
            current_fitness: p.current_fitness,
            best_fitness: p.best_fitness,
            temperature: pending.temperature,
        })
    }

    fn report(&self, stats: Option<IterationStats>) {
        if let Some(stats) = stats {
            self.optimizer.observer().on_iteration(&stats);
        }
    }

    fn propose<R: Rng + ?Sized>(&self, schedule: &[Assignment], rng: &mut R) -> Option<Vec<Assignment>> {
        let &n = Neighborhood::ALL.choose(rng)?;
        n.propose(schedule, self.optimizer.space(), rng)
    }

    fn cost_of(&self, schedule: &[Assignment]) -> f64 {
        -self.score(schedule) * ANNEALING_SCALE
    }
}

impl SaProblem for Walk<'_> {
    type Solution = Vec<Assignment>;

    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> Vec<Assignment> {
        self.current()
    }

    fn cost(&self, solution: &Vec<Assignment>) -> f64 {
        self.cost_of(solution)
    }

    fn neighbor<R: Rng>(&self, solution: &Vec<Assignment>, rng: &mut R) -> Vec<Assignment> {
        if !self.tick(solution, SearchStrategy::SimulatedAnnealing) {
            return solution.clone();
        }
        self.propose(solution, rng).unwrap_or_else(|| solution.clone())
    }
}

impl TabuProblem for Walk<'_> {
    type Solution = Vec<Assignment>;

    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> Vec<Assignment> {
        self.current()
    }

    fn cost(&self, solution: &Vec<Assignment>) -> f64 {
        self.cost_of(solution)
    }

    /// Sampled neighbours keyed by schedule fingerprint, so recently
    /// visited schedules are tabu.
    fn neighbors<R: Rng>(&self, solution: &Vec<Assignment>, rng: &mut R) -> Vec<TabuMove<Vec<Assignment>>> {
        if !self.tick(solution, SearchStrategy::TabuSearch) {
            return Vec::new();
        }
        let k = self.optimizer.config().neighborhood_sample.max(1);
        (0..k)
            .filter_map(|_| self.propose(solution, rng))
            .map(|next| TabuMove {
                key: format!("{:016x}", solution_hash(&next)),
                cost: self.cost_of(&next),
                solution: next,
            })
            .collect()
    }
}

impl VnsProblem for Walk<'_> {
    type Solution = Vec<Assignment>;

    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> Vec<Assignment> {
        self.current()
    }

    fn cost(&self, solution: &Vec<Assignment>) -> f64 {
        self.cost_of(solution)
    }

    fn neighborhood_count(&self) -> usize {
        Neighborhood::ALL.len()
    }

    /// One random move in structure `k`.
    fn shake<R: Rng>(&self, solution: &Vec<Assignment>, k: usize, rng: &mut R) -> Vec<Assignment> {
        let go = self.tick(solution, SearchStrategy::VariableNeighborhood);
        lock(&self.progress).armed = go;
        if !go {
            return solution.clone();
        }
        Neighborhood::ALL[k % Neighborhood::ALL.len()]
            .propose(solution, self.optimizer.space(), rng)
            .unwrap_or_else(|| solution.clone())
    }

    /// Best of a sampled neighbourhood of `solution`, if it improves.
    fn local_search(&self, solution: &Vec<Assignment>) -> Vec<Assignment> {
        if !std::mem::take(&mut lock(&self.progress).armed) {
            return solution.clone();
        }
        let k = self.optimizer.config().neighborhood_sample.max(1);
        let base = self.optimizer.manager().fitness(solution);
        let mut rng = lock(&self.rng);
        (0..k)
            .filter_map(|_| self.propose(solution, &mut *rng))
            .map(|next| {
                let f = self.optimizer.manager().fitness(&next);
                (next, f)
            })
            .filter(|(_, f)| *f > base + IMPROVEMENT_EPS)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or_else(|| solution.clone(), |(next, _)| next)
    }
}
