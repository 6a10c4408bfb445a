//! Iterated improvement of a complete schedule.
//!
//! # Algorithm
//!
//! The run is a sequence of iterations over one current schedule. Before
//! every iteration the stop rules are checked in order: iteration budget,
//! wall-clock limit, then `no_improvement_limit` iterations without a new
//! best. [`OptimizerConfig::strategy_for`] then names the strategy for the
//! iteration, and consecutive iterations of one strategy form a segment:
//!
//! 1. Best and first improvement climb inside this module: sample
//!    `neighborhood_sample` neighbours, move only on a strict gain.
//! 2. Simulated annealing, tabu search and variable neighbourhood search
//!    run on the `u_metaheur` runners, started from the current schedule.
//!    Each runner call that begins an iteration goes through the walk,
//!    which halts the runner once the segment ends.
//!
//! Runners minimise `-fitness × 100`. The annealing temperature carries
//! over between segments, cools geometrically per iteration and is reset
//! to `initial_temperature` once it reaches `min_temperature`.
//!
//! Every scored schedule is a best candidate, so the result is the best
//! schedule ever evaluated and is never worse than the input, whatever the
//! strategies accepted along the way.
//!
//! # Reference
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by simulated annealing"
//! - Glover (1989), "Tabu Search, Part I", *ORSA J. Computing* 1(3)
//! - Mladenović & Hansen (1997), "Variable neighborhood search"

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use u_metaheur::sa::{CoolingSchedule, SaConfig, SaRunner};
use u_metaheur::tabu::{TabuConfig, TabuRunner};
use u_metaheur::vns::{VnsConfig, VnsRunner};

use super::neighborhood::{MoveSpace, Neighborhood};
use super::walk::{Walk, IMPROVEMENT_EPS};
use super::{OptimizerConfig, SearchStrategy};
use crate::constraints::ConstraintManager;
use crate::models::Assignment;
use crate::orchestration::{NoopObserver, ProgressObserver};

/// Why an optimizer run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    NoImprovement,
    TimeLimit,
    EmptySchedule,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::MaxIterations => "max_iterations",
            StopReason::NoImprovement => "no_improvement",
            StopReason::TimeLimit => "time_limit",
            StopReason::EmptySchedule => "empty_schedule",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerResult {
    /// Best schedule ever seen (never worse than the input).
    pub best: Vec<Assignment>,
    pub best_fitness: f64,
    pub initial_fitness: f64,
    pub iterations: usize,
    /// Iterations that produced a new best.
    pub improvements: usize,
    /// Strategy name → iterations run with it.
    pub strategy_usage: BTreeMap<String, usize>,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl OptimizerResult {
    pub fn improved(&self) -> bool {
        self.best_fitness > self.initial_fitness
    }
}

/// Local search / metaheuristic improver.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use u_timetable::constraints::ConstraintManager;
/// use u_timetable::models::{Assignment, Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
/// use u_timetable::optimizer::{Optimizer, OptimizerConfig};
///
/// let data = ReferenceCatalog::new(
///     vec![Course::new("C1", 20), Course::new("C2", 20)],
///     vec![Teacher::new("T1")],
///     vec![Classroom::new("R1", 30)],
///     vec![],
///     TimeSlotCatalog::weekly(5, 4),
/// );
/// let manager = Arc::new(ConstraintManager::new(Arc::new(data)));
/// let clash = vec![
///     Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
///     Assignment::new("C2", "T1", "R1", 1, 1).unwrap(),
/// ];
/// let result = Optimizer::new(manager, OptimizerConfig::default().with_seed(7)).optimize(&clash);
/// assert!(result.best_fitness >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Optimizer {
    manager: Arc<ConstraintManager>,
    config: OptimizerConfig,
    space: Arc<MoveSpace>,
    observer: Arc<dyn ProgressObserver>,
}

impl Optimizer {
    pub fn new(manager: Arc<ConstraintManager>, config: OptimizerConfig) -> Self {
        let space = Arc::new(MoveSpace::from_reference(manager.data()));
        Self {
            manager,
            config,
            space,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub(super) fn manager(&self) -> &ConstraintManager {
        &self.manager
    }

    pub(super) fn space(&self) -> &MoveSpace {
        &self.space
    }

    pub(super) fn observer(&self) -> &dyn ProgressObserver {
        self.observer.as_ref()
    }

    /// Improves `initial`.
    #[tracing::instrument(level = "debug", skip_all, fields(sessions = initial.len()))]
    pub fn optimize(&self, initial: &[Assignment]) -> OptimizerResult {
        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        self.optimize_with_rng(initial, &mut rng)
    }

    pub fn optimize_with_rng<R: Rng + ?Sized>(
        &self,
        initial: &[Assignment],
        rng: &mut R,
    ) -> OptimizerResult {
        let start = Instant::now();
        let initial_fitness = self.manager.fitness(initial);

        if initial.is_empty() {
            return OptimizerResult {
                best: Vec::new(),
                best_fitness: initial_fitness,
                initial_fitness,
                iterations: 0,
                improvements: 0,
                strategy_usage: BTreeMap::new(),
                stop_reason: StopReason::EmptySchedule,
                elapsed: start.elapsed(),
            };
        }

        let deadline = self.config.time_limit.map(|limit| start + limit);
        let walk = Walk::new(
            self,
            initial,
            initial_fitness,
            deadline,
            SmallRng::seed_from_u64(rng.random()),
        );

        while let Some(strategy) = walk.next_strategy() {
            // Runner streams follow the caller's RNG.
            let seed: u64 = rng.random();
            match strategy {
                SearchStrategy::BestImprovement | SearchStrategy::FirstImprovement => {
                    self.climb(&walk, strategy, rng)
                }
                SearchStrategy::SimulatedAnnealing => self.anneal(&walk, seed, rng),
                SearchStrategy::TabuSearch => {
                    let config = TabuConfig::default()
                        .with_max_iterations(self.remaining(&walk) + 1)
                        .with_tabu_tenure(self.config.tabu_tenure.max(1))
                        .with_aspiration(true)
                        .with_max_no_improve(usize::MAX)
                        .with_seed(seed);
                    TabuRunner::run(&walk, &config);
                }
                SearchStrategy::VariableNeighborhood => {
                    // One cycle through the structures per runner call.
                    let config = VnsConfig::default()
                        .with_max_iterations(1)
                        .with_max_no_improve(Neighborhood::ALL.len())
                        .with_seed(seed);
                    VnsRunner::run(&walk, &config);
                }
            }
        }

        let outcome = walk.finish();
        tracing::debug!(
            iterations = outcome.iterations,
            improvements = outcome.improvements,
            initial = initial_fitness,
            best = outcome.best_fitness,
            reason = %outcome.stop,
            "optimizer finished"
        );

        OptimizerResult {
            best: outcome.best,
            best_fitness: outcome.best_fitness,
            initial_fitness,
            iterations: outcome.iterations,
            improvements: outcome.improvements,
            strategy_usage: outcome.usage,
            stop_reason: outcome.stop,
            elapsed: start.elapsed(),
        }
    }

    fn remaining(&self, walk: &Walk<'_>) -> usize {
        self.config.max_iterations.saturating_sub(walk.iterations())
    }

    /// Annealing segment on [`SaRunner`]; climbs instead when the
    /// temperature settings cannot drive a runner.
    fn anneal<R: Rng + ?Sized>(&self, walk: &Walk<'_>, seed: u64, rng: &mut R) {
        let config = SaConfig::default()
            .with_initial_temperature(walk.annealing_start())
            .with_min_temperature(self.config.min_temperature)
            .with_cooling(CoolingSchedule::Geometric {
                alpha: self.config.cooling_rate,
            })
            .with_iterations_per_temperature(1)
            .with_max_iterations(0)
            .with_seed(seed);
        if let Err(reason) = config.validate() {
            tracing::warn!(%reason, "annealing settings rejected, climbing instead");
            self.climb(walk, SearchStrategy::SimulatedAnnealing, rng);
            return;
        }
        SaRunner::run_with_cancel(walk, &config, Some(walk.cancel_flag()));
    }

    /// Improvement-only segment.
    fn climb<R: Rng + ?Sized>(&self, walk: &Walk<'_>, strategy: SearchStrategy, rng: &mut R) {
        let (mut current, mut fitness) = walk.position();
        while walk.tick(&current, strategy) {
            let step = match strategy {
                SearchStrategy::FirstImprovement => self.first_improvement(walk, &current, fitness, rng),
                _ => self.best_improvement(walk, &current, fitness, rng),
            };
            if let Some((next, f)) = step {
                current = next;
                fitness = f;
            }
        }
    }

    fn best_improvement<R: Rng + ?Sized>(
        &self,
        walk: &Walk<'_>,
        current: &[Assignment],
        fitness: f64,
        rng: &mut R,
    ) -> Option<(Vec<Assignment>, f64)> {
        (0..self.config.neighborhood_sample.max(1))
            .filter_map(|_| {
                let &n = Neighborhood::ALL.choose(rng)?;
                n.propose(current, &self.space, rng)
            })
            .map(|next| {
                let f = walk.score(&next);
                (next, f)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|(_, f)| *f > fitness + IMPROVEMENT_EPS)
    }

    fn first_improvement<R: Rng + ?Sized>(
        &self,
        walk: &Walk<'_>,
        current: &[Assignment],
        fitness: f64,
        rng: &mut R,
    ) -> Option<(Vec<Assignment>, f64)> {
        for _ in 0..self.config.neighborhood_sample.max(1) {
            let &n = Neighborhood::ALL.choose(rng)?;
            let Some(next) = n.propose(current, &self.space, rng) else {
                continue;
            };
            let f = walk.score(&next);
            if f > fitness + IMPROVEMENT_EPS {
                return Some((next, f));
            }
        }
        None
    }
}
