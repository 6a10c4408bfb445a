//! Progress reporting hooks.
//!
//! Search loops never print. They push snapshots to a [`ProgressObserver`]
//! the host wires to logging, metrics or a UI.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Snapshot after one GA generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    /// Island index for island-model runs.
    pub island: Option<usize>,
    pub generation: usize,
    /// Best fitness ever seen by this population.
    pub best_fitness: f64,
    /// Mean fitness of this generation's offspring.
    pub mean_fitness: f64,
    pub mutation_rate: f64,
}

/// Snapshot after one optimizer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationStats {
    pub iteration: usize,
    /// Strategy used for this iteration.
    pub strategy: &'static str,
    pub current_fitness: f64,
    pub best_fitness: f64,
    /// Annealing temperature, when annealing.
    pub temperature: Option<f64>,
}

/// Summary of one completed hybrid stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: String,
    /// Fitness of the stage's own output.
    pub fitness: f64,
    /// Whether the stage replaced the incumbent.
    pub improved: bool,
    pub elapsed: Duration,
    /// Whether the incumbent met the quality threshold after this stage.
    pub threshold_met: bool,
}

/// Receives progress snapshots from running searches.
///
/// Shared across island workers, hence `Send + Sync`.
pub trait ProgressObserver: Send + Sync + Debug {
    fn on_generation(&self, _stats: &GenerationStats) {}

    fn on_iteration(&self, _stats: &IterationStats) {}

    fn on_stage_complete(&self, _stats: &StageStats) {}
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Forwards snapshots to `tracing`.
///
/// Generations and iterations are logged at `trace` level every
/// `every` steps; stages at `info`.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    every: usize,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { every: 10 }
    }

    /// Logs every n-th generation / iteration (0 is treated as 1).
    pub fn with_interval(mut self, every: usize) -> Self {
        self.every = every.max(1);
        self
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TracingObserver {
    fn on_generation(&self, stats: &GenerationStats) {
        if stats.generation % self.every == 0 {
            tracing::trace!(
                island = ?stats.island,
                generation = stats.generation,
                best = stats.best_fitness,
                mean = stats.mean_fitness,
                mutation_rate = stats.mutation_rate,
                "generation"
            );
        }
    }

    fn on_iteration(&self, stats: &IterationStats) {
        if stats.iteration % self.every == 0 {
            tracing::trace!(
                iteration = stats.iteration,
                strategy = stats.strategy,
                current = stats.current_fitness,
                best = stats.best_fitness,
                temperature = ?stats.temperature,
                "iteration"
            );
        }
    }

    fn on_stage_complete(&self, stats: &StageStats) {
        tracing::info!(
            stage = %stats.stage,
            fitness = stats.fitness,
            improved = stats.improved,
            threshold_met = stats.threshold_met,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "stage complete"
        );
    }
}
