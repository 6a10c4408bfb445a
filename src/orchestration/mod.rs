//! Multi-algorithm orchestration.
//!
//! - [`HybridOptimizer`]: greedy → genetic → local search, each stage
//!   seeded with the incumbent and bounded by its own time budget.
//! - [`IslandModel`]: independent GA populations on a [`ParallelExecutor`],
//!   exchanging their best individuals every `migration_interval`
//!   generations.
//! - [`ProgressObserver`]: progress hooks shared by every search loop.

mod hybrid;
mod island;
mod observer;

pub use hybrid::{HybridConfig, HybridOptimizer, HybridResult, Stage};
pub use island::{IslandConfig, IslandModel, IslandResult, MigrationTopology, ParallelExecutor};
pub use observer::{
    GenerationStats, IterationStats, NoopObserver, ProgressObserver, StageStats, TracingObserver,
};
