//! GA-based timetable optimization.
//!
//! # Encoding
//!
//! A genome holds one [`Assignment`](crate::models::Assignment) per
//! schedulable course, in a fixed course order. Gene `i` is drawn from
//! course `i`'s domain: eligible teachers × fitting classrooms × active
//! time points. Fitness is [`ConstraintManager::fitness`](crate::constraints::ConstraintManager::fitness):
//! `-1000 × violations` when infeasible, else the mean soft score.
//!
//! Generations run on [`u_metaheur::ga::GaRunner`]: [`GaProblem`] and
//! [`Individual`] implement its problem and individual traits, with
//! course-based crossover and guided mutation as the hooks. The runner
//! minimises, so it sees fitness negated as a cost.
//!
//! # Submodules
//!
//! - [`operators`]: Runtime-selectable selection, crossover and mutation
//!
//! # Reference
//! - Goldberg (1989), "Genetic Algorithms in Search, Optimization and
//!   Machine Learning"
//! - Colorni, Dorigo & Maniezzo (1998), "Metaheuristics for high school
//!   timetabling"

mod config;
mod individual;
pub mod operators;
mod problem;
mod runner;

pub use config::GaConfig;
pub use individual::Individual;
pub use operators::{CrossoverType, GeneticOperators, MutationType, SelectionType};
pub use problem::{GaProblem, GeneDomain};
pub use runner::{ConvergenceReason, EvolutionState, GaResult, GeneticAlgorithm, Population};
