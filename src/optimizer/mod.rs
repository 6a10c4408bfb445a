//! Local search and metaheuristic improvement of complete schedules.
//!
//! # Strategies
//!
//! | Strategy | Acceptance |
//! |----------|------------|
//! | Best improvement | best sampled neighbour, if better |
//! | First improvement | first better sampled neighbour |
//! | Simulated annealing | Metropolis, `exp(Δ·100 / T)`, geometric cooling ([`u_metaheur::sa`]) |
//! | Tabu search | best non-tabu neighbour, even if worse, aspiration on new best ([`u_metaheur::tabu`]) |
//! | Variable neighbourhood | shake in structure `k`, sampled local search; next structure on failure ([`u_metaheur::vns`]) |
//!
//! Neighbourhoods: [`Neighborhood::Swap`] (exchange two sessions' times),
//! [`Neighborhood::Move`] (one session to a new time) and
//! [`Neighborhood::ClassroomChange`].
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by simulated annealing"
//! - Glover (1989), "Tabu Search, Part I", *ORSA J. Computing* 1(3)
//! - Mladenović & Hansen (1997), "Variable neighborhood search"

mod config;
mod neighborhood;
mod search;
mod walk;

pub use config::{OptimizerConfig, SearchStrategy, StrategySelection};
pub use neighborhood::{solution_hash, MoveSpace, Neighborhood};
pub use search::{Optimizer, OptimizerResult, StopReason};
