use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Local search strategy for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Best of a sampled neighbourhood, accepted only if it improves.
    BestImprovement,
    /// First improving neighbour of a sampled neighbourhood.
    FirstImprovement,
    /// One random neighbour, Metropolis acceptance.
    SimulatedAnnealing,
    /// Best non-tabu neighbour, accepted even if worse.
    TabuSearch,
    /// Best neighbour of the current neighbourhood structure; cycles
    /// structures until one improves.
    VariableNeighborhood,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 5] = [
        SearchStrategy::BestImprovement,
        SearchStrategy::FirstImprovement,
        SearchStrategy::SimulatedAnnealing,
        SearchStrategy::TabuSearch,
        SearchStrategy::VariableNeighborhood,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchStrategy::BestImprovement => "best_improvement",
            SearchStrategy::FirstImprovement => "first_improvement",
            SearchStrategy::SimulatedAnnealing => "simulated_annealing",
            SearchStrategy::TabuSearch => "tabu_search",
            SearchStrategy::VariableNeighborhood => "variable_neighborhood",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the strategy is chosen per iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySelection {
    /// By run phase: best-improvement early, annealing in the middle,
    /// tabu late (variable neighbourhood once the late phase stagnates).
    #[default]
    Adaptive,
    /// Always the given strategy.
    Fixed(SearchStrategy),
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Consecutive iterations without a new best before stopping.
    pub no_improvement_limit: usize,
    /// Neighbours sampled per iteration by the sampling strategies.
    pub neighborhood_sample: usize,
    pub strategy: StrategySelection,
    pub initial_temperature: f64,
    /// Geometric cooling factor applied after each annealing step.
    pub cooling_rate: f64,
    pub min_temperature: f64,
    /// Recently visited solutions kept tabu.
    pub tabu_tenure: usize,
    /// End of the early phase, as a fraction of `max_iterations`.
    pub early_phase: f64,
    /// Start of the late phase, as a fraction of `max_iterations`.
    pub late_phase: f64,
    pub time_limit: Option<Duration>,
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            no_improvement_limit: 100,
            neighborhood_sample: 30,
            strategy: StrategySelection::Adaptive,
            initial_temperature: 100.0,
            cooling_rate: 0.95,
            min_temperature: 1e-3,
            tabu_tenure: 5,
            early_phase: 0.3,
            late_phase: 0.7,
            time_limit: None,
            seed: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_no_improvement_limit(mut self, limit: usize) -> Self {
        self.no_improvement_limit = limit;
        self
    }

    pub fn with_neighborhood_sample(mut self, sample: usize) -> Self {
        self.neighborhood_sample = sample;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = StrategySelection::Fixed(strategy);
        self
    }

    pub fn with_adaptive_strategy(mut self) -> Self {
        self.strategy = StrategySelection::Adaptive;
        self
    }

    pub fn with_annealing(mut self, initial_temperature: f64, cooling_rate: f64) -> Self {
        self.initial_temperature = initial_temperature;
        self.cooling_rate = cooling_rate;
        self
    }

    pub fn with_tabu_tenure(mut self, tenure: usize) -> Self {
        self.tabu_tenure = tenure;
        self
    }

    pub fn with_phases(mut self, early: f64, late: f64) -> Self {
        self.early_phase = early;
        self.late_phase = late;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Strategy for `iteration` given the current stagnation count.
    pub fn strategy_for(&self, iteration: usize, stagnant: usize) -> SearchStrategy {
        match self.strategy {
            StrategySelection::Fixed(s) => s,
            StrategySelection::Adaptive => {
                let progress = iteration as f64 / self.max_iterations.max(1) as f64;
                if progress < self.early_phase {
                    SearchStrategy::BestImprovement
                } else if progress < self.late_phase {
                    SearchStrategy::SimulatedAnnealing
                } else if stagnant * 2 >= self.no_improvement_limit.max(1) {
                    SearchStrategy::VariableNeighborhood
                } else {
                    SearchStrategy::TabuSearch
                }
            }
        }
    }
}
