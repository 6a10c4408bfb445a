use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::operators::GeneticOperators;

/// Genetic algorithm configuration.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `population_size` | 100 |
/// | `max_generations` | 1000 |
/// | `elite_rate` | 0.1 |
/// | `crossover_rate` | 0.8 |
/// | `mutation_rate` | 0.1 (rising to `max_mutation_rate` under stagnation) |
/// | `convergence_threshold` | 50 generations without improvement |
/// | `target_fitness` | 0.95 |
/// | `greedy_seed_ratio` | 0.1 of the initial population |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// Fraction of the population carried over unchanged (at least one).
    pub elite_rate: f64,
    pub crossover_rate: f64,
    /// Base per-child mutation probability.
    pub mutation_rate: f64,
    /// Raise the mutation rate as the search stagnates.
    pub adaptive_mutation: bool,
    /// Ceiling for the adaptive mutation rate.
    pub max_mutation_rate: f64,
    /// Generations without improvement before stopping.
    pub convergence_threshold: usize,
    /// Stop once the best individual reaches this fitness.
    pub target_fitness: f64,
    /// Fraction of the initial population built by randomized greedy runs.
    pub greedy_seed_ratio: f64,
    pub operators: GeneticOperators,
    pub seed: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 1000,
            elite_rate: 0.1,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            adaptive_mutation: true,
            max_mutation_rate: 0.3,
            convergence_threshold: 50,
            target_fitness: 0.95,
            greedy_seed_ratio: 0.1,
            operators: GeneticOperators::default(),
            seed: None,
            time_limit: None,
        }
    }
}

impl GaConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = generations;
        self
    }

    pub fn with_elite_rate(mut self, rate: f64) -> Self {
        self.elite_rate = rate;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_adaptive_mutation(mut self, enabled: bool, max_rate: f64) -> Self {
        self.adaptive_mutation = enabled;
        self.max_mutation_rate = max_rate;
        self
    }

    pub fn with_convergence_threshold(mut self, generations: usize) -> Self {
        self.convergence_threshold = generations;
        self
    }

    pub fn with_target_fitness(mut self, target: f64) -> Self {
        self.target_fitness = target;
        self
    }

    pub fn with_greedy_seed_ratio(mut self, ratio: f64) -> Self {
        self.greedy_seed_ratio = ratio;
        self
    }

    pub fn with_operators(mut self, operators: GeneticOperators) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Number of elites kept per generation.
    pub fn elite_count(&self) -> usize {
        let n = self.population_size.max(1);
        ((n as f64 * unit_rate(self.elite_rate)).round() as usize).clamp(1, n)
    }

    /// Crossover probability in `[0, 1]`; non-finite rates disable crossover.
    pub fn crossover_probability(&self) -> f64 {
        unit_rate(self.crossover_rate)
    }

    /// Mutation probability after `stagnant` non-improving generations.
    ///
    /// Rises linearly from `mutation_rate` to `max_mutation_rate` over
    /// `convergence_threshold` generations. Always in `[0, 1]`: a
    /// non-finite base counts as 0 and a non-finite ceiling as the base.
    pub fn mutation_rate_for(&self, stagnant: usize) -> f64 {
        let base = unit_rate(self.mutation_rate);
        if !self.adaptive_mutation || self.convergence_threshold == 0 {
            return base;
        }
        let ceiling = if self.max_mutation_rate.is_finite() {
            self.max_mutation_rate.clamp(base, 1.0)
        } else {
            base
        };
        let progress = (stagnant as f64 / self.convergence_threshold as f64).min(1.0);
        base + (ceiling - base) * progress
    }
}

/// Clamps a probability to `[0, 1]`, mapping NaN and infinities to 0.
pub(crate) fn unit_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::operators::{CrossoverType, SelectionType};

    #[test]
    fn test_defaults() {
        let c = GaConfig::default();
        assert_eq!(c.population_size, 100);
        assert_eq!(c.max_generations, 1000);
        assert_eq!(c.convergence_threshold, 50);
        assert_eq!(c.elite_count(), 10);
        assert!((c.target_fitness - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_elite_count_at_least_one() {
        let c = GaConfig::default().with_population_size(4).with_elite_rate(0.0);
        assert_eq!(c.elite_count(), 1);
        let c = GaConfig::default().with_population_size(4).with_elite_rate(1.0);
        assert_eq!(c.elite_count(), 4);
    }

    #[test]
    fn test_adaptive_mutation_rate() {
        let c = GaConfig::default();
        assert!((c.mutation_rate_for(0) - 0.1).abs() < 1e-12);
        assert!((c.mutation_rate_for(25) - 0.2).abs() < 1e-12);
        assert!((c.mutation_rate_for(500) - 0.3).abs() < 1e-12);

        let fixed = c.clone().with_adaptive_mutation(false, 0.9);
        assert!((fixed.mutation_rate_for(500) - 0.1).abs() < 1e-12);

        // Ceiling below base never lowers the rate.
        let low = c.with_adaptive_mutation(true, 0.05);
        assert!((low.mutation_rate_for(50) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_rates_are_sanitized() {
        let c = GaConfig::default()
            .with_mutation_rate(f64::NAN)
            .with_crossover_rate(f64::INFINITY)
            .with_adaptive_mutation(true, f64::NAN);
        assert_eq!(c.mutation_rate_for(0), 0.0);
        assert_eq!(c.mutation_rate_for(40), 0.0);
        assert_eq!(c.crossover_probability(), 0.0);

        let c = GaConfig::default().with_adaptive_mutation(true, f64::NAN);
        assert!((c.mutation_rate_for(50) - 0.1).abs() < 1e-12);

        let c = GaConfig::default().with_elite_rate(f64::NAN);
        assert_eq!(c.elite_count(), 1);
    }

    #[test]
    fn test_from_partial_json() {
        let c: GaConfig =
            serde_json::from_str(r#"{"population_size": 20, "operators": {"crossover": "uniform"}}"#)
                .unwrap();
        assert_eq!(c.population_size, 20);
        assert_eq!(c.max_generations, 1000);
        assert_eq!(c.operators.crossover, CrossoverType::Uniform);
        assert_eq!(c.operators.selection, SelectionType::Tournament { size: 3 });
    }
}
