//! Course-indexed schedule genome.

use u_metaheur::ga::Individual as GaIndividual;

use crate::constraints::ConstraintManager;
use crate::models::Assignment;

/// One candidate schedule: gene `i` is the session of course `i` of the
/// owning [`GaProblem`](super::GaProblem).
///
/// Higher fitness = better schedule (maximization convention). Fitness is
/// cached after the first evaluation; every editing method returns a new
/// individual with an empty cache, so a stale value can never be observed.
///
/// The evolutionary runner minimizes, so the [`GaIndividual`] view exposes
/// the negated fitness as a cost (lower = better, unevaluated = +∞).
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    genes: Vec<Assignment>,
    fitness: Option<f64>,
}

impl Individual {
    pub fn new(genes: Vec<Assignment>) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }

    pub fn genes(&self) -> &[Assignment] {
        &self.genes
    }

    pub fn into_genes(self) -> Vec<Assignment> {
        self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Cached fitness, if evaluated.
    pub fn cached_fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Cached fitness, or negative infinity when not yet evaluated.
    pub fn fitness_or_worst(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Copy carrying an already known fitness.
    pub(crate) fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = Some(fitness);
        self
    }

    /// Evaluates (once) and returns fitness.
    pub fn evaluate(&mut self, manager: &ConstraintManager) -> f64 {
        match self.fitness {
            Some(f) => f,
            None => {
                let f = manager.fitness(&self.genes);
                self.fitness = Some(f);
                f
            }
        }
    }

    /// Copy with gene `index` replaced. Out-of-range indices yield an
    /// unchanged (but unevaluated) copy.
    pub fn with_gene(&self, index: usize, gene: Assignment) -> Self {
        let mut genes = self.genes.clone();
        if let Some(slot) = genes.get_mut(index) {
            *slot = gene;
        }
        Self::new(genes)
    }

    /// Copy with several genes replaced.
    pub fn with_genes(&self, edits: impl IntoIterator<Item = (usize, Assignment)>) -> Self {
        let mut genes = self.genes.clone();
        for (index, gene) in edits {
            if let Some(slot) = genes.get_mut(index) {
                *slot = gene;
            }
        }
        Self::new(genes)
    }
}

impl GaIndividual for Individual {
    type Fitness = f64;

    fn fitness(&self) -> f64 {
        self.fitness.map_or(f64::INFINITY, |f| -f)
    }

    fn set_fitness(&mut self, cost: f64) {
        self.fitness = Some(-cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
    use std::sync::Arc;

    fn manager() -> ConstraintManager {
        ConstraintManager::new(Arc::new(ReferenceCatalog::new(
            vec![Course::new("C1", 10), Course::new("C2", 10)],
            vec![Teacher::new("T1").with_qualifications(["C1", "C2"])],
            vec![Classroom::new("R1", 20)],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        )))
    }

    fn gene(course: &str, day: u8, slot: u8) -> Assignment {
        Assignment::new(course, "T1", "R1", day, slot).unwrap()
    }

    #[test]
    fn test_fitness_cache() {
        let m = manager();
        let mut ind = Individual::new(vec![gene("C1", 1, 1), gene("C2", 1, 1)]);
        assert!(!ind.is_evaluated());
        assert_eq!(ind.fitness_or_worst(), f64::NEG_INFINITY);

        let f = ind.evaluate(&m);
        assert!(f < 0.0);
        assert_eq!(ind.cached_fitness(), Some(f));
    }

    #[test]
    fn test_edit_resets_cache_and_keeps_parent() {
        let m = manager();
        let mut parent = Individual::new(vec![gene("C1", 1, 1), gene("C2", 1, 1)]);
        parent.evaluate(&m);

        let mut child = parent.with_gene(1, gene("C2", 2, 1));
        assert!(child.cached_fitness().is_none());
        assert!(child.evaluate(&m) >= 0.0);

        assert_eq!(parent.genes()[1].day(), 1);
        assert!(parent.cached_fitness().is_some_and(|f| f < 0.0));
    }

    #[test]
    fn test_cost_view_negates_fitness() {
        let m = manager();
        let mut ind = Individual::new(vec![gene("C1", 1, 1), gene("C2", 2, 1)]);
        assert_eq!(GaIndividual::fitness(&ind), f64::INFINITY);

        let f = ind.evaluate(&m);
        assert_eq!(GaIndividual::fitness(&ind), -f);

        ind.set_fitness(3.5);
        assert_eq!(ind.cached_fitness(), Some(-3.5));
    }

    #[test]
    fn test_out_of_range_edit() {
        let ind = Individual::new(vec![gene("C1", 1, 1)]);
        let copy = ind.with_gene(5, gene("C2", 2, 2));
        assert_eq!(copy.genes(), ind.genes());
    }
}
