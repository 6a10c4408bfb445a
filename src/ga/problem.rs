//! Timetabling GA problem definition.
//!
//! Bridges reference data to the genome: one gene per schedulable course,
//! each drawn from that course's (teacher × classroom × time) domain.
//!
//! [`GaProblem`] plugs into [`u_metaheur::ga::GaRunner`]: individuals are
//! random genomes, evaluation is the negated schedule fitness, and the
//! crossover and mutation hooks apply the configured [`GeneticOperators`].
//!
//! # Reference
//! Colorni, Dorigo & Maniezzo (1998), "Metaheuristics for high school
//! timetabling", *Computational Optimization and Applications* 9(3).

use std::sync::Arc;

use rand::prelude::IndexedRandom;
use rand::Rng;
use u_metaheur::ga::GaProblem as EvolutionProblem;

use super::{GeneticOperators, Individual};
use crate::constraints::ConstraintManager;
use crate::models::{Assignment, PlacementFailure, ReferenceData};

/// Candidate values for one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneDomain {
    pub course_id: String,
    /// Eligible teacher ids.
    pub teachers: Vec<String>,
    /// Usable classrooms large enough for the course.
    pub classrooms: Vec<String>,
}

/// GA problem for course timetabling.
///
/// Courses with an empty domain get no gene; they are reported through
/// [`GaProblem::failures`] instead.
#[derive(Debug, Clone)]
pub struct GaProblem {
    manager: Arc<ConstraintManager>,
    domains: Vec<GeneDomain>,
    time_points: Vec<(u8, u8)>,
    failures: Vec<PlacementFailure>,
    operators: GeneticOperators,
}

impl GaProblem {
    /// Builds gene domains for every schedulable course.
    pub fn new(manager: Arc<ConstraintManager>) -> Self {
        let data = manager.data();
        let time_points = data.time_slots().time_points();
        let mut domains = Vec::new();
        let mut failures = Vec::new();

        for course in data.courses().iter().filter(|c| c.is_schedulable()) {
            let teachers: Vec<String> = data
                .eligible_teachers(&course.id)
                .into_iter()
                .map(|t| t.id.clone())
                .collect();
            let classrooms: Vec<String> = data
                .fitting_classrooms(course)
                .into_iter()
                .map(|r| r.id.clone())
                .collect();

            let reason = if teachers.is_empty() {
                Some("no eligible teacher".to_string())
            } else if classrooms.is_empty() {
                Some(format!(
                    "no available classroom with capacity >= {}",
                    course.enrollment_cap
                ))
            } else if time_points.is_empty() {
                Some("no active time slots".to_string())
            } else {
                None
            };

            match reason {
                Some(reason) => failures.push(PlacementFailure::new(course.id.clone(), reason)),
                None => domains.push(GeneDomain {
                    course_id: course.id.clone(),
                    teachers,
                    classrooms,
                }),
            }
        }

        Self {
            manager,
            domains,
            time_points,
            failures,
            operators: GeneticOperators::default(),
        }
    }

    /// Operators applied by the crossover and mutation hooks.
    pub fn with_operators(mut self, operators: GeneticOperators) -> Self {
        self.operators = operators;
        self
    }

    pub fn operators(&self) -> &GeneticOperators {
        &self.operators
    }

    pub fn manager(&self) -> &Arc<ConstraintManager> {
        &self.manager
    }

    /// Number of genes.
    pub fn gene_count(&self) -> usize {
        self.domains.len()
    }

    pub fn domains(&self) -> &[GeneDomain] {
        &self.domains
    }

    pub fn domain(&self, index: usize) -> Option<&GeneDomain> {
        self.domains.get(index)
    }

    /// Active (day, slot) pairs.
    pub fn time_points(&self) -> &[(u8, u8)] {
        &self.time_points
    }

    /// Courses excluded from the genome.
    pub fn failures(&self) -> &[PlacementFailure] {
        &self.failures
    }

    /// Draws a uniformly random value for gene `index`.
    pub fn random_gene<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<Assignment> {
        let domain = self.domains.get(index)?;
        let teacher = domain.teachers.choose(rng)?;
        let classroom = domain.classrooms.choose(rng)?;
        let &(day, slot) = self.time_points.choose(rng)?;
        Assignment::new(domain.course_id.clone(), teacher.clone(), classroom.clone(), day, slot)
            .ok()
    }

    /// A random teacher from gene `index`'s domain.
    pub fn random_teacher<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<&str> {
        self.domains
            .get(index)?
            .teachers
            .choose(rng)
            .map(String::as_str)
    }

    /// A random classroom from gene `index`'s domain.
    pub fn random_classroom<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<&str> {
        self.domains
            .get(index)?
            .classrooms
            .choose(rng)
            .map(String::as_str)
    }

    /// A random active time point.
    pub fn random_time<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(u8, u8)> {
        self.time_points.choose(rng).copied()
    }

    /// A fully random genome.
    pub fn random_individual<R: Rng + ?Sized>(&self, rng: &mut R) -> Individual {
        let genes = (0..self.domains.len())
            .filter_map(|i| self.random_gene(i, rng))
            .collect();
        Individual::new(genes)
    }

    /// Genome taking each course's session from `assignments` (first match
    /// wins) and drawing the rest at random.
    pub fn from_assignments<R: Rng + ?Sized>(
        &self,
        assignments: &[Assignment],
        rng: &mut R,
    ) -> Individual {
        let genes = self
            .domains
            .iter()
            .enumerate()
            .filter_map(|(i, domain)| {
                assignments
                    .iter()
                    .find(|a| a.course_id == domain.course_id)
                    .cloned()
                    .or_else(|| self.random_gene(i, rng))
            })
            .collect();
        Individual::new(genes)
    }

    /// Evaluates and caches fitness.
    pub fn score(&self, individual: &mut Individual) -> f64 {
        individual.evaluate(&self.manager)
    }

    /// Genes that fail a hard rule against the rest of the genome.
    pub fn conflicting_genes(&self, individual: &Individual) -> Vec<usize> {
        let genes = individual.genes();
        (0..genes.len())
            .filter(|&i| !self.manager.hard().is_valid_in_schedule(genes, i))
            .collect()
    }
}

impl EvolutionProblem for GaProblem {
    type Individual = Individual;

    fn create_individual<R: Rng>(&self, rng: &mut R) -> Individual {
        self.random_individual(rng)
    }

    /// Cost = negated fitness; cached fitness is reused.
    fn evaluate(&self, individual: &Individual) -> f64 {
        -individual
            .cached_fitness()
            .unwrap_or_else(|| self.manager.fitness(individual.genes()))
    }

    fn crossover<R: Rng>(&self, p1: &Individual, p2: &Individual, rng: &mut R) -> Vec<Individual> {
        let (c1, c2) = self.operators.crossover(p1, p2, rng);
        vec![c1, c2]
    }

    fn mutate<R: Rng>(&self, individual: &mut Individual, rng: &mut R) {
        *individual = self.operators.mutate(individual, self, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
    use crate::ga::{CrossoverType, MutationType};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use u_metaheur::ga::{GaConfig as RunnerConfig, GaRunner, Individual as _};

    fn problem() -> GaProblem {
        let data = ReferenceCatalog::new(
            vec![
                Course::new("C1", 30),
                Course::new("C2", 30),
                Course::new("BIG", 500),
                Course::new("OFF", 10).with_active(false),
            ],
            vec![
                Teacher::new("T1").with_qualifications(["C1", "C2", "BIG"]),
                Teacher::new("T2").with_qualification("C2"),
            ],
            vec![Classroom::new("R1", 40), Classroom::new("R2", 60)],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        );
        GaProblem::new(Arc::new(ConstraintManager::new(Arc::new(data))))
    }

    #[test]
    fn test_domains() {
        let p = problem();
        assert_eq!(p.gene_count(), 2);
        assert_eq!(p.domains()[0].teachers, vec!["T1".to_string()]);
        assert_eq!(p.domains()[1].teachers.len(), 2);
        assert_eq!(p.time_points().len(), 20);

        assert_eq!(p.failures().len(), 1);
        assert_eq!(p.failures()[0].course_id, "BIG");
        assert!(p.failures()[0].reason.contains("capacity >= 500"));
    }

    #[test]
    fn test_random_individual_respects_domains() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let ind = p.random_individual(&mut rng);
            assert_eq!(ind.len(), 2);
            for (gene, domain) in ind.genes().iter().zip(p.domains()) {
                assert_eq!(gene.course_id, domain.course_id);
                assert!(domain.teachers.contains(&gene.teacher_id));
                assert!(domain.classrooms.contains(&gene.classroom_id));
            }
        }
    }

    #[test]
    fn test_from_assignments_fills_gaps() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(1);
        let seed = vec![Assignment::new("C2", "T2", "R2", 3, 3).unwrap()];
        let ind = p.from_assignments(&seed, &mut rng);
        assert_eq!(ind.len(), 2);
        assert_eq!(ind.genes()[0].course_id, "C1");
        assert_eq!(ind.genes()[1], seed[0]);
    }

    #[test]
    fn test_conflicting_genes() {
        let p = problem();
        let clash = Individual::new(vec![
            Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
            Assignment::new("C2", "T1", "R2", 1, 1).unwrap(),
        ]);
        assert_eq!(p.conflicting_genes(&clash), vec![0, 1]);

        let mut fine = clash.with_gene(1, Assignment::new("C2", "T2", "R2", 1, 1).unwrap());
        assert!(p.conflicting_genes(&fine).is_empty());
        assert!(p.score(&mut fine) >= 0.0);
    }

    #[test]
    fn test_hooks_use_configured_operators() {
        let p = problem().with_operators(
            GeneticOperators::default()
                .with_crossover(CrossoverType::SinglePoint)
                .with_mutation(MutationType::Swap),
        );
        let mut rng = SmallRng::seed_from_u64(8);
        let a = p.create_individual(&mut rng);
        let b = p.create_individual(&mut rng);
        let children = p.crossover(&a, &b, &mut rng);
        assert_eq!(children.len(), 2);
        // Single-point with two genes: first gene from one parent, second
        // from the other.
        assert_eq!(children[0].genes()[0], a.genes()[0]);
        assert_eq!(children[0].genes()[1], b.genes()[1]);

        let mut m = a.clone();
        p.mutate(&mut m, &mut rng);
        assert_eq!(m.genes()[0].time_key(), a.genes()[1].time_key());
        assert_eq!(m.genes()[1].time_key(), a.genes()[0].time_key());
    }

    #[test]
    fn test_evaluate_is_negated_fitness() {
        let p = problem();
        let clash = Individual::new(vec![
            Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
            Assignment::new("C2", "T1", "R2", 1, 1).unwrap(),
        ]);
        let cost = EvolutionProblem::evaluate(&p, &clash);
        assert_eq!(cost, -p.manager().fitness(clash.genes()));
        assert!(cost > 0.0);
    }

    #[test]
    fn test_runner_drives_problem() {
        let p = problem();
        let config = RunnerConfig::default()
            .with_population_size(12)
            .with_max_generations(20)
            .with_parallel(false)
            .with_seed(42);
        let result = GaRunner::run(&p, &config);
        assert_eq!(result.best.len(), 2);
        assert_eq!(result.best.fitness(), result.best_fitness);
        assert_eq!(result.best.cached_fitness(), Some(-result.best_fitness));
        // Two courses over two teachers, two rooms and twenty time points
        // are easily separated.
        assert!(result.best_fitness <= 0.0);
    }
}
