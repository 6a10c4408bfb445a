//! Configurable genetic operators for timetabling.
//!
//! Provides runtime-selectable selection, crossover and mutation
//! strategies via [`GeneticOperators`]. Every operator returns new
//! individuals; parents are never modified. Selection itself runs inside
//! the evolutionary runner; [`SelectionType`] maps onto its
//! [`Selection`] schemes.
//!
//! # Usage
//!
//! ```
//! use u_timetable::ga::operators::{CrossoverType, GeneticOperators, MutationType, SelectionType};
//!
//! let ops = GeneticOperators::default();
//! assert_eq!(ops.selection, SelectionType::Tournament { size: 3 });
//! assert_eq!(ops.crossover, CrossoverType::CourseBased);
//! assert_eq!(ops.mutation, MutationType::Guided);
//! ```

use rand::prelude::IndexedRandom;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use u_metaheur::ga::Selection;

use super::{GaProblem, Individual};
use crate::constraints::others_of;
use crate::models::Assignment;

/// Candidate draws per guided mutation.
const GUIDED_TRIES: usize = 10;

/// Parent selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionType {
    /// Best of `size` uniformly drawn individuals.
    Tournament { size: usize },
    /// Fitness-proportionate.
    Roulette,
    /// Linear ranking, best gets the largest weight.
    Rank,
}

impl From<SelectionType> for Selection {
    fn from(selection: SelectionType) -> Self {
        match selection {
            SelectionType::Tournament { size } => Selection::Tournament(size.max(1)),
            SelectionType::Roulette => Selection::Roulette,
            SelectionType::Rank => Selection::Rank,
        }
    }
}

/// Crossover strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverType {
    /// One cut point; tails exchanged.
    SinglePoint,
    /// Two cut points; middle segments exchanged.
    TwoPoint,
    /// Each gene from either parent with probability 0.5.
    Uniform,
    /// Courses split into two random halves; each child takes one half
    /// from each parent.
    CourseBased,
}

/// Mutation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    /// Re-draw the teacher, classroom or time of one gene.
    Random,
    /// Exchange the times of two genes.
    Swap,
    /// Move one gene to an adjacent time point.
    TimeShift,
    /// Re-draw a gene currently in conflict, preferring a value that is
    /// valid against the rest of the genome.
    Guided,
}

/// Runtime-selectable genetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticOperators {
    pub selection: SelectionType,
    pub crossover: CrossoverType,
    pub mutation: MutationType,
}

impl Default for GeneticOperators {
    fn default() -> Self {
        Self {
            selection: SelectionType::Tournament { size: 3 },
            crossover: CrossoverType::CourseBased,
            mutation: MutationType::Guided,
        }
    }
}

impl GeneticOperators {
    pub fn with_selection(mut self, selection: SelectionType) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_crossover(mut self, crossover: CrossoverType) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutation(mut self, mutation: MutationType) -> Self {
        self.mutation = mutation;
        self
    }

    /// Recombines two parents into two children.
    pub fn crossover<R: Rng + ?Sized>(
        &self,
        p1: &Individual,
        p2: &Individual,
        rng: &mut R,
    ) -> (Individual, Individual) {
        let n = p1.len().min(p2.len());
        if n < 2 {
            return (Individual::new(p1.genes().to_vec()), Individual::new(p2.genes().to_vec()));
        }

        // from_first[i]: child 1 takes gene i from p1 (child 2 the opposite).
        let from_first: Vec<bool> = match self.crossover {
            CrossoverType::SinglePoint => {
                let cut = rng.random_range(1..n);
                (0..n).map(|i| i < cut).collect()
            }
            CrossoverType::TwoPoint => {
                let a = rng.random_range(0..n);
                let b = rng.random_range(0..n);
                let (lo, hi) = (a.min(b), a.max(b) + 1);
                (0..n).map(|i| i < lo || i >= hi).collect()
            }
            CrossoverType::Uniform => (0..n).map(|_| rng.random_bool(0.5)).collect(),
            CrossoverType::CourseBased => {
                let mut courses: Vec<usize> = (0..n).collect();
                courses.shuffle(rng);
                let mut mask = vec![false; n];
                for &i in &courses[..n / 2] {
                    mask[i] = true;
                }
                mask
            }
        };

        let (g1, g2) = (p1.genes(), p2.genes());
        let mut c1 = Vec::with_capacity(n);
        let mut c2 = Vec::with_capacity(n);
        for (i, &first) in from_first.iter().enumerate() {
            if first {
                c1.push(g1[i].clone());
                c2.push(g2[i].clone());
            } else {
                c1.push(g2[i].clone());
                c2.push(g1[i].clone());
            }
        }
        (Individual::new(c1), Individual::new(c2))
    }

    /// Returns a mutated copy.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        individual: &Individual,
        problem: &GaProblem,
        rng: &mut R,
    ) -> Individual {
        if individual.is_empty() {
            return individual.clone();
        }
        match self.mutation {
            MutationType::Random => random_mutation(individual, problem, rng),
            MutationType::Swap => swap_mutation(individual, rng),
            MutationType::TimeShift => time_shift_mutation(individual, problem, rng),
            MutationType::Guided => guided_mutation(individual, problem, rng),
        }
    }
}

/// Re-draws one attribute of one random gene.
pub fn random_mutation<R: Rng + ?Sized>(
    individual: &Individual,
    problem: &GaProblem,
    rng: &mut R,
) -> Individual {
    let i = rng.random_range(0..individual.len());
    let gene = &individual.genes()[i];
    let mutated = match rng.random_range(0..3) {
        0 => problem.random_teacher(i, rng).map(|t| gene.with_teacher(t)),
        1 => problem.random_classroom(i, rng).map(|r| gene.with_classroom(r)),
        _ => problem
            .random_time(rng)
            .and_then(|(d, s)| gene.with_time(d, s).ok()),
    };
    match mutated {
        Some(g) => individual.with_gene(i, g),
        None => Individual::new(individual.genes().to_vec()),
    }
}

/// Exchanges the (day, slot) of two distinct random genes.
pub fn swap_mutation<R: Rng + ?Sized>(individual: &Individual, rng: &mut R) -> Individual {
    let n = individual.len();
    if n < 2 {
        return Individual::new(individual.genes().to_vec());
    }
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    let (a, b) = (&individual.genes()[i], &individual.genes()[j]);
    match (a.with_time(b.day(), b.slot()), b.with_time(a.day(), a.slot())) {
        (Ok(x), Ok(y)) => individual.with_genes([(i, x), (j, y)]),
        _ => Individual::new(individual.genes().to_vec()),
    }
}

/// Moves one random gene to a neighbouring active time point: the
/// previous or next slot on the same day, else the same slot on an
/// adjacent day, else any time point.
pub fn time_shift_mutation<R: Rng + ?Sized>(
    individual: &Individual,
    problem: &GaProblem,
    rng: &mut R,
) -> Individual {
    let i = rng.random_range(0..individual.len());
    let gene = &individual.genes()[i];
    let (day, slot) = gene.time_key();
    let points = problem.time_points();

    let same_day: Vec<(u8, u8)> = points
        .iter()
        .copied()
        .filter(|&(d, s)| d == day && s.abs_diff(slot) == 1)
        .collect();
    let adjacent_day: Vec<(u8, u8)> = points
        .iter()
        .copied()
        .filter(|&(d, s)| s == slot && d.abs_diff(day) == 1)
        .collect();

    let target = same_day
        .choose(rng)
        .or_else(|| adjacent_day.choose(rng))
        .copied()
        .or_else(|| problem.random_time(rng));

    match target.and_then(|(d, s)| gene.with_time(d, s).ok()) {
        Some(g) => individual.with_gene(i, g),
        None => Individual::new(individual.genes().to_vec()),
    }
}

/// Re-draws a conflicting gene, keeping the first draw that is valid
/// against the other genes (or the last draw if none is). Falls back to
/// [`random_mutation`] when no gene is in conflict.
pub fn guided_mutation<R: Rng + ?Sized>(
    individual: &Individual,
    problem: &GaProblem,
    rng: &mut R,
) -> Individual {
    let conflicting = problem.conflicting_genes(individual);
    let Some(&i) = conflicting.choose(rng) else {
        return random_mutation(individual, problem, rng);
    };

    let genes = individual.genes();
    let hard = problem.manager().hard();
    let mut last: Option<Assignment> = None;
    for _ in 0..GUIDED_TRIES {
        let Some(candidate) = problem.random_gene(i, rng) else {
            break;
        };
        if hard.is_valid_against(&candidate, others_of(genes, i)) {
            return individual.with_gene(i, candidate);
        }
        last = Some(candidate);
    }
    match last {
        Some(g) => individual.with_gene(i, g),
        None => Individual::new(genes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintManager;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn problem() -> GaProblem {
        let data = ReferenceCatalog::new(
            (1..=6).map(|i| Course::new(format!("C{i}"), 20)).collect(),
            vec![Teacher::new("T1"), Teacher::new("T2"), Teacher::new("T3")],
            vec![Classroom::new("R1", 30), Classroom::new("R2", 30)],
            vec![],
            TimeSlotCatalog::weekly(5, 4),
        );
        GaProblem::new(Arc::new(ConstraintManager::new(Arc::new(data))))
    }

    fn course_ids(ind: &Individual) -> Vec<String> {
        ind.genes().iter().map(|g| g.course_id.clone()).collect()
    }

    #[test]
    fn test_default_operators() {
        let ops = GeneticOperators::default();
        assert_eq!(ops.selection, SelectionType::Tournament { size: 3 });
        assert_eq!(ops.crossover, CrossoverType::CourseBased);
        assert_eq!(ops.mutation, MutationType::Guided);
    }

    #[test]
    fn test_selection_maps_to_runner_schemes() {
        assert_eq!(
            Selection::from(SelectionType::Tournament { size: 5 }),
            Selection::Tournament(5)
        );
        assert_eq!(
            Selection::from(SelectionType::Tournament { size: 0 }),
            Selection::Tournament(1)
        );
        assert_eq!(Selection::from(SelectionType::Roulette), Selection::Roulette);
        assert_eq!(Selection::from(SelectionType::Rank), Selection::Rank);
    }

    #[test]
    fn test_crossover_preserves_course_order() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(42);
        let p1 = p.random_individual(&mut rng);
        let p2 = p.random_individual(&mut rng);

        for crossover in [
            CrossoverType::SinglePoint,
            CrossoverType::TwoPoint,
            CrossoverType::Uniform,
            CrossoverType::CourseBased,
        ] {
            let ops = GeneticOperators::default().with_crossover(crossover);
            let (c1, c2) = ops.crossover(&p1, &p2, &mut rng);
            assert_eq!(course_ids(&c1), course_ids(&p1));
            assert_eq!(course_ids(&c2), course_ids(&p1));
            for i in 0..p1.len() {
                let pair = (&c1.genes()[i], &c2.genes()[i]);
                assert!(
                    pair == (&p1.genes()[i], &p2.genes()[i])
                        || pair == (&p2.genes()[i], &p1.genes()[i])
                );
            }
        }
    }

    #[test]
    fn test_course_based_splits_in_half() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(3);
        let p1 = p.random_individual(&mut rng);
        let p2 = Individual::new(
            p1.genes()
                .iter()
                .map(|g| g.with_teacher("OTHER"))
                .collect(),
        );
        let (c1, _) = GeneticOperators::default().crossover(&p1, &p2, &mut rng);
        let from_p1 = c1.genes().iter().filter(|g| g.teacher_id != "OTHER").count();
        assert_eq!(from_p1, 3);
    }

    #[test]
    fn test_mutations_do_not_touch_parent() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut parent = p.random_individual(&mut rng);
        p.score(&mut parent);
        let snapshot = parent.clone();

        for mutation in [
            MutationType::Random,
            MutationType::Swap,
            MutationType::TimeShift,
            MutationType::Guided,
        ] {
            let ops = GeneticOperators::default().with_mutation(mutation);
            let child = ops.mutate(&parent, &p, &mut rng);
            assert_eq!(child.len(), parent.len());
            assert!(child.cached_fitness().is_none());
            assert_eq!(course_ids(&child), course_ids(&parent));
        }
        assert_eq!(parent, snapshot);
    }

    #[test]
    fn test_swap_exchanges_times() {
        let genes = vec![
            Assignment::new("C1", "T1", "R1", 1, 1).unwrap(),
            Assignment::new("C2", "T2", "R2", 4, 3).unwrap(),
        ];
        let ind = Individual::new(genes);
        let mut rng = SmallRng::seed_from_u64(0);
        let child = swap_mutation(&ind, &mut rng);
        assert_eq!(child.genes()[0].time_key(), (4, 3));
        assert_eq!(child.genes()[1].time_key(), (1, 1));
        assert_eq!(child.genes()[0].teacher_id, "T1");
    }

    #[test]
    fn test_time_shift_moves_to_neighbour() {
        let p = problem();
        let ind = Individual::new(vec![Assignment::new("C1", "T1", "R1", 2, 1).unwrap()]);
        let mut rng = SmallRng::seed_from_u64(5);
        let child = time_shift_mutation(&ind, &p, &mut rng);
        // Slot 1 has only slot 2 as a same-day neighbour.
        assert_eq!(child.genes()[0].time_key(), (2, 2));
    }

    #[test]
    fn test_guided_repairs_clash() {
        let p = problem();
        let clash: Vec<Assignment> = p
            .domains()
            .iter()
            .map(|d| Assignment::new(d.course_id.clone(), "T1", "R1", 1, 1).unwrap())
            .collect();
        let mut ind = Individual::new(clash);
        let before = p.conflicting_genes(&ind).len();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..30 {
            ind = guided_mutation(&ind, &p, &mut rng);
        }
        assert!(p.conflicting_genes(&ind).len() < before);
    }
}
