use rand::prelude::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::models::{Assignment, ReferenceData};

/// Draws per proposal before giving up on finding a distinct neighbour.
const PROPOSAL_TRIES: usize = 8;

/// Neighbourhood structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Exchange the (day, slot) of two sessions held at different times.
    Swap,
    /// Move one session to another active time point.
    Move,
    /// Put one session in another fitting classroom.
    ClassroomChange,
}

impl Neighborhood {
    /// Cycle order for variable neighbourhood search.
    pub const ALL: [Neighborhood; 3] = [
        Neighborhood::Swap,
        Neighborhood::Move,
        Neighborhood::ClassroomChange,
    ];

    /// A neighbour of `schedule`, or `None` when no distinct neighbour
    /// was found.
    pub fn propose<R: Rng + ?Sized>(
        self,
        schedule: &[Assignment],
        space: &MoveSpace,
        rng: &mut R,
    ) -> Option<Vec<Assignment>> {
        if schedule.is_empty() {
            return None;
        }
        for _ in 0..PROPOSAL_TRIES {
            let i = rng.random_range(0..schedule.len());
            let a = &schedule[i];
            match self {
                Neighborhood::Swap => {
                    if schedule.len() < 2 {
                        return None;
                    }
                    let mut j = rng.random_range(0..schedule.len() - 1);
                    if j >= i {
                        j += 1;
                    }
                    let b = &schedule[j];
                    if a.same_time(b) {
                        continue;
                    }
                    let (Ok(x), Ok(y)) = (a.with_time(b.day(), b.slot()), b.with_time(a.day(), a.slot()))
                    else {
                        continue;
                    };
                    let mut next = schedule.to_vec();
                    next[i] = x;
                    next[j] = y;
                    return Some(next);
                }
                Neighborhood::Move => {
                    let Some(&(day, slot)) = space.time_points.choose(rng) else {
                        return None;
                    };
                    if (day, slot) == a.time_key() {
                        continue;
                    }
                    let Ok(moved) = a.with_time(day, slot) else {
                        continue;
                    };
                    let mut next = schedule.to_vec();
                    next[i] = moved;
                    return Some(next);
                }
                Neighborhood::ClassroomChange => {
                    let Some(room) = space
                        .rooms
                        .get(&a.course_id)
                        .and_then(|rooms| rooms.choose(rng))
                    else {
                        continue;
                    };
                    if *room == a.classroom_id {
                        continue;
                    }
                    let mut next = schedule.to_vec();
                    next[i] = a.with_classroom(room.clone());
                    return Some(next);
                }
            }
        }
        None
    }
}

/// Values the neighbourhoods may assign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveSpace {
    /// Active (day, slot) pairs.
    pub time_points: Vec<(u8, u8)>,
    /// Course id → fitting usable classroom ids.
    pub rooms: HashMap<String, Vec<String>>,
}

impl MoveSpace {
    pub fn from_reference(data: &dyn ReferenceData) -> Self {
        let rooms = data
            .courses()
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    data.fitting_classrooms(c)
                        .into_iter()
                        .map(|r| r.id.clone())
                        .collect(),
                )
            })
            .collect();
        Self {
            time_points: data.time_slots().time_points(),
            rooms,
        }
    }
}

/// Order-sensitive fingerprint of a schedule, used by the tabu list.
pub fn solution_hash(schedule: &[Assignment]) -> u64 {
    let mut hasher = DefaultHasher::new();
    schedule.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classroom, Course, ReferenceCatalog, Teacher, TimeSlotCatalog};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn space() -> MoveSpace {
        let data = ReferenceCatalog::new(
            vec![Course::new("C1", 20), Course::new("C2", 60)],
            vec![Teacher::new("T1")],
            vec![Classroom::new("S", 30), Classroom::new("L", 80)],
            vec![],
            TimeSlotCatalog::weekly(2, 2),
        );
        MoveSpace::from_reference(&data)
    }

    fn schedule() -> Vec<Assignment> {
        vec![
            Assignment::new("C1", "T1", "S", 1, 1).unwrap(),
            Assignment::new("C2", "T1", "L", 2, 2).unwrap(),
        ]
    }

    #[test]
    fn test_move_space() {
        let s = space();
        assert_eq!(s.time_points.len(), 4);
        assert_eq!(s.rooms["C1"], vec!["S".to_string(), "L".to_string()]);
        assert_eq!(s.rooms["C2"], vec!["L".to_string()]);
    }

    #[test]
    fn test_swap_exchanges_times() {
        let mut rng = SmallRng::seed_from_u64(42);
        let next = Neighborhood::Swap
            .propose(&schedule(), &space(), &mut rng)
            .unwrap();
        assert_eq!(next[0].time_key(), (2, 2));
        assert_eq!(next[1].time_key(), (1, 1));
    }

    #[test]
    fn test_move_changes_one_time() {
        let mut rng = SmallRng::seed_from_u64(42);
        let base = schedule();
        let next = Neighborhood::Move.propose(&base, &space(), &mut rng).unwrap();
        let changed: Vec<usize> = (0..2).filter(|&i| next[i] != base[i]).collect();
        assert_eq!(changed.len(), 1);
        assert_ne!(next[changed[0]].time_key(), base[changed[0]].time_key());
    }

    #[test]
    fn test_classroom_change_stays_fitting() {
        let mut rng = SmallRng::seed_from_u64(7);
        let base = schedule();
        for _ in 0..10 {
            if let Some(next) = Neighborhood::ClassroomChange.propose(&base, &space(), &mut rng) {
                // Only C1 has an alternative room.
                assert_eq!(next[0].classroom_id, "L");
                assert_eq!(next[1], base[1]);
            }
        }
    }

    #[test]
    fn test_no_neighbour() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(Neighborhood::Move.propose(&[], &space(), &mut rng).is_none());
        let one = vec![schedule().remove(0)];
        assert!(Neighborhood::Swap.propose(&one, &space(), &mut rng).is_none());
    }

    #[test]
    fn test_solution_hash() {
        let a = schedule();
        let mut b = schedule();
        assert_eq!(solution_hash(&a), solution_hash(&b));
        b[0] = b[0].with_classroom("L");
        assert_ne!(solution_hash(&a), solution_hash(&b));
    }
}
