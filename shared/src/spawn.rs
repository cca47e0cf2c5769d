//! Free-cell bookkeeping and random placement for apples and new players.

use crate::map::{Cell, Map};
use rand::Rng;
use std::collections::HashSet;

/// Result of a placement request. Fewer cells than requested means the
/// arena ran out of room; that is reported, not treated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnReport {
    pub placed: Vec<Cell>,
    pub requested: usize,
}

impl SpawnReport {
    pub fn is_insufficient(&self) -> bool {
        self.placed.len() < self.requested
    }

    pub fn shortfall(&self) -> usize {
        self.requested - self.placed.len()
    }
}

/// Cells that are neither barriers nor listed in `occupied`, row-major.
pub fn free_cells<I>(map: &Map, occupied: I) -> Vec<Cell>
where
    I: IntoIterator<Item = Cell>,
{
    let occupied: HashSet<Cell> = occupied.into_iter().collect();
    map.cells()
        .filter(|cell| !map.is_blocked(*cell) && !occupied.contains(cell))
        .collect()
}

/// Draws up to `count` distinct cells from `free`, uniformly and without
/// replacement.
pub fn sample_cells<R: Rng + ?Sized>(rng: &mut R, mut free: Vec<Cell>, count: usize) -> SpawnReport {
    let mut placed = Vec::with_capacity(count.min(free.len()));
    while placed.len() < count && !free.is_empty() {
        let index = rng.gen_range(0..free.len());
        placed.push(free.swap_remove(index));
    }
    SpawnReport {
        placed,
        requested: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_free_cells_excludes_barriers_and_occupied() {
        let map = Map::parse(&["#..", "...", "..."]).unwrap();
        let free = free_cells(&map, [Cell::new(0, 0), Cell::new(1, 1)]);
        assert_eq!(free.len(), 9 - 1 - 2);
        assert!(!free.contains(&Cell::new(0, 2)));
        assert!(!free.contains(&Cell::new(0, 0)));
        assert!(!free.contains(&Cell::new(1, 1)));
        assert_eq!(free[0], Cell::new(1, 0));
    }

    #[test]
    fn test_sample_without_replacement() {
        let map = Map::open(4, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let report = sample_cells(&mut rng, free_cells(&map, std::iter::empty()), 16);
        assert!(!report.is_insufficient());
        let unique: HashSet<Cell> = report.placed.iter().copied().collect();
        assert_eq!(unique.len(), 16);
    }

    #[test]
    fn test_sample_reports_insufficient_space() {
        let map = Map::open(2, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let report = sample_cells(&mut rng, free_cells(&map, [Cell::new(0, 0)]), 3);
        assert_eq!(report.placed, vec![Cell::new(1, 0)]);
        assert!(report.is_insufficient());
        assert_eq!(report.shortfall(), 2);
    }

    #[test]
    fn test_sample_zero() {
        let map = Map::open(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let report = sample_cells(&mut rng, free_cells(&map, std::iter::empty()), 0);
        assert!(report.placed.is_empty());
        assert!(!report.is_insufficient());
    }

    #[test]
    fn test_sample_is_deterministic_per_seed() {
        let map = Map::open(8, 8).unwrap();
        let a = sample_cells(&mut StdRng::seed_from_u64(99), free_cells(&map, std::iter::empty()), 5);
        let b = sample_cells(&mut StdRng::seed_from_u64(99), free_cells(&map, std::iter::empty()), 5);
        assert_eq!(a, b);
    }
}
