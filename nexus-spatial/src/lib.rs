//! Uniform 3-D spatial hash grid. Touched only from the owning room's
//! tick; no thread-safety claim. Buckets entities by a fixed-size cell so
//! proximity queries stay O(nearby) instead of O(all entities).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use nexus_core::vector::Vector3;

pub type Cell = (i64, i64, i64);

/// Default cell size in world units.
pub const DEFAULT_CELL_SIZE: f64 = 10.0;

fn cell_of(p: Vector3, cell_size: f64) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// A spatial hash grid over entities of type `E`. `E` is expected to be a
/// cheap, `Copy` id (the room's `EntityId`/`AccountId` newtypes).
pub struct SpatialGrid<E: Copy + Eq + Hash> {
    cell_size: f64,
    buckets: HashMap<Cell, Vec<E>>,
    positions: HashMap<E, Cell>,
}

impl<E: Copy + Eq + Hash> SpatialGrid<E> {
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            buckets: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Inserts `e` at `p`. If `e` already has a binding, that binding is
    /// replaced rather than leaving the entity in two buckets at once.
    pub fn insert(&mut self, e: E, p: Vector3) {
        if self.positions.contains_key(&e) {
            self.remove(e);
        }
        let cell = cell_of(p, self.cell_size);
        self.buckets.entry(cell).or_default().push(e);
        self.positions.insert(e, cell);
    }

    /// Removes `e` regardless of its last known position. A no-op if `e`
    /// is absent.
    pub fn remove(&mut self, e: E) {
        let Some(cell) = self.positions.remove(&e) else {
            return;
        };
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.retain(|existing| *existing != e);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }

    /// Moves `e` from its current bucket to the one covering `p_new`. A
    /// no-op bucket change when `p_new` hashes to the same cell the entity
    /// is already in.
    pub fn move_entity(&mut self, e: E, p_new: Vector3) {
        let new_cell = cell_of(p_new, self.cell_size);
        if self.positions.get(&e) == Some(&new_cell) {
            return;
        }
        self.insert(e, p_new);
    }

    /// Enumerates every bucket overlapping the cube enclosing `radius`
    /// around `center`, returning a lazy, single-pass, id-deduplicated
    /// sequence of entities. Callers that need precise distance (the tick
    /// loop does, for hit resolution) filter the results themselves.
    pub fn query(&self, center: Vector3, radius: f64) -> impl Iterator<Item = E> + '_ {
        let min = cell_of(
            Vector3::new(center.x - radius, center.y - radius, center.z - radius),
            self.cell_size,
        );
        let max = cell_of(
            Vector3::new(center.x + radius, center.y + radius, center.z + radius),
            self.cell_size,
        );

        let mut seen = HashSet::new();
        let cells: Vec<Cell> = (min.0..=max.0)
            .flat_map(move |x| {
                (min.1..=max.1).flat_map(move |y| (min.2..=max.2).map(move |z| (x, y, z)))
            })
            .collect();

        cells
            .into_iter()
            .filter_map(move |cell| self.buckets.get(&cell))
            .flat_map(|bucket| bucket.iter().copied())
            .filter(move |e| seen.insert(*e))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.positions.clear();
    }
}

impl<E: Copy + Eq + Hash> Default for SpatialGrid<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query_finds_nearby_entities() {
        let mut grid: SpatialGrid<u64> = SpatialGrid::new(10.0);
        grid.insert(1, Vector3::new(0.0, 0.0, 0.0));
        grid.insert(2, Vector3::new(5.0, 0.0, 0.0));
        grid.insert(3, Vector3::new(500.0, 0.0, 0.0));

        let found: HashSet<u64> = grid.query(Vector3::new(0.0, 0.0, 0.0), 10.0).collect();
        assert!(found.contains(&1));
        assert!(found.contains(&2));
        assert!(!found.contains(&3));
    }

    #[test]
    fn duplicate_insert_replaces_binding() {
        let mut grid: SpatialGrid<u64> = SpatialGrid::new(10.0);
        grid.insert(1, Vector3::new(0.0, 0.0, 0.0));
        grid.insert(1, Vector3::new(500.0, 0.0, 0.0));
        assert_eq!(grid.len(), 1);
        let near_origin: Vec<u64> = grid.query(Vector3::new(0.0, 0.0, 0.0), 10.0).collect();
        assert!(near_origin.is_empty());
        let near_new: Vec<u64> = grid.query(Vector3::new(500.0, 0.0, 0.0), 10.0).collect();
        assert_eq!(near_new, vec![1]);
    }

    #[test]
    fn remove_absent_entity_is_noop() {
        let mut grid: SpatialGrid<u64> = SpatialGrid::new(10.0);
        grid.remove(99);
        assert!(grid.is_empty());
    }

    #[test]
    fn move_entity_updates_bucket() {
        let mut grid: SpatialGrid<u64> = SpatialGrid::new(10.0);
        grid.insert(1, Vector3::new(0.0, 0.0, 0.0));
        grid.move_entity(1, Vector3::new(100.0, 0.0, 0.0));
        let at_origin: Vec<u64> = grid.query(Vector3::new(0.0, 0.0, 0.0), 5.0).collect();
        assert!(at_origin.is_empty());
        let at_new: Vec<u64> = grid.query(Vector3::new(100.0, 0.0, 0.0), 5.0).collect();
        assert_eq!(at_new, vec![1]);
    }

    #[test]
    fn query_deduplicates_across_overlapping_buckets() {
        let mut grid: SpatialGrid<u64> = SpatialGrid::new(10.0);
        grid.insert(1, Vector3::new(9.9, 9.9, 9.9));
        let found: Vec<u64> = grid.query(Vector3::new(10.0, 10.0, 10.0), 15.0).collect();
        assert_eq!(found, vec![1]);
    }
}
