//! Neighbor discovery under periodic boundaries.
//!
//! Every strategy returns, for each particle `i`, the ascending list of indices
//! `j` with `periodic_distance(pos[i], pos[j]) <= radius[i]`. The querying
//! particle's own radius is used, so the relation is not symmetric when radii
//! differ. A particle always lists itself.

mod grid;
mod tree;

use crate::config::NeighborSearch;
use crate::geometry::Domain;

pub use grid::CellGrid;

/// Neighbor sets for all particles, stored contiguously.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborLists {
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl Default for NeighborLists {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborLists {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }

    /// Number of particles with a recorded neighbor set.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ascending neighbor indices of particle `i` (itself included).
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.indices[w[0]..w[1]])
    }

    /// Total number of (querier, neighbor) entries, self pairs included.
    pub fn total_entries(&self) -> usize {
        self.indices.len()
    }

    pub(crate) fn clear(&mut self) {
        self.offsets.clear();
        self.offsets.push(0);
        self.indices.clear();
    }

    pub(crate) fn push(&mut self, index: usize) {
        self.indices.push(index);
    }

    /// Finish the set currently being filled.
    pub(crate) fn close_set(&mut self) {
        let start = self.offsets.last().copied().unwrap_or(0);
        self.indices[start..].sort_unstable();
        self.offsets.push(self.indices.len());
    }
}

/// Runs the configured neighbor strategy, keeping its scratch structures
/// between steps.
#[derive(Clone, Debug)]
pub struct NeighborFinder {
    strategy: NeighborSearch,
    grid: CellGrid,
}

impl NeighborFinder {
    pub fn new(strategy: NeighborSearch) -> Self {
        Self {
            strategy,
            grid: CellGrid::default(),
        }
    }

    pub fn strategy(&self) -> NeighborSearch {
        self.strategy
    }

    /// Fill `out` with the neighbor set of every particle.
    ///
    /// `positions` must lie inside `domain` and `radii` must be positive with
    /// one entry per position.
    pub fn find(
        &mut self,
        domain: &Domain,
        positions: &[[f64; 2]],
        radii: &[f64],
        out: &mut NeighborLists,
    ) {
        debug_assert_eq!(positions.len(), radii.len());
        match self.strategy {
            NeighborSearch::AllPairs => find_all_pairs(domain, positions, radii, out),
            NeighborSearch::CellGrid => {
                let min_radius = radii.iter().copied().fold(f64::INFINITY, f64::min);
                self.grid.rebuild(domain, positions, min_radius);
                self.grid.find(domain, positions, radii, out);
            }
            NeighborSearch::RTree => tree::find_rtree(domain, positions, radii, out),
        }
    }
}

/// Reference O(N^2) search.
pub fn find_all_pairs(
    domain: &Domain,
    positions: &[[f64; 2]],
    radii: &[f64],
    out: &mut NeighborLists,
) {
    out.clear();
    for (&center, &radius) in positions.iter().zip(radii) {
        let r_sq = radius * radius;
        for (j, &other) in positions.iter().enumerate() {
            if domain.distance_sq(center, other) <= r_sq {
                out.push(j);
            }
        }
        out.close_set();
    }
}

/// Convenience wrapper allocating a fresh finder and output.
pub fn find_neighbors(
    strategy: NeighborSearch,
    domain: &Domain,
    positions: &[[f64; 2]],
    radii: &[f64],
) -> NeighborLists {
    let mut out = NeighborLists::new();
    NeighborFinder::new(strategy).find(domain, positions, radii, &mut out);
    out
}
