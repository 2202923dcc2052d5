//! Sweep and prune along the X axis
//!
//! Bodies are kept in a list sorted by the lower X bound of their boxes.
//! Sweeping that list with an active set finds every pair whose X intervals
//! overlap; the full 3-axis test then confirms it. The order persists between
//! calls, so for slowly moving bodies the re-sort is close to linear.

use std::collections::HashMap;

use crate::physics::body::BodyId;
use crate::physics::types::Aabb;

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: BodyId,
    aabb: Aabb,
}

#[derive(Debug, Clone, Default)]
pub struct SweepAndPrune {
    entries: Vec<Entry>,
    positions: HashMap<BodyId, usize>,
    /// Entry indices ordered by `aabb.min.x`
    sorted: Vec<usize>,
    active: Vec<usize>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, id: BodyId, aabb: Aabb) {
        if let Some(&index) = self.positions.get(&id) {
            self.entries[index].aabb = aabb;
            return;
        }
        self.positions.insert(id, self.entries.len());
        self.sorted.push(self.entries.len());
        self.entries.push(Entry { id, aabb });
    }

    /// Stores new bounds for `id`. Unknown ids are ignored.
    pub fn update(&mut self, id: BodyId, aabb: Aabb) {
        if let Some(&index) = self.positions.get(&id) {
            self.entries[index].aabb = aabb;
        }
    }

    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(index) = self.positions.remove(&id) else {
            return false;
        };
        let last = self.entries.len() - 1;
        self.entries.swap_remove(index);
        self.sorted.retain(|&i| i != index);
        if index != last {
            // The former last entry now lives at `index`
            self.positions.insert(self.entries[index].id, index);
            for i in &mut self.sorted {
                if *i == last {
                    *i = index;
                }
            }
        }
        true
    }

    /// Appends to `out` every stored body overlapping `aabb`, except `exclude`.
    pub fn query_into(&self, aabb: &Aabb, exclude: Option<BodyId>, out: &mut Vec<BodyId>) {
        out.extend(
            self.entries
                .iter()
                .filter(|e| Some(e.id) != exclude && e.aabb.overlaps(aabb))
                .map(|e| e.id),
        );
    }

    /// Appends every overlapping pair to `out` as `(lower id, higher id)`.
    pub fn collect_pairs(&mut self, out: &mut Vec<(BodyId, BodyId)>) {
        let entries = &self.entries;
        self.sorted
            .sort_by(|&a, &b| entries[a].aabb.min.x.total_cmp(&entries[b].aabb.min.x));

        self.active.clear();
        for &index in &self.sorted {
            let current = entries[index];
            self.active
                .retain(|&other| entries[other].aabb.max.x >= current.aabb.min.x);
            for &other in &self.active {
                let other = entries[other];
                if other.aabb.overlaps(&current.aabb) {
                    out.push(if other.id < current.id {
                        (other.id, current.id)
                    } else {
                        (current.id, other.id)
                    });
                }
            }
            self.active.push(index);
        }
    }
}
