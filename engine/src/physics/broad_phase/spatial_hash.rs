//! Uniform grid broad phase
//!
//! Space is cut into cubes of `cell_size`. Each body is registered in every
//! cell its box touches, and two bodies are candidates when they share a
//! cell and their boxes overlap. Moving a body only rewrites the cells it
//! entered or left. Bodies covering too many cells (a large floor) are kept
//! in a separate list and tested against everyone instead.

use std::collections::HashMap;

use glam::{I64Vec3, IVec3};

use crate::physics::body::BodyId;
use crate::physics::types::Aabb;

/// Default edge length of a grid cell.
pub const DEFAULT_CELL_SIZE: f32 = 4.0;

/// Bodies spanning more cells than this skip the grid.
const MAX_CELLS_PER_BODY: i64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: IVec3,
    max: IVec3,
}

impl CellRange {
    fn cells(self) -> impl Iterator<Item = IVec3> {
        (self.min.x..=self.max.x).flat_map(move |x| {
            (self.min.y..=self.max.y)
                .flat_map(move |y| (self.min.z..=self.max.z).map(move |z| IVec3::new(x, y, z)))
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct HashedBody {
    aabb: Aabb,
    /// `None` when the body lives in the oversized list
    range: Option<CellRange>,
}

#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<IVec3, Vec<BodyId>>,
    bodies: HashMap<BodyId, HashedBody>,
    oversized: Vec<BodyId>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialHash {
    /// Creates an empty grid. Non-positive sizes fall back to the default.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            tracing::warn!("spatial hash cell size {} is invalid, using {}", cell_size, DEFAULT_CELL_SIZE);
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            bodies: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Number of non-empty grid cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_range(&self, aabb: &Aabb) -> Option<CellRange> {
        if !aabb.is_finite() {
            return None;
        }
        let min = (aabb.min / self.cell_size).floor().as_i64vec3();
        let max = (aabb.max / self.cell_size).floor().as_i64vec3();
        // Cells past the i32 grid go to the oversized list
        let lowest = I64Vec3::splat(i64::from(i32::MIN));
        let highest = I64Vec3::splat(i64::from(i32::MAX));
        if min.cmplt(lowest).any() || max.cmpgt(highest).any() {
            return None;
        }
        let span = max - min + 1;
        if span.x.saturating_mul(span.y).saturating_mul(span.z) > MAX_CELLS_PER_BODY {
            return None;
        }
        Some(CellRange {
            min: min.as_ivec3(),
            max: max.as_ivec3(),
        })
    }

    fn link(&mut self, id: BodyId, range: Option<CellRange>) {
        match range {
            Some(range) => {
                for cell in range.cells() {
                    self.cells.entry(cell).or_default().push(id);
                }
            }
            None => self.oversized.push(id),
        }
    }

    fn unlink(&mut self, id: BodyId, range: Option<CellRange>) {
        match range {
            Some(range) => {
                for cell in range.cells() {
                    if let Some(ids) = self.cells.get_mut(&cell) {
                        ids.retain(|&other| other != id);
                        if ids.is_empty() {
                            self.cells.remove(&cell);
                        }
                    }
                }
            }
            None => self.oversized.retain(|&other| other != id),
        }
    }

    pub fn insert(&mut self, id: BodyId, aabb: Aabb) {
        if self.bodies.contains_key(&id) {
            self.update(id, aabb);
            return;
        }
        let range = self.cell_range(&aabb);
        self.bodies.insert(id, HashedBody { aabb, range });
        self.link(id, range);
    }

    /// Moves a body, re-hashing only if its cell range changed.
    pub fn update(&mut self, id: BodyId, aabb: Aabb) {
        let range = self.cell_range(&aabb);
        let Some(body) = self.bodies.get_mut(&id) else {
            return;
        };
        body.aabb = aabb;
        let old = body.range;
        if old == range {
            return;
        }
        body.range = range;
        self.unlink(id, old);
        self.link(id, range);
    }

    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(body) = self.bodies.remove(&id) else {
            return false;
        };
        self.unlink(id, body.range);
        true
    }

    /// Appends to `out` every stored body overlapping `aabb`, except `exclude`.
    pub fn query_into(&self, aabb: &Aabb, exclude: Option<BodyId>, out: &mut Vec<BodyId>) {
        let start = out.len();
        let accept = |id: &BodyId| {
            Some(*id) != exclude && self.bodies.get(id).is_some_and(|b| b.aabb.overlaps(aabb))
        };

        match self.cell_range(aabb) {
            Some(range) => {
                for cell in range.cells() {
                    if let Some(ids) = self.cells.get(&cell) {
                        out.extend(ids.iter().filter(|id| accept(id)));
                    }
                }
                out.extend(self.oversized.iter().filter(|id| accept(id)));
            }
            None => out.extend(self.bodies.keys().filter(|id| accept(id))),
        }

        // A body spanning several cells is found once per cell
        let mut found = out.split_off(start);
        found.sort_unstable();
        found.dedup();
        out.extend(found);
    }

    /// Appends every overlapping pair to `out` as `(lower id, higher id)`,
    /// sorted and without duplicates.
    pub fn collect_pairs(&self, out: &mut Vec<(BodyId, BodyId)>) {
        let start = out.len();
        let mut push = |a: BodyId, b: BodyId| {
            if a == b {
                return;
            }
            let (Some(ba), Some(bb)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
                return;
            };
            if ba.aabb.overlaps(&bb.aabb) {
                out.push(if a < b { (a, b) } else { (b, a) });
            }
        };

        for ids in self.cells.values() {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    push(a, b);
                }
            }
        }
        for &big in &self.oversized {
            for &other in self.bodies.keys() {
                // Oversized pairs are reported from the lower id only
                if self.bodies.get(&other).is_some_and(|b| b.range.is_none()) && other < big {
                    continue;
                }
                push(big, other);
            }
        }

        out[start..].sort_unstable();
        let mut pairs = out.split_off(start);
        pairs.dedup();
        out.extend(pairs);
    }
}
