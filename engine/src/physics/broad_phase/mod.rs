//! Broad phase: cheap culling of body pairs before exact collision tests
//!
//! Three interchangeable strategies share one interface through the
//! [`BroadPhase`] enum:
//!
//! - [`aabb_tree`] - incrementally maintained bounding volume hierarchy
//!   (default)
//! - [`sweep_and_prune`] - sorted sweep along X
//! - [`spatial_hash`] - uniform grid
//!
//! All of them report exactly the pairs whose stored boxes overlap, each
//! pair once as `(lower id, higher id)`.

pub mod aabb_tree;
pub mod spatial_hash;
pub mod sweep_and_prune;

pub use aabb_tree::{AabbTree, TreeError};
pub use spatial_hash::SpatialHash;
pub use sweep_and_prune::SweepAndPrune;

use crate::config::BroadPhaseConfig;
use crate::physics::body::BodyId;
use crate::physics::types::Aabb;

/// A broad-phase strategy holding one box per body.
#[derive(Debug, Clone)]
pub enum BroadPhase {
    AabbTree(AabbTree),
    SweepAndPrune(SweepAndPrune),
    SpatialHash(SpatialHash),
}

impl Default for BroadPhase {
    fn default() -> Self {
        BroadPhase::AabbTree(AabbTree::default())
    }
}

impl BroadPhase {
    pub fn from_config(config: &BroadPhaseConfig) -> Self {
        let broad_phase = match *config {
            BroadPhaseConfig::AabbTree { margin } => BroadPhase::AabbTree(AabbTree::new(margin)),
            BroadPhaseConfig::SweepAndPrune => BroadPhase::SweepAndPrune(SweepAndPrune::new()),
            BroadPhaseConfig::SpatialHash { cell_size } => {
                BroadPhase::SpatialHash(SpatialHash::new(cell_size))
            }
        };
        tracing::debug!("broad phase: {}", broad_phase.name());
        broad_phase
    }

    pub fn name(&self) -> &'static str {
        match self {
            BroadPhase::AabbTree(_) => "aabb tree",
            BroadPhase::SweepAndPrune(_) => "sweep and prune",
            BroadPhase::SpatialHash(_) => "spatial hash",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BroadPhase::AabbTree(tree) => tree.len(),
            BroadPhase::SweepAndPrune(sap) => sap.len(),
            BroadPhase::SpatialHash(grid) => grid.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, id: BodyId, aabb: Aabb) {
        match self {
            BroadPhase::AabbTree(tree) => tree.insert(id, aabb),
            BroadPhase::SweepAndPrune(sap) => sap.insert(id, aabb),
            BroadPhase::SpatialHash(grid) => grid.insert(id, aabb),
        }
    }

    /// Stores new bounds for `id`. Unknown ids are ignored.
    pub fn update(&mut self, id: BodyId, aabb: Aabb) {
        match self {
            BroadPhase::AabbTree(tree) => {
                tree.update(id, aabb);
            }
            BroadPhase::SweepAndPrune(sap) => sap.update(id, aabb),
            BroadPhase::SpatialHash(grid) => grid.update(id, aabb),
        }
    }

    pub fn remove(&mut self, id: BodyId) -> bool {
        match self {
            BroadPhase::AabbTree(tree) => tree.remove(id),
            BroadPhase::SweepAndPrune(sap) => sap.remove(id),
            BroadPhase::SpatialHash(grid) => grid.remove(id),
        }
    }

    /// Appends to `out` every body whose box overlaps `aabb`, except
    /// `exclude`. Order is unspecified.
    pub fn query_into(&mut self, aabb: &Aabb, exclude: Option<BodyId>, out: &mut Vec<BodyId>) {
        match self {
            BroadPhase::AabbTree(tree) => tree.query_into(aabb, exclude, out),
            BroadPhase::SweepAndPrune(sap) => sap.query_into(aabb, exclude, out),
            BroadPhase::SpatialHash(grid) => grid.query_into(aabb, exclude, out),
        }
    }

    /// Replaces the contents of `out` with every overlapping pair, each once
    /// as `(lower id, higher id)`, sorted.
    pub fn collect_pairs(&mut self, out: &mut Vec<(BodyId, BodyId)>) {
        out.clear();
        match self {
            BroadPhase::AabbTree(tree) => tree.collect_pairs(out),
            BroadPhase::SweepAndPrune(sap) => sap.collect_pairs(out),
            BroadPhase::SpatialHash(grid) => grid.collect_pairs(out),
        }
        out.sort_unstable();
        out.dedup();
    }
}
