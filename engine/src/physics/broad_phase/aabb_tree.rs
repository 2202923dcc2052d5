//! Dynamic bounding volume hierarchy
//!
//! A binary tree over body bounds, kept up to date incrementally as bodies
//! move. Nodes live in an arena and refer to each other by index; removed
//! nodes go to a free list and are reused by later insertions, so a tree in
//! steady state does not allocate.
//!
//! # Insertion
//!
//! New leaves are paired with the existing leaf that minimises the growth in
//! surface area of the whole ancestor chain. The search is branch-and-bound:
//! candidates sit in a priority queue keyed by cost (own enlargement plus the
//! enlargement already forced on the ancestors), and the search stops once no
//! queued node can beat the best leaf found so far.
//!
//! # Margin
//!
//! A branch whose children are both leaves is padded by `margin` on every
//! side. Small movements then stay inside the parent bound and
//! [`AabbTree::update`] returns without touching the structure.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use crate::physics::body::BodyId;
use crate::physics::types::Aabb;

/// Default padding around branches whose children are both leaves.
pub const DEFAULT_TREE_MARGIN: f32 = 1.0;

type NodeIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind {
    Leaf(BodyId),
    Branch { left: NodeIndex, right: NodeIndex },
    Free,
}

#[derive(Debug, Clone)]
struct Node {
    aabb: Aabb,
    surface_area: f32,
    parent: Option<NodeIndex>,
    height: u32,
    kind: NodeKind,
}

impl Node {
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Growth in surface area if this node also had to cover `aabb`.
    fn enlargement(&self, aabb: &Aabb) -> f32 {
        self.aabb.union(aabb).surface_area() - self.surface_area
    }
}

/// Entry of the best-sibling search queue. Ordered so that the cheapest
/// candidate is popped first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f32,
    node: NodeIndex,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Structural problems reported by [`AabbTree::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A branch lists the same node as both children
    UnaryBranch { node: usize },
    /// A child does not point back at its parent
    ParentMismatch { node: usize },
    /// A child's bounds stick out of its parent's bounds
    ChildNotContained { node: usize },
    /// A branch's cached height disagrees with its children
    StaleHeight { node: usize },
    /// A node's cached surface area disagrees with its bounds
    StaleArea { node: usize },
    /// A leaf and the body lookup table disagree
    LeafMapMismatch { body: BodyId },
    /// A freed node is still linked into the tree
    FreeNodeReachable { node: usize },
    /// A node was reached twice while walking down from the root
    Cycle { node: usize },
    /// Live nodes that are not reachable from the root
    LeakedNodes { live: usize, reachable: usize },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::UnaryBranch { node } => write!(f, "branch {} has a single distinct child", node),
            TreeError::ParentMismatch { node } => write!(f, "node {} has a wrong parent link", node),
            TreeError::ChildNotContained { node } => {
                write!(f, "node {} is not contained by its parent", node)
            }
            TreeError::StaleHeight { node } => write!(f, "node {} has a stale height", node),
            TreeError::StaleArea { node } => write!(f, "node {} has a stale surface area", node),
            TreeError::LeafMapMismatch { body } => write!(f, "leaf table is wrong for body {}", body),
            TreeError::FreeNodeReachable { node } => write!(f, "freed node {} is still linked", node),
            TreeError::Cycle { node } => write!(f, "node {} is reachable twice", node),
            TreeError::LeakedNodes { live, reachable } => {
                write!(f, "{} live nodes but only {} reachable", live, reachable)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Dynamic AABB tree keyed by [`BodyId`].
#[derive(Debug, Clone)]
pub struct AabbTree {
    nodes: Vec<Node>,
    free: Vec<NodeIndex>,
    root: Option<NodeIndex>,
    leaves: HashMap<BodyId, NodeIndex>,
    margin: f32,
    // Scratch buffers reused across calls
    candidates: BinaryHeap<Candidate>,
    stack: Vec<NodeIndex>,
}

impl Default for AabbTree {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_MARGIN)
    }
}

impl AabbTree {
    pub fn new(margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            leaves: HashMap::new(),
            margin: margin.max(0.0),
            candidates: BinaryHeap::new(),
            stack: Vec::new(),
        }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Number of bodies in the tree.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Number of nodes currently linked into the tree (leaves and branches).
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Size of the node arena including freed slots.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the root (0 for a single leaf or an empty tree).
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.leaves.contains_key(&id)
    }

    /// Bounds stored for `id`.
    pub fn leaf_aabb(&self, id: BodyId) -> Option<Aabb> {
        self.leaves.get(&id).map(|&leaf| self.nodes[leaf].aabb)
    }

    /// Adds a body. Inserting an id that is already present updates it.
    pub fn insert(&mut self, id: BodyId, aabb: Aabb) {
        if self.leaves.contains_key(&id) {
            self.update(id, aabb);
            return;
        }
        let leaf = self.allocate(Node {
            aabb,
            surface_area: aabb.surface_area(),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf(id),
        });
        self.leaves.insert(id, leaf);
        self.insert_leaf(leaf);
    }

    /// Moves a body to new bounds.
    ///
    /// The leaf always takes the new bounds. The tree is only restructured
    /// when the parent's bounds no longer contain them. Returns `true` if the
    /// leaf was reinserted. Unknown ids are ignored.
    pub fn update(&mut self, id: BodyId, aabb: Aabb) -> bool {
        let Some(&leaf) = self.leaves.get(&id) else {
            return false;
        };
        self.nodes[leaf].aabb = aabb;
        self.nodes[leaf].surface_area = aabb.surface_area();

        match self.nodes[leaf].parent {
            None => false,
            Some(parent) if self.nodes[parent].aabb.contains(&aabb) => false,
            Some(_) => {
                self.remove_leaf(leaf);
                self.insert_leaf(leaf);
                true
            }
        }
    }

    /// Removes a body. Returns `false` if it was not in the tree.
    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(leaf) = self.leaves.remove(&id) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    /// Bodies whose stored bounds overlap `aabb`, skipping any leaf whose
    /// bounds are exactly `aabb` (the querying body itself).
    pub fn query(&self, aabb: &Aabb) -> Vec<BodyId> {
        let mut stack = Vec::new();
        let mut found = Vec::new();
        Self::traverse(&self.nodes, self.root, aabb, &mut stack, |id, leaf_aabb| {
            if leaf_aabb != aabb {
                found.push(id);
            }
        });
        found
    }

    /// Appends to `out` every body overlapping `aabb` other than `exclude`.
    ///
    /// Uses the tree's own scratch stack, so repeated calls do not allocate.
    pub fn query_into(&mut self, aabb: &Aabb, exclude: Option<BodyId>, out: &mut Vec<BodyId>) {
        Self::traverse(&self.nodes, self.root, aabb, &mut self.stack, |id, _| {
            if Some(id) != exclude {
                out.push(id);
            }
        });
    }

    /// Appends every overlapping pair of stored bounds to `out`, each pair
    /// once as `(lower id, higher id)`.
    pub fn collect_pairs(&mut self, out: &mut Vec<(BodyId, BodyId)>) {
        for index in 0..self.nodes.len() {
            let NodeKind::Leaf(id) = self.nodes[index].kind else {
                continue;
            };
            let aabb = self.nodes[index].aabb;
            Self::traverse(&self.nodes, self.root, &aabb, &mut self.stack, |other, _| {
                if other > id {
                    out.push((id, other));
                }
            });
        }
    }

    /// Iterative descent calling `visit` for every leaf overlapping `aabb`.
    fn traverse(
        nodes: &[Node],
        root: Option<NodeIndex>,
        aabb: &Aabb,
        stack: &mut Vec<NodeIndex>,
        mut visit: impl FnMut(BodyId, &Aabb),
    ) {
        stack.clear();
        stack.extend(root);
        while let Some(index) = stack.pop() {
            let node = &nodes[index];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(id) => visit(id, &node.aabb),
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
                NodeKind::Free => {}
            }
        }
    }

    fn allocate(&mut self, node: Node) -> NodeIndex {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, index: NodeIndex) {
        let node = &mut self.nodes[index];
        node.kind = NodeKind::Free;
        node.parent = None;
        node.height = 0;
        self.free.push(index);
    }

    /// Links an allocated but detached leaf into the tree.
    fn insert_leaf(&mut self, leaf: NodeIndex) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };

        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = self.find_best_sibling(root, &leaf_aabb);
        let old_parent = self.nodes[sibling].parent;

        let aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        let new_parent = self.allocate(Node {
            aabb,
            surface_area: aabb.surface_area(),
            parent: old_parent,
            height: self.nodes[sibling].height + 1,
            kind: NodeKind::Branch {
                left: sibling,
                right: leaf,
            },
        });

        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        self.refit_from(new_parent);
    }

    /// Branch-and-bound search for the leaf to pair a new box with.
    fn find_best_sibling(&mut self, root: NodeIndex, aabb: &Aabb) -> NodeIndex {
        self.candidates.clear();
        self.candidates.push(Candidate {
            cost: self.nodes[root].enlargement(aabb),
            node: root,
        });

        let mut best = root;
        let mut best_cost = f32::INFINITY;

        while let Some(candidate) = self.candidates.pop() {
            if candidate.cost >= best_cost {
                // Everything left in the queue costs at least as much
                break;
            }
            match self.nodes[candidate.node].kind {
                NodeKind::Branch { left, right } => {
                    for child in [left, right] {
                        let cost = self.nodes[child].enlargement(aabb) + candidate.cost;
                        if cost < best_cost {
                            self.candidates.push(Candidate { cost, node: child });
                        }
                    }
                }
                _ => {
                    best = candidate.node;
                    best_cost = candidate.cost;
                }
            }
        }
        best
    }

    /// Unlinks a leaf, splicing its sibling into the grandparent. The leaf
    /// itself stays allocated; its old parent is freed.
    fn remove_leaf(&mut self, leaf: NodeIndex) {
        let Some(parent) = self.nodes[leaf].parent else {
            if self.root == Some(leaf) {
                self.root = None;
            }
            return;
        };

        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch { left, right } if left == leaf => right,
            NodeKind::Branch { left, .. } => left,
            _ => return,
        };
        let grandparent = self.nodes[parent].parent;

        self.nodes[sibling].parent = grandparent;
        match grandparent {
            Some(grandparent) => {
                self.replace_child(grandparent, parent, sibling);
                self.free_node(parent);
                self.refit_from(grandparent);
            }
            None => {
                self.root = Some(sibling);
                self.free_node(parent);
            }
        }
        self.nodes[leaf].parent = None;
    }

    fn replace_child(&mut self, parent: NodeIndex, old: NodeIndex, new: NodeIndex) {
        if let NodeKind::Branch { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Recomputes bounds, area and height from `start` up to the root.
    fn refit_from(&mut self, start: NodeIndex) {
        let mut current = Some(start);
        while let Some(index) = current {
            if let NodeKind::Branch { left, right } = self.nodes[index].kind {
                let (l, r) = (&self.nodes[left], &self.nodes[right]);
                let mut aabb = l.aabb.union(&r.aabb);
                if l.is_leaf() && r.is_leaf() {
                    aabb = aabb.expanded(self.margin);
                }
                let height = 1 + l.height.max(r.height);

                let node = &mut self.nodes[index];
                node.aabb = aabb;
                node.surface_area = aabb.surface_area();
                node.height = height;
            }
            current = self.nodes[index].parent;
        }
    }

    /// Checks every structural invariant of the tree.
    pub fn validate(&self) -> Result<(), TreeError> {
        let Some(root) = self.root else {
            if let Some(&body) = self.leaves.keys().next() {
                return Err(TreeError::LeafMapMismatch { body });
            }
            return Ok(());
        };
        if self.nodes[root].parent.is_some() {
            return Err(TreeError::ParentMismatch { node: root });
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut reachable = 0;
        let mut leaf_count = 0;
        let mut stack = vec![root];

        while let Some(index) = stack.pop() {
            if visited[index] {
                return Err(TreeError::Cycle { node: index });
            }
            visited[index] = true;
            reachable += 1;

            let node = &self.nodes[index];
            if node.surface_area != node.aabb.surface_area() {
                return Err(TreeError::StaleArea { node: index });
            }
            match node.kind {
                NodeKind::Free => return Err(TreeError::FreeNodeReachable { node: index }),
                NodeKind::Leaf(body) => {
                    if self.leaves.get(&body) != Some(&index) {
                        return Err(TreeError::LeafMapMismatch { body });
                    }
                    leaf_count += 1;
                }
                NodeKind::Branch { left, right } => {
                    if left == right {
                        return Err(TreeError::UnaryBranch { node: index });
                    }
                    for child in [left, right] {
                        let child_node = &self.nodes[child];
                        if child_node.parent != Some(index) {
                            return Err(TreeError::ParentMismatch { node: child });
                        }
                        if !node.aabb.contains(&child_node.aabb) {
                            return Err(TreeError::ChildNotContained { node: child });
                        }
                    }
                    let expected = 1 + self.nodes[left].height.max(self.nodes[right].height);
                    if node.height != expected {
                        return Err(TreeError::StaleHeight { node: index });
                    }
                    stack.push(left);
                    stack.push(right);
                }
            }
        }

        if leaf_count != self.leaves.len() {
            let missing = self
                .leaves
                .iter()
                .find(|(_, leaf)| !visited[**leaf])
                .map(|(body, _)| *body);
            if let Some(body) = missing {
                return Err(TreeError::LeafMapMismatch { body });
            }
        }
        if reachable != self.node_count() {
            return Err(TreeError::LeakedNodes {
                live: self.node_count(),
                reachable,
            });
        }
        Ok(())
    }
}

/// Sideways text rendering, right subtree on top. Branches print as `B`
/// (`ROOT` for the root) and leaves as their body id.
impl fmt::Display for AabbTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.root else {
            return writeln!(f, "(empty)");
        };

        // (node, depth, children already scheduled)
        let mut stack = vec![(root, 0usize, false)];
        while let Some((index, depth, expanded)) = stack.pop() {
            match self.nodes[index].kind {
                NodeKind::Branch { left, right } if !expanded => {
                    stack.push((left, depth + 1, false));
                    stack.push((index, depth, true));
                    stack.push((right, depth + 1, false));
                }
                NodeKind::Branch { .. } => {
                    let label = if index == root { "ROOT" } else { "B" };
                    writeln!(f, "{:indent$}{}", "", label, indent = depth * 4)?;
                }
                NodeKind::Leaf(id) => writeln!(f, "{:indent$}{}", "", id, indent = depth * 4)?,
                NodeKind::Free => {}
            }
        }
        Ok(())
    }
}
