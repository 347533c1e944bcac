mod node;

pub use self::node::*;
use crate::{Bezier, BoundingBox, BuildError};

/// The built tree: node arenas, the leaf curve slab, and the published
/// root/bounds.
///
/// Nodes live in two arenas (one per flavour) addressed by [`NodeRef`];
/// leaves copy their curves into one contiguous slab. Nothing is ever freed
/// during a build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bvh {
    aligned_nodes: Vec<AlignedNode>,
    unaligned_nodes: Vec<UnalignedNode>,
    leaf_curves: Vec<Bezier>,
    node_budget: usize,
    pub root: NodeRef,
    pub bounds: BoundingBox,
    pub num_primitives: usize,
    pub num_vertices: usize,
}

impl Bvh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the arenas and fixes the node budget; builders pass three times
    /// their primitive count. Allocating past the budget fails the build.
    pub fn init(&mut self, capacity_hint: usize) {
        self.aligned_nodes.clear();
        self.unaligned_nodes.clear();
        self.leaf_curves.clear();

        self.aligned_nodes.reserve(capacity_hint);
        self.leaf_curves.reserve(capacity_hint);

        self.node_budget = capacity_hint;
        self.root = NodeRef::EMPTY;
        self.bounds = Default::default();
        self.num_primitives = 0;
        self.num_vertices = 0;
    }

    fn nodes_allocated(&self) -> usize {
        self.aligned_nodes.len() + self.unaligned_nodes.len()
    }

    /// The thread index picks the allocation slab when independent builds
    /// run in parallel; a single-slab arena serves one build and ignores it.
    pub fn alloc_aligned_node(
        &mut self,
        _thread_index: usize,
    ) -> Result<usize, BuildError> {
        if self.nodes_allocated() >= self.node_budget {
            return Err(BuildError::ArenaFull {
                budget: self.node_budget,
            });
        }

        self.aligned_nodes.push(Default::default());

        Ok(self.aligned_nodes.len() - 1)
    }

    pub fn alloc_unaligned_node(
        &mut self,
        _thread_index: usize,
    ) -> Result<usize, BuildError> {
        if self.nodes_allocated() >= self.node_budget {
            return Err(BuildError::ArenaFull {
                budget: self.node_budget,
            });
        }

        self.unaligned_nodes.push(Default::default());

        Ok(self.unaligned_nodes.len() - 1)
    }

    /// Copies `curves` into the leaf slab and returns the block's offset.
    pub fn alloc_primitive_block(
        &mut self,
        _thread_index: usize,
        curves: &[Bezier],
    ) -> Result<usize, BuildError> {
        let offset = self.leaf_curves.len();
        let max = 1 << 26;

        if offset + curves.len() > max {
            return Err(BuildError::LeafArenaFull {
                got: offset + curves.len(),
                max,
            });
        }

        self.leaf_curves.extend_from_slice(curves);

        Ok(offset)
    }

    pub fn aligned_node(&self, index: usize) -> &AlignedNode {
        &self.aligned_nodes[index]
    }

    pub fn aligned_node_mut(&mut self, index: usize) -> &mut AlignedNode {
        &mut self.aligned_nodes[index]
    }

    pub fn unaligned_node(&self, index: usize) -> &UnalignedNode {
        &self.unaligned_nodes[index]
    }

    pub fn unaligned_node_mut(&mut self, index: usize) -> &mut UnalignedNode {
        &mut self.unaligned_nodes[index]
    }

    pub fn num_aligned_nodes(&self) -> usize {
        self.aligned_nodes.len()
    }

    pub fn num_unaligned_nodes(&self) -> usize {
        self.unaligned_nodes.len()
    }

    /// Curves of the leaf block behind `node`.
    pub fn leaf_curves(&self, node: NodeRef) -> &[Bezier] {
        let (offset, count) = node.leaf_range();

        &self.leaf_curves[offset..offset + count]
    }

    /// Every curve copied into a leaf, across all blocks.
    pub fn all_leaf_curves(&self) -> &[Bezier] {
        &self.leaf_curves
    }
}
