//! A single layer of the HNSW hierarchy: adjacency lists indexed by node id.

/// Identifier for a node in the graph; a dense index into the graph's
/// vector and tombstone arrays, distinct from the caller-facing string id
/// (see [`super::mappings`]).
pub(crate) type NodeId = usize;

/// One layer's adjacency lists.
///
/// Unlike the teacher's per-node `RwLock<Vec<NodeId>>`, entries here carry
/// no internal lock: [`super::graph::HnswGraph`] is always accessed
/// through the single outer read-write lock owned by
/// [`super::HnswIndex`], so interior synchronization at this level would
/// be redundant (spec.md §5, §9 "Shared mutable state").
#[derive(Debug, Default)]
pub(crate) struct Layer {
    neighbors: Vec<Vec<NodeId>>,
}

impl Layer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            neighbors: vec![Vec::new(); capacity],
        }
    }

    pub(crate) fn ensure_capacity(&mut self, node_id: NodeId) {
        if self.neighbors.len() <= node_id {
            self.neighbors.resize_with(node_id + 1, Vec::new);
        }
    }

    pub(crate) fn get_neighbors(&self, node_id: NodeId) -> &[NodeId] {
        self.neighbors.get(node_id).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn set_neighbors(&mut self, node_id: NodeId, neighbors: Vec<NodeId>) {
        if node_id >= self.neighbors.len() {
            self.ensure_capacity(node_id);
        }
        self.neighbors[node_id] = neighbors;
    }
}

#[cfg(test)]
#[path = "layer_tests.rs"]
mod tests;
