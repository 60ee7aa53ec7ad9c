//! Bidirectional mapping between caller-facing string ids and the dense
//! internal [`NodeId`]s the graph actually indexes by.
//!
//! Modeled on the teacher crate's `HnswMappings`, generalized from `u64`
//! external ids to the opaque string ids this spec requires (spec.md §3).

use super::layer::NodeId;
use rustc_hash::FxHashMap;

/// Id table for one [`super::graph::HnswGraph`].
///
/// `node_to_id` is never shrunk: a tombstoned node keeps its slot and its
/// id here so the graph can still report it during serialization and
/// neighbor-list traversal, even though `id_to_node` no longer resolves
/// it.
#[derive(Debug, Default)]
pub(crate) struct Mappings {
    id_to_node: FxHashMap<String, NodeId>,
    node_to_id: Vec<String>,
}

impl Mappings {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh node for `id`, returning its node id. Panics if
    /// `id` is already registered — callers must check [`Self::contains`]
    /// first.
    pub(crate) fn insert(&mut self, id: &str) -> NodeId {
        debug_assert!(!self.id_to_node.contains_key(id));
        let node = self.node_to_id.len();
        self.node_to_id.push(id.to_string());
        self.id_to_node.insert(id.to_string(), node);
        node
    }

    /// Reassigns an existing node slot to a new id, for `allow_replace_deleted`
    /// slot recycling during insert.
    pub(crate) fn rebind(&mut self, node: NodeId, id: &str) {
        self.node_to_id[node] = id.to_string();
        self.id_to_node.insert(id.to_string(), node);
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.id_to_node.contains_key(id)
    }

    pub(crate) fn node_of(&self, id: &str) -> Option<NodeId> {
        self.id_to_node.get(id).copied()
    }

    pub(crate) fn id_of(&self, node: NodeId) -> &str {
        &self.node_to_id[node]
    }

    /// Removes the live mapping for `id` (used by delete); the node's slot
    /// and stored id string are left in place for traversal/serialization.
    pub(crate) fn unmap(&mut self, id: &str) {
        self.id_to_node.remove(id);
    }

    pub(crate) fn len(&self) -> usize {
        self.node_to_id.len()
    }
}

#[cfg(test)]
#[path = "mappings_tests.rs"]
mod tests;
