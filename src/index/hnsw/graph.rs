//! The HNSW graph itself: multi-layer adjacency lists over a dense node-id
//! space, plus the insertion, search, deletion and compaction algorithms
//! (spec.md §4.4).
//!
//! Unlike the teacher's [`super::layer`] equivalent, nothing in here
//! carries its own lock: the whole graph lives behind the single
//! reader-writer lock in [`super::HnswIndex`], so every method here takes
//! `&self` or `&mut self` directly (spec.md §5, §9 "Shared mutable
//! state"). This sidesteps the lock-ordering hazards a per-node-lock
//! design has to fight (the teacher crate carries a "BUG-CORE-001" fix for
//! exactly that).

use super::layer::{Layer, NodeId};
use super::mappings::Mappings;
use super::ordered_float::OrderedFloat;
use crate::config::HnswConfig;
use crate::distance::{distance as metric_distance, DistanceMetric};
use crate::error::{Error, Result};
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A candidate found during a layer search: a node and its distance to the
/// query that produced it.
type Candidate = (NodeId, f32);

/// One node's persisted shape: id, level, and per-level neighbor ids,
/// mirroring the `for each node: id, level, for each level neighbor_ids`
/// layout of spec.md §6's HNSW index file.
pub(crate) struct NodeSnapshot {
    pub(crate) id: String,
    pub(crate) level: usize,
    pub(crate) neighbors: Vec<Vec<String>>,
    pub(crate) tombstoned: bool,
}

/// Full exported graph structure, produced by [`HnswGraph::export`] and
/// consumed by [`HnswGraph::restore`].
pub(crate) struct GraphSnapshot {
    pub(crate) nodes: Vec<NodeSnapshot>,
    pub(crate) entry_point: Option<String>,
}

/// xorshift64 PRNG, seeded from [`HnswConfig::seed`]. Deliberately not
/// cryptographic: only used for level assignment, where speed matters and
/// any decent bit mixer gives the right level distribution.
struct Xorshift64(u64);

impl Xorshift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// The graph proper: per-node vectors, per-level adjacency, tombstones,
/// and the entry point. Holds its own copy of every inserted vector (the
/// canonical copy lives in the storage backend; this one exists so the
/// graph can keep computing distances against tombstoned nodes that are
/// still needed for connectivity).
pub(crate) struct HnswGraph {
    dimensions: usize,
    metric: DistanceMetric,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    allow_replace_deleted: bool,
    rng: Xorshift64,

    mappings: Mappings,
    vectors: Vec<Vec<f32>>,
    levels: Vec<usize>,
    tombstoned: Vec<bool>,
    layers: Vec<Layer>,
    free_list: Vec<NodeId>,

    entry_point: Option<NodeId>,
    live_count: usize,
    tombstone_count: usize,
}

impl HnswGraph {
    pub(crate) fn new(dimensions: usize, config: &HnswConfig) -> Self {
        Self {
            dimensions,
            metric: config.metric,
            m: config.m,
            m_max0: config.effective_m_max0(),
            ef_construction: config.ef_construction,
            allow_replace_deleted: config.allow_replace_deleted,
            rng: Xorshift64(config.seed | 1),
            mappings: Mappings::new(),
            vectors: Vec::new(),
            levels: Vec::new(),
            tombstoned: Vec::new(),
            layers: vec![Layer::new(0)],
            free_list: Vec::new(),
            entry_point: None,
            live_count: 0,
            tombstone_count: 0,
        }
    }

    pub(crate) fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub(crate) fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live_count
    }

    pub(crate) fn tombstone_count(&self) -> usize {
        self.tombstone_count
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.mappings.contains(id)
    }

    fn random_level(&mut self) -> usize {
        let m_l = 1.0 / (self.m as f64).ln();
        let u = self.rng.next_f64().max(f64::MIN_POSITIVE);
        (-u.ln() * m_l).floor() as usize
    }

    fn distance_to(&self, query: &[f32], node: NodeId) -> f32 {
        metric_distance(self.metric, query, &self.vectors[node])
            .expect("graph vectors share the declared dimension")
    }

    fn node_distance(&self, a: NodeId, b: NodeId) -> f32 {
        metric_distance(self.metric, &self.vectors[a], &self.vectors[b])
            .expect("graph vectors share the declared dimension")
    }

    fn ensure_layers(&mut self, top_level: usize) {
        while self.layers.len() <= top_level {
            self.layers.push(Layer::new(self.vectors.len()));
        }
    }

    fn ensure_node_capacity(&mut self, node: NodeId) {
        for layer in &mut self.layers {
            layer.ensure_capacity(node);
        }
    }

    fn top_level(&self) -> usize {
        self.layers.len() - 1
    }

    fn bound_for_level(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Greedy single-best descent, used to walk from the entry point down
    /// to the insertion/search level (spec.md §4.4 steps 4/Search step 2).
    fn greedy_descend(&self, query: &[f32], start: NodeId, level: usize) -> NodeId {
        let mut best = start;
        let mut best_dist = self.distance_to(query, best);
        loop {
            let mut improved = false;
            for &neighbor in self.layers[level].get_neighbors(best) {
                let d = self.distance_to(query, neighbor);
                if d < best_dist {
                    best = neighbor;
                    best_dist = d;
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Bounded beam search on a single level (spec.md §4.4 "bounded beam
    /// search with width ef_construction" / Search step 3). Tombstoned
    /// nodes are traversed for connectivity but never enter `results`, so
    /// they cannot be returned or chosen as neighbors.
    fn search_layer(&self, query: &[f32], entry_points: &[NodeId], ef: usize, level: usize) -> Vec<Candidate> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat, NodeId)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(OrderedFloat, NodeId)> = BinaryHeap::new();

        for &ep in entry_points {
            if !visited.insert(ep) {
                continue;
            }
            let d = self.distance_to(query, ep);
            candidates.push(Reverse((OrderedFloat(d), ep)));
            if !self.tombstoned[ep] {
                results.push((OrderedFloat(d), ep));
            }
        }

        while let Some(Reverse((OrderedFloat(c_dist), c_node))) = candidates.pop() {
            let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if c_dist > worst && results.len() >= ef {
                break;
            }
            for &neighbor in self.layers[level].get_neighbors(c_node) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance_to(query, neighbor);
                let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
                if d < worst || results.len() < ef {
                    candidates.push(Reverse((OrderedFloat(d), neighbor)));
                    if !self.tombstoned[neighbor] {
                        results.push((OrderedFloat(d), neighbor));
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut out: Vec<Candidate> = results.into_iter().map(|(d, n)| (n, d.0)).collect();
        out.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| self.mappings.id_of(a.0).cmp(self.mappings.id_of(b.0)))
        });
        out
    }

    /// Heuristic neighbor selection (spec.md §4.4 "Heuristic neighbor
    /// selection"): greedily accept candidates that are diverse directions
    /// from `q`, then fill any remaining slots from the closest rejects.
    fn heuristic_select(&self, candidates: &[Candidate], m: usize) -> Vec<NodeId> {
        let mut accepted: Vec<Candidate> = Vec::with_capacity(m);
        for &(c, d_cq) in candidates {
            if accepted.len() >= m {
                break;
            }
            let diverse = accepted
                .iter()
                .all(|&(r, _)| self.node_distance(c, r) > d_cq);
            if diverse {
                accepted.push((c, d_cq));
            }
        }
        if accepted.len() < m {
            for &(c, d_cq) in candidates {
                if accepted.len() >= m {
                    break;
                }
                if !accepted.iter().any(|&(r, _)| r == c) {
                    accepted.push((c, d_cq));
                }
            }
        }
        accepted.into_iter().map(|(c, _)| c).collect()
    }

    /// Adds `new_node` to `target`'s neighbor list on `level`, re-applying
    /// the heuristic to prune back to `bound` if it would otherwise be
    /// exceeded (spec.md §4.4 step 4). Any neighbor the prune drops also
    /// has `target` stripped from its own list on `level`, so the
    /// symmetric-neighbors invariant (spec.md §3 invariant 2) holds after
    /// the edit rather than just before it.
    fn link_back(&mut self, target: NodeId, new_node: NodeId, level: usize, bound: usize) {
        let mut neighbors = self.layers[level].get_neighbors(target).to_vec();
        if neighbors.contains(&new_node) {
            return;
        }
        neighbors.push(new_node);
        if neighbors.len() <= bound {
            self.layers[level].set_neighbors(target, neighbors);
            return;
        }
        let target_vector = self.vectors[target].clone();
        let mut candidates: Vec<Candidate> = neighbors
            .iter()
            .map(|&n| (n, metric_distance(self.metric, &target_vector, &self.vectors[n]).unwrap()))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        let mut pruned = self.heuristic_select(&candidates, bound);
        if !pruned.contains(&new_node) {
            // `new_node` already lists `target` as a neighbor (set before
            // this call returns to the insert path), so it must survive
            // the prune; swap out the heuristic's weakest pick in its
            // place rather than silently dropping the new edge.
            pruned.pop();
            pruned.push(new_node);
        }
        let pruned_set: FxHashSet<NodeId> = pruned.iter().copied().collect();
        for &n in &neighbors {
            if n != new_node && !pruned_set.contains(&n) {
                let mut reverse = self.layers[level].get_neighbors(n).to_vec();
                reverse.retain(|&x| x != target);
                self.layers[level].set_neighbors(n, reverse);
            }
        }
        self.layers[level].set_neighbors(target, pruned);
    }

    fn allocate_node(&mut self, level: usize) -> NodeId {
        let node = if self.allow_replace_deleted {
            self.free_list.pop()
        } else {
            None
        };
        match node {
            Some(node) => {
                // Scrub incoming edges before handing the slot back out:
                // other live nodes may still list this (now-stale) node as
                // a neighbor, which would otherwise break the symmetric-
                // neighbors invariant once it's reused for a new vector.
                let old_level = self.levels[node];
                for lvl in 0..=old_level.min(self.layers.len() - 1) {
                    let stale_neighbors = self.layers[lvl].get_neighbors(node).to_vec();
                    for other in stale_neighbors {
                        let mut others_list = self.layers[lvl].get_neighbors(other).to_vec();
                        others_list.retain(|&n| n != node);
                        self.layers[lvl].set_neighbors(other, others_list);
                    }
                    self.layers[lvl].set_neighbors(node, Vec::new());
                }
                self.vectors[node] = Vec::new();
                self.levels[node] = level;
                self.tombstoned[node] = false;
                self.tombstone_count -= 1;
                node
            }
            None => {
                let node = self.vectors.len();
                self.vectors.push(Vec::new());
                self.levels.push(level);
                self.tombstoned.push(false);
                node
            }
        }
    }

    /// Inserts `vector` under `id`. `id` must not already be live.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if `id` is already present.
    pub(crate) fn insert(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if self.mappings.contains(id) {
            return Err(Error::Conflict(format!("id already present: {id}")));
        }

        let level = self.random_level();
        // Captured before `ensure_layers` grows the layer count, so it
        // reflects L_top as of *before* this insertion (spec.md §4.4 step
        // 4) rather than the post-growth value.
        let top = self.top_level();
        self.ensure_layers(level);
        let node = self.allocate_node(level);
        self.ensure_node_capacity(node);
        if self.mappings.len() > node {
            self.mappings.rebind(node, id);
        } else {
            let assigned = self.mappings.insert(id);
            debug_assert_eq!(assigned, node);
        }
        self.vectors[node] = vector;

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(node);
            self.live_count += 1;
            return Ok(());
        };

        let query = self.vectors[node].clone();
        let mut cur = entry_point;

        for lvl in (level + 1..=top).rev() {
            cur = self.greedy_descend(&query, cur, lvl);
        }

        let start_level = level.min(top);
        for lvl in (0..=start_level).rev() {
            let candidates = self.search_layer(&query, &[cur], self.ef_construction, lvl);
            let bound = self.bound_for_level(lvl);
            let selected = self.heuristic_select(&candidates, bound);
            self.layers[lvl].set_neighbors(node, selected.clone());
            for neighbor in selected {
                self.link_back(neighbor, node, lvl, self.bound_for_level(lvl));
            }
            if let Some(&(best, _)) = candidates.first() {
                cur = best;
            }
        }

        if level > top {
            self.entry_point = Some(node);
        }
        self.live_count += 1;
        Ok(())
    }

    /// Returns the `k` nearest live nodes to `query`, ascending by
    /// distance, ties broken by id (spec.md §4.4 "Search").
    pub(crate) fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<(String, f32)> {
        let Some(live_ep) = self.live_entry_point() else {
            return Vec::new();
        };

        let top = self.levels[live_ep];
        let mut cur = live_ep;
        for lvl in (1..=top).rev() {
            cur = self.greedy_descend(query, cur, lvl);
        }

        let candidates = self.search_layer(query, &[cur], ef.max(k), 0);
        candidates
            .into_iter()
            .take(k)
            .map(|(n, d)| (self.mappings.id_of(n).to_string(), d))
            .collect()
    }

    /// The current entry point if live, otherwise a promoted replacement
    /// found via its neighbor lists, falling back to a full linear scan
    /// for the highest-level live node (spec.md §4.4 "Deletion").
    fn live_entry_point(&self) -> Option<NodeId> {
        let ep = self.entry_point?;
        if !self.tombstoned[ep] {
            return Some(ep);
        }
        self.promote_from(ep).or_else(|| self.scan_for_live_entry())
    }

    fn promote_from(&self, node: NodeId) -> Option<NodeId> {
        for lvl in (0..=self.levels[node]).rev() {
            for &neighbor in self.layers[lvl].get_neighbors(node) {
                if !self.tombstoned[neighbor] {
                    return Some(neighbor);
                }
            }
        }
        None
    }

    fn scan_for_live_entry(&self) -> Option<NodeId> {
        (0..self.vectors.len())
            .filter(|&n| !self.tombstoned[n])
            .max_by_key(|&n| self.levels[n])
    }

    /// Logically deletes `id`: tombstones the node, leaves its neighbor
    /// lists intact, and promotes the entry point if it was the one
    /// removed. Returns `true` iff `id` was live.
    pub(crate) fn delete(&mut self, id: &str) -> bool {
        let Some(node) = self.mappings.node_of(id) else {
            return false;
        };
        self.mappings.unmap(id);
        self.tombstoned[node] = true;
        self.live_count -= 1;
        self.tombstone_count += 1;
        if self.allow_replace_deleted {
            self.free_list.push(node);
        }
        if self.entry_point == Some(node) {
            self.entry_point = self.promote_from(node).or_else(|| self.scan_for_live_entry());
        }
        true
    }

    /// Replaces the vector stored under `id` in place: logical delete
    /// followed by a fresh insert under the same id (spec.md §4.4
    /// "Update").
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` is not live.
    pub(crate) fn update(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if !self.delete(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        self.insert(id, vector)
    }

    /// All live `(id, vector)` pairs, for compaction and snapshotting.
    pub(crate) fn live_entries(&self) -> Vec<(String, Vec<f32>)> {
        (0..self.vectors.len())
            .filter(|&n| !self.tombstoned[n])
            .map(|n| (self.mappings.id_of(n).to_string(), self.vectors[n].clone()))
            .collect()
    }

    /// Full graph structure for persistence (spec.md §6 "Index file (HNSW
    /// v1)"): every node in dense-id order, tombstoned nodes included since
    /// their neighbor lists may still be needed for traversal after reload.
    pub(crate) fn export(&self) -> GraphSnapshot {
        let nodes = (0..self.vectors.len())
            .map(|node| {
                let level = self.levels[node];
                let neighbors = (0..=level.min(self.layers.len().saturating_sub(1)))
                    .map(|lvl| {
                        self.layers[lvl]
                            .get_neighbors(node)
                            .iter()
                            .map(|&n| self.mappings.id_of(n).to_string())
                            .collect()
                    })
                    .collect();
                NodeSnapshot {
                    id: self.mappings.id_of(node).to_string(),
                    level,
                    neighbors,
                    tombstoned: self.tombstoned[node],
                }
            })
            .collect();
        GraphSnapshot {
            nodes,
            entry_point: self.entry_point.map(|ep| self.mappings.id_of(ep).to_string()),
        }
    }

    /// Rebuilds a graph from an exported [`GraphSnapshot`], assigning fresh
    /// dense node ids in file order. `vector_for_id` supplies the vector for
    /// a node's id; for a tombstoned node whose storage record has already
    /// been erased (spec.md §3 "Lifecycle"), callers pass `None` and an
    /// all-zero placeholder is used instead — acceptable since a tombstoned
    /// node is never itself returned from search, only traversed through.
    pub(crate) fn restore(
        dimensions: usize,
        config: &HnswConfig,
        snapshot: &GraphSnapshot,
        mut vector_for_id: impl FnMut(&str) -> Option<Vec<f32>>,
    ) -> Self {
        let mut graph = Self::new(dimensions, config);
        let node_count = snapshot.nodes.len();

        let mut id_to_index: rustc_hash::FxHashMap<&str, NodeId> = rustc_hash::FxHashMap::default();
        for (idx, node) in snapshot.nodes.iter().enumerate() {
            id_to_index.insert(node.id.as_str(), idx);
        }

        graph.vectors = Vec::with_capacity(node_count);
        graph.levels = Vec::with_capacity(node_count);
        graph.tombstoned = Vec::with_capacity(node_count);
        let max_level = snapshot.nodes.iter().map(|n| n.level).max().unwrap_or(0);
        graph.layers = (0..=max_level).map(|_| Layer::new(node_count)).collect();

        for (idx, node) in snapshot.nodes.iter().enumerate() {
            let assigned = graph.mappings.insert(&node.id);
            debug_assert_eq!(assigned, idx);
            graph.levels.push(node.level);
            graph.tombstoned.push(node.tombstoned);
            graph
                .vectors
                .push(vector_for_id(&node.id).unwrap_or_else(|| vec![0.0; dimensions]));
            if node.tombstoned {
                graph.tombstone_count += 1;
            } else {
                graph.live_count += 1;
            }
            for (lvl, neighbor_ids) in node.neighbors.iter().enumerate() {
                let neighbor_nodes: Vec<NodeId> = neighbor_ids
                    .iter()
                    .filter_map(|nid| id_to_index.get(nid.as_str()).copied())
                    .collect();
                graph.layers[lvl].set_neighbors(idx, neighbor_nodes);
            }
        }

        // `unmap` keeps the reverse (node -> id) entry but drops the
        // forward (id -> node) one, matching what a live `delete` does.
        for node in &snapshot.nodes {
            if node.tombstoned {
                graph.mappings.unmap(&node.id);
            }
        }

        graph.entry_point = snapshot
            .entry_point
            .as_deref()
            .and_then(|id| id_to_index.get(id).copied());

        graph
    }

    /// Verifies the invariants in spec.md §3 hold. Exposed for tests and
    /// for a paranoid `debug_assert!`-style caller; never called on the
    /// hot insert/search path.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<()> {
        for lvl in 0..self.layers.len() {
            for node in 0..self.vectors.len() {
                for &neighbor in self.layers[lvl].get_neighbors(node) {
                    if neighbor >= self.vectors.len() {
                        return Err(Error::Internal(format!(
                            "dangling neighbor {neighbor} of node {node} at level {lvl}"
                        )));
                    }
                    if !self.layers[lvl].get_neighbors(neighbor).contains(&node) {
                        return Err(Error::Internal(format!(
                            "asymmetric edge {node}<->{neighbor} at level {lvl}"
                        )));
                    }
                }
            }
        }
        if let Some(ep) = self.entry_point {
            let max_live_level = self
                .scan_for_live_entry()
                .map_or(0, |n| self.levels[n]);
            if !self.tombstoned[ep] && self.levels[ep] < max_live_level {
                return Err(Error::Internal("entry point is not at the maximal live level".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
