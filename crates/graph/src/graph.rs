use crate::cache::DistanceCache;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::types::{Edge, Node, NodeKind};
use petgraph::stable_graph::{EdgeReference, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Call graph storage with ID lookup and classification buckets
///
/// Every ID seen as a node or as an edge endpoint owns a graph slot. Slots
/// named only by edges hold `None` until `add_node` fills them, and traversal
/// skips them, so an edge goes live once both of its endpoints exist.
#[derive(Default)]
pub(crate) struct GraphStore {
    graph: StableDiGraph<Option<Node>, Edge>,
    index: HashMap<String, NodeIndex>,
    live: usize,
    pub(crate) entry_points: BTreeSet<String>,
    pub(crate) sources: BTreeSet<String>,
    pub(crate) sinks: BTreeSet<String>,
}

impl GraphStore {
    fn slot(&mut self, id: &str) -> NodeIndex {
        if let Some(&ix) = self.index.get(id) {
            return ix;
        }
        let ix = self.graph.add_node(None);
        self.index.insert(id.to_string(), ix);
        ix
    }

    /// Store `node`; returns true when its ID had no node before
    fn insert_node(&mut self, mut node: Node) -> bool {
        node.reset_distances();

        let ix = self.slot(&node.id);
        let previous_kind = self.graph[ix].as_ref().map(|n| n.kind);
        if let Some(previous_kind) = previous_kind.filter(|k| *k != node.kind) {
            if let Some(bucket) = self.bucket_mut(previous_kind) {
                bucket.remove(&node.id);
            }
        }
        let kind = node.kind;
        let id = node.id.clone();
        self.graph[ix] = Some(node);
        if let Some(bucket) = self.bucket_mut(kind) {
            bucket.insert(id);
        }

        if previous_kind.is_none() {
            self.live += 1;
        }
        previous_kind.is_none()
    }

    fn bucket_mut(&mut self, kind: NodeKind) -> Option<&mut BTreeSet<String>> {
        match kind {
            NodeKind::EntryPoint => Some(&mut self.entry_points),
            NodeKind::Source => Some(&mut self.sources),
            NodeKind::Sink => Some(&mut self.sinks),
            NodeKind::Regular => None,
        }
    }

    fn insert_edge(&mut self, edge: Edge) {
        let caller = self.slot(&edge.caller_id);
        let callee = self.slot(&edge.callee_id);
        self.graph.add_edge(caller, callee, edge);
    }

    pub(crate) fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|&ix| self.graph[ix].as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let ix = *self.index.get(id)?;
        self.graph[ix].as_mut()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph
            .node_indices()
            .filter_map(move |ix| self.graph[ix].as_ref())
    }

    pub(crate) fn for_each_node_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        for ix in indices {
            if let Some(node) = self.graph[ix].as_mut() {
                f(node);
            }
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.live
    }

    /// Call sites, duplicates and dangling ones included
    pub(crate) fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges at `id` in `direction`, in the order they were recorded
    fn edges(&self, id: &str, direction: Direction) -> Vec<EdgeReference<'_, Edge>> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges_directed(ix, direction).collect();
        edges.sort_by_key(|e| e.id());
        edges
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        self.edges(id, direction)
            .into_iter()
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph[other].as_ref().map(|n| n.id.as_str())
            })
            .collect()
    }

    /// Callee IDs of `id` that resolve to a node, in call-site order, with repeats
    pub(crate) fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Caller IDs of `id` that resolve to a node, with repeats
    pub(crate) fn predecessors(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Every caller ID recorded for `id`, resolved or not
    fn caller_ids(&self, id: &str) -> Vec<String> {
        self.edges(id, Direction::Incoming)
            .into_iter()
            .map(|e| e.weight().caller_id.clone())
            .collect()
    }

    fn edge_records(&self, id: &str, direction: Direction) -> Vec<Edge> {
        self.edges(id, direction)
            .into_iter()
            .map(|e| e.weight().clone())
            .collect()
    }

    fn unique_nodes(&self, ids: Vec<&str>) -> Vec<Node> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.node(id).cloned())
            .collect()
    }

    fn bucket_nodes(&self, bucket: &BTreeSet<String>) -> Vec<Node> {
        bucket
            .iter()
            .filter_map(|id| self.node(id).cloned())
            .collect()
    }
}

/// Lock recovery after a writer panicked mid-update
fn recover<G>(poisoned: PoisonError<G>) -> G {
    log::warn!("call graph lock poisoned by a panicked thread, continuing with its state");
    poisoned.into_inner()
}

/// Shared call graph for one scan
///
/// Ingestion (`add_node`, `add_edge`) may run from many threads at once; all
/// writers serialize on one coarse lock. Queries share a read lock.
pub struct CallGraph {
    pub(crate) config: GraphConfig,
    pub(crate) store: RwLock<GraphStore>,
    pub(crate) cache: Mutex<DistanceCache>,
}

impl CallGraph {
    pub fn new() -> Self {
        let config = GraphConfig::default();
        let capacity = NonZeroUsize::new(config.max_distance_cache).unwrap_or(NonZeroUsize::MIN);
        Self::build(config, capacity)
    }

    /// Create a graph with custom limits
    pub fn with_config(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_distance_cache)
            .ok_or_else(|| GraphError::invalid_config("max_distance_cache must be > 0"))?;
        Ok(Self::build(config, capacity))
    }

    fn build(config: GraphConfig, capacity: NonZeroUsize) -> Self {
        Self {
            config,
            store: RwLock::new(GraphStore::default()),
            cache: Mutex::new(DistanceCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.store.read().unwrap_or_else(recover)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.store.write().unwrap_or_else(recover)
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, DistanceCache> {
        self.cache.lock().unwrap_or_else(recover)
    }

    /// Insert or replace a node by ID
    ///
    /// Distances are reset: entry points start at 0 hops from an entry, sinks
    /// at 0 hops to a sink, everything else unreached until a pass runs.
    pub fn add_node(&self, node: Node) {
        let mut store = self.write();
        self.insert_node(&mut store, node);
    }

    /// Insert a node only if its ID is unknown; returns whether it was added
    pub fn add_node_if_absent(&self, node: Node) -> bool {
        let mut store = self.write();
        if store.contains(&node.id) {
            return false;
        }
        self.insert_node(&mut store, node);
        true
    }

    /// A new node activates the edges already recorded into it, so cached
    /// distances from its callers and from itself are dropped.
    fn insert_node(&self, store: &mut GraphStore, node: Node) {
        let id = node.id.clone();
        if !store.insert_node(node) {
            return;
        }

        let mut stale = store.caller_ids(&id);
        stale.push(id);
        let mut cache = self.lock_cache();
        for from in &stale {
            cache.invalidate_from(from);
        }
    }

    /// Record a call site
    ///
    /// Endpoints need not exist. Cached distances measured from either
    /// endpoint are dropped since a shorter route may now exist.
    pub fn add_edge(&self, edge: Edge) {
        let mut store = self.write();
        let caller = edge.caller_id.clone();
        let callee = edge.callee_id.clone();
        store.insert_edge(edge);

        let mut cache = self.lock_cache();
        cache.invalidate_from(&caller);
        if callee != caller {
            cache.invalidate_from(&callee);
        }
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.read().node(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    /// Functions called by `id`, each listed once
    pub fn get_callees(&self, id: &str) -> Vec<Node> {
        let store = self.read();
        store.unique_nodes(store.successors(id))
    }

    /// Functions calling `id`, each listed once
    pub fn get_callers(&self, id: &str) -> Vec<Node> {
        let store = self.read();
        store.unique_nodes(store.predecessors(id))
    }

    /// Every call site made by `id`, including ones to unknown callees
    pub fn outgoing_edges(&self, id: &str) -> Vec<Edge> {
        self.read().edge_records(id, Direction::Outgoing)
    }

    /// Every call site targeting `id`, including ones from unknown callers
    pub fn incoming_edges(&self, id: &str) -> Vec<Edge> {
        self.read().edge_records(id, Direction::Incoming)
    }

    pub fn entry_points(&self) -> Vec<Node> {
        let store = self.read();
        store.bucket_nodes(&store.entry_points)
    }

    pub fn sources(&self) -> Vec<Node> {
        let store = self.read();
        store.bucket_nodes(&store.sources)
    }

    pub fn sinks(&self) -> Vec<Node> {
        let store = self.read();
        store.bucket_nodes(&store.sinks)
    }

    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    /// Number of call sites, duplicates included
    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }
}


impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn add_node_registers_buckets() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("main", "main", NodeKind::EntryPoint));
        graph.add_node(Node::new("input", "input", NodeKind::Source));
        graph.add_node(Node::new("exec", "exec", NodeKind::Sink));
        graph.add_node(Node::new("helper", "helper", NodeKind::Regular));

        assert_eq!(ids(&graph.entry_points()), vec!["main"]);
        assert_eq!(ids(&graph.sources()), vec!["input"]);
        assert_eq!(ids(&graph.sinks()), vec!["exec"]);
        assert_eq!(graph.node_count(), 4);

        let main = graph.get_node("main").unwrap();
        assert_eq!(main.distance_from_entry, Some(0));
        let helper = graph.get_node("helper").unwrap();
        assert_eq!(helper.distance_from_entry, None);
    }

    #[test]
    fn re_adding_a_node_replaces_it_and_moves_buckets() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("f", "f", NodeKind::EntryPoint));
        graph.add_node(Node::new("f", "f_v2", NodeKind::Sink));

        assert_eq!(graph.node_count(), 1);
        assert!(graph.entry_points().is_empty());
        assert_eq!(ids(&graph.sinks()), vec!["f"]);
        let f = graph.get_node("f").unwrap();
        assert_eq!(f.name, "f_v2");
        assert_eq!(f.distance_from_entry, None);
    }

    #[test]
    fn add_node_if_absent_keeps_first_copy() {
        let graph = CallGraph::new();
        assert!(graph.add_node_if_absent(Node::new("exec", "exec", NodeKind::Sink)));
        assert!(!graph.add_node_if_absent(Node::new("exec", "other", NodeKind::Regular)));
        assert_eq!(graph.get_node("exec").unwrap().name, "exec");
    }

    #[test]
    fn edges_land_in_both_directions() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::Regular));
        graph.add_node(Node::new("b", "b", NodeKind::Regular));
        graph.add_edge(Edge::new("a", "b").at("a.rs", 3, 1));

        assert_eq!(ids(&graph.get_callees("a")), vec!["b"]);
        assert_eq!(ids(&graph.get_callers("b")), vec!["a"]);
        assert_eq!(graph.outgoing_edges("a"), graph.incoming_edges("b"));
    }

    #[test]
    fn callees_are_deduplicated_but_edges_are_not() {
        let graph = CallGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(Node::new(id, id, NodeKind::Regular));
        }
        graph.add_edge(Edge::new("a", "b").at("a.rs", 1, 0));
        graph.add_edge(Edge::new("a", "c").at("a.rs", 2, 0));
        graph.add_edge(Edge::new("a", "b").at("a.rs", 3, 0));

        assert_eq!(ids(&graph.get_callees("a")), vec!["b", "c"]);
        assert_eq!(graph.outgoing_edges("a").len(), 3);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn dangling_edges_are_inert_until_the_node_arrives() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::Regular));
        graph.add_edge(Edge::new("a", "later"));

        assert!(graph.get_callees("a").is_empty());
        assert!(!graph.contains("later"));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);

        graph.add_node(Node::new("later", "later", NodeKind::Regular));
        assert_eq!(ids(&graph.get_callees("a")), vec!["later"]);
        assert_eq!(ids(&graph.get_callers("later")), vec!["a"]);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn edges_keep_call_site_order() {
        let graph = CallGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_node(Node::new(id, id, NodeKind::Regular));
        }
        graph.add_edge(Edge::new("a", "d").at("a.rs", 1, 0));
        graph.add_edge(Edge::new("a", "b").at("a.rs", 2, 0));
        graph.add_edge(Edge::new("a", "c").at("a.rs", 3, 0));

        let lines: Vec<u32> = graph.outgoing_edges("a").iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert_eq!(ids(&graph.get_callees("a")), vec!["d", "b", "c"]);
    }

    #[test]
    fn node_arrival_drops_cached_distances_through_it() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::EntryPoint));
        graph.add_node(Node::new("sink", "sink", NodeKind::Sink));
        graph.add_edge(Edge::new("a", "mid"));
        graph.add_edge(Edge::new("mid", "sink"));

        assert_eq!(graph.get_distance("a", "sink"), None);
        assert_eq!(graph.get_distance("mid", "sink"), None);

        graph.add_node(Node::new("mid", "mid", NodeKind::Regular));
        assert!(graph.lock_cache().is_empty());
        assert_eq!(graph.get_distance("a", "sink"), Some(2));
        assert_eq!(graph.get_distance("mid", "sink"), Some(1));
    }

    #[test]
    fn add_node_if_absent_fills_a_dangling_slot() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::Regular));
        graph.add_edge(Edge::new("a", "exec"));
        assert_eq!(graph.get_distance("a", "exec"), None);

        assert!(graph.add_node_if_absent(Node::new("exec", "exec", NodeKind::Sink)));
        assert_eq!(graph.get_distance("a", "exec"), Some(1));
        assert_eq!(ids(&graph.sinks()), vec!["exec"]);
    }

    #[test]
    fn replacing_a_node_keeps_cached_distances() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::Regular));
        graph.add_node(Node::new("b", "b", NodeKind::Regular));
        graph.add_edge(Edge::new("a", "b"));
        assert_eq!(graph.get_distance("a", "b"), Some(1));

        graph.add_node(Node::new("b", "b_v2", NodeKind::Regular));
        assert_eq!(graph.lock_cache().len(), 1);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let graph = CallGraph::new();
        graph.add_node(Node::new("a", "a", NodeKind::Regular));

        let outcome = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _store = graph.write();
                    panic!("ingest worker failed");
                })
                .join()
        });
        assert!(outcome.is_err());
        assert!(graph.store.is_poisoned());

        assert!(graph.contains("a"));
        graph.add_node(Node::new("b", "b", NodeKind::Regular));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn unknown_ids_yield_empty_results() {
        let graph = CallGraph::new();
        assert!(graph.get_node("nope").is_none());
        assert!(graph.get_callees("nope").is_empty());
        assert!(graph.get_callers("nope").is_empty());
        assert!(graph.outgoing_edges("nope").is_empty());
    }

    #[test]
    fn with_config_rejects_invalid_limits() {
        let config = GraphConfig {
            max_distance_cache: 0,
            ..GraphConfig::default()
        };
        assert!(CallGraph::with_config(config).is_err());
    }
}
