use crate::graph::{CallGraph, GraphStore};
use crate::types::Node;
use std::collections::{HashMap, HashSet, VecDeque};

impl CallGraph {
    /// Fewest-hop call chain `[from, ..., to]`
    ///
    /// `None` when `from` is unknown or `to` cannot be reached. Among chains of
    /// equal length the one discovered first by BFS (call-site order) wins.
    pub fn get_shortest_path(&self, from: &str, to: &str) -> Option<Vec<Node>> {
        let store = self.read();
        let ids = shortest_path_ids(&store, from, to)?;
        Some(
            ids.into_iter()
                .filter_map(|id| store.node(id).cloned())
                .collect(),
        )
    }

    /// Hop count of the shortest chain from `from` to `to`, memoized
    ///
    /// `from == to` is always `Some(0)` and bypasses the cache.
    pub fn get_distance(&self, from: &str, to: &str) -> Option<usize> {
        if from == to {
            return Some(0);
        }

        // Held across lookup, compute and insert so a concurrent `add_edge`
        // cannot slip a stale value into the cache.
        let store = self.read();

        if let Some(cached) = self.lock_cache().get(from, to) {
            return cached;
        }

        let distance = shortest_path_ids(&store, from, to).map(|path| path.len() - 1);
        self.lock_cache().insert(from, to, distance);
        distance
    }

    /// Sinks reachable from `from` over any call chain, sorted by ID
    ///
    /// `from` itself is not reported even when it is a sink.
    pub fn get_reachable_sinks(&self, from: &str) -> Vec<Node> {
        let store = self.read();
        if !store.contains(from) {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        let mut sinks: Vec<Node> = Vec::new();
        while let Some(current) = queue.pop_front() {
            for next in store.successors(current) {
                if !visited.insert(next) {
                    continue;
                }
                if let Some(node) = store.node(next) {
                    if node.is_sink() {
                        sinks.push(node.clone());
                    }
                }
                queue.push_back(next);
            }
        }

        sinks.sort_by(|a, b| a.id.cmp(&b.id));
        sinks
    }

    /// Every simple call chain from `from` to a sink, at most `max_depth` hops
    ///
    /// A chain ends at the first sink it meets. Chains that would exceed
    /// `max_depth` are dropped, and enumeration stops after the configured
    /// `max_paths` results.
    pub fn get_all_paths_to_sinks(&self, from: &str, max_depth: usize) -> Vec<Vec<Node>> {
        let store = self.read();
        if !store.contains(from) {
            return Vec::new();
        }

        let mut walk = PathWalk {
            store: &store,
            max_depth,
            max_paths: self.config.max_paths,
            on_path: HashSet::new(),
            path: Vec::new(),
            pending: Vec::new(),
            found: Vec::new(),
        };
        walk.run(from);

        if walk.found.len() >= self.config.max_paths {
            log::debug!(
                "path enumeration from {from} stopped at {} paths",
                self.config.max_paths
            );
        }

        walk.found
            .into_iter()
            .map(|ids| {
                ids.into_iter()
                    .filter_map(|id| store.node(id).cloned())
                    .collect()
            })
            .collect()
    }

    /// `get_all_paths_to_sinks` bounded by the configured `max_path_length`
    pub fn all_paths_to_sinks(&self, from: &str) -> Vec<Vec<Node>> {
        self.get_all_paths_to_sinks(from, self.config.max_path_length)
    }
}

/// BFS with parent pointers; returns node IDs along the path
fn shortest_path_ids<'a>(store: &'a GraphStore, from: &'a str, to: &str) -> Option<Vec<&'a str>> {
    if !store.contains(from) {
        return None;
    }
    if from == to {
        return Some(vec![from]);
    }

    let mut parent: HashMap<&'a str, &'a str> = HashMap::new();
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(from);
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        for next in store.successors(current) {
            if !visited.insert(next) {
                continue;
            }
            parent.insert(next, current);

            if next == to {
                let mut path = vec![next];
                let mut cursor = next;
                while let Some(&prev) = parent.get(cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}

/// Depth-first enumeration state for `get_all_paths_to_sinks`
///
/// Runs on an explicit stack so chain length is bounded by the heap, not the
/// thread stack.
struct PathWalk<'a> {
    store: &'a GraphStore,
    max_depth: usize,
    max_paths: usize,
    on_path: HashSet<&'a str>,
    path: Vec<&'a str>,
    /// Callees still to try, one iterator per node on `path`
    pending: Vec<std::vec::IntoIter<&'a str>>,
    found: Vec<Vec<&'a str>>,
}

impl<'a> PathWalk<'a> {
    fn run(&mut self, from: &'a str) {
        self.enter(from);

        while self.found.len() < self.max_paths {
            let Some(callees) = self.pending.last_mut() else {
                break;
            };
            match callees.next() {
                Some(next) => {
                    if !self.on_path.contains(next) {
                        self.enter(next);
                    }
                }
                None => {
                    self.pending.pop();
                    if let Some(done) = self.path.pop() {
                        self.on_path.remove(done);
                    }
                }
            }
        }
    }

    fn enter(&mut self, current: &'a str) {
        self.path.push(current);
        self.on_path.insert(current);

        let hops = self.path.len() - 1;
        let is_sink = self.store.node(current).is_some_and(Node::is_sink);

        let callees = if hops > 0 && is_sink {
            self.found.push(self.path.clone());
            Vec::new()
        } else if hops < self.max_depth {
            self.store.successors(current)
        } else {
            Vec::new()
        };
        self.pending.push(callees.into_iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, NodeKind};
    use pretty_assertions::assert_eq;

    fn graph_with(nodes: &[(&str, NodeKind)], edges: &[(&str, &str)]) -> CallGraph {
        let graph = CallGraph::new();
        for (id, kind) in nodes {
            graph.add_node(Node::new(*id, *id, *kind));
        }
        for (from, to) in edges {
            graph.add_edge(Edge::new(*from, *to));
        }
        graph
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn shortest_path_prefers_fewer_hops() {
        let graph = graph_with(
            &[
                ("main", NodeKind::EntryPoint),
                ("a", NodeKind::Regular),
                ("b", NodeKind::Regular),
                ("c", NodeKind::Regular),
                ("sink", NodeKind::Sink),
            ],
            &[("main", "a"), ("a", "b"), ("b", "sink"), ("main", "c"), ("c", "sink")],
        );

        let path = graph.get_shortest_path("main", "sink").unwrap();
        assert_eq!(ids(&path), vec!["main", "c", "sink"]);
        assert_eq!(graph.get_distance("main", "sink"), Some(2));
    }

    #[test]
    fn shortest_path_to_self_is_single_node() {
        let graph = graph_with(&[("x", NodeKind::Regular)], &[]);
        assert_eq!(ids(&graph.get_shortest_path("x", "x").unwrap()), vec!["x"]);
        assert!(graph.get_shortest_path("missing", "missing").is_none());
    }

    #[test]
    fn shortest_path_handles_cycles_and_unreachable_targets() {
        let graph = graph_with(
            &[("a", NodeKind::Regular), ("b", NodeKind::Regular), ("z", NodeKind::Regular)],
            &[("a", "b"), ("b", "a")],
        );
        assert!(graph.get_shortest_path("a", "z").is_none());
        assert_eq!(graph.get_distance("a", "z"), None);
    }

    #[test]
    fn self_distance_skips_the_cache() {
        let graph = graph_with(&[("x", NodeKind::Regular)], &[]);
        assert_eq!(graph.get_distance("x", "x"), Some(0));
        assert!(graph.lock_cache().is_empty());
    }

    #[test]
    fn repeated_distance_is_served_from_cache() {
        let graph = graph_with(
            &[("a", NodeKind::Regular), ("b", NodeKind::Regular)],
            &[("a", "b")],
        );
        assert_eq!(graph.get_distance("a", "b"), Some(1));
        assert_eq!(graph.get_distance("a", "b"), Some(1));

        let cache = graph.lock_cache();
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn add_edge_refreshes_distances_from_its_endpoints() {
        let graph = graph_with(
            &[
                ("a", NodeKind::Regular),
                ("b", NodeKind::Regular),
                ("c", NodeKind::Regular),
            ],
            &[("a", "b"), ("b", "c")],
        );
        assert_eq!(graph.get_distance("a", "c"), Some(2));
        assert_eq!(graph.get_distance("b", "a"), None);

        graph.add_edge(Edge::new("a", "c"));
        assert_eq!(graph.get_distance("a", "c"), Some(1));

        graph.add_edge(Edge::new("c", "b"));
        graph.add_edge(Edge::new("b", "a"));
        assert_eq!(graph.get_distance("b", "a"), Some(1));
    }

    #[test]
    fn add_edge_drops_cached_distances_from_the_callee() {
        let graph = graph_with(
            &[
                ("a", NodeKind::Regular),
                ("b", NodeKind::Regular),
                ("c", NodeKind::Regular),
                ("d", NodeKind::Regular),
            ],
            &[("a", "b"), ("b", "c")],
        );
        assert_eq!(graph.get_distance("b", "c"), Some(1));
        assert_eq!(graph.get_distance("a", "c"), Some(2));

        graph.add_edge(Edge::new("d", "b"));
        assert_eq!(graph.lock_cache().len(), 1);
        assert_eq!(graph.lock_cache().get("b", "c"), None);
        assert_eq!(graph.lock_cache().get("a", "c"), Some(Some(2)));
    }

    #[test]
    fn reachable_sinks_skip_dead_ends() {
        let graph = graph_with(
            &[
                ("root", NodeKind::Regular),
                ("left", NodeKind::Regular),
                ("right", NodeKind::Regular),
                ("dead", NodeKind::Regular),
                ("exec", NodeKind::Sink),
                ("query", NodeKind::Sink),
            ],
            &[
                ("root", "left"),
                ("left", "exec"),
                ("root", "right"),
                ("right", "query"),
                ("root", "dead"),
            ],
        );

        assert_eq!(ids(&graph.get_reachable_sinks("root")), vec!["exec", "query"]);
        assert!(graph.get_reachable_sinks("dead").is_empty());
        assert!(graph.get_reachable_sinks("missing").is_empty());
    }

    #[test]
    fn all_paths_respects_depth_bound() {
        // main -> a -> sink (3 nodes), main -> b -> c -> sink (4 nodes)
        let graph = graph_with(
            &[
                ("main", NodeKind::EntryPoint),
                ("a", NodeKind::Regular),
                ("b", NodeKind::Regular),
                ("c", NodeKind::Regular),
                ("sink", NodeKind::Sink),
            ],
            &[("main", "a"), ("a", "sink"), ("main", "b"), ("b", "c"), ("c", "sink")],
        );

        let mut lengths: Vec<usize> = graph
            .get_all_paths_to_sinks("main", 10)
            .iter()
            .map(Vec::len)
            .collect();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![3, 4]);

        let short = graph.get_all_paths_to_sinks("main", 2);
        assert_eq!(short.len(), 1);
        assert_eq!(ids(&short[0]), vec!["main", "a", "sink"]);
    }

    #[test]
    fn all_paths_are_simple_in_cyclic_graphs() {
        let graph = graph_with(
            &[
                ("a", NodeKind::Regular),
                ("b", NodeKind::Regular),
                ("sink", NodeKind::Sink),
            ],
            &[("a", "b"), ("b", "a"), ("b", "sink"), ("a", "sink")],
        );

        let paths = graph.all_paths_to_sinks("a");
        let mut as_ids: Vec<Vec<&str>> = paths.iter().map(|p| ids(p)).collect();
        as_ids.sort();
        assert_eq!(as_ids, vec![vec!["a", "b", "sink"], vec!["a", "sink"]]);
    }

    #[test]
    fn parallel_call_sites_yield_parallel_paths() {
        let graph = graph_with(
            &[("a", NodeKind::Regular), ("sink", NodeKind::Sink)],
            &[("a", "sink"), ("a", "sink")],
        );
        assert_eq!(graph.all_paths_to_sinks("a").len(), 2);
    }
}
