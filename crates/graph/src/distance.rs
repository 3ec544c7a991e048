//! Multi-source BFS passes and the priority score built on them.
//!
//! Both passes recompute from scratch and hold the write lock for their whole
//! duration. Ingestion must be finished (or paused) before their results are
//! meaningful; re-running after more ingestion is always safe.

use crate::graph::{CallGraph, GraphStore};
use crate::types::Node;
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

/// Which distance field a pass writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Entry points outward along call edges
    FromEntry,
    /// Sinks backward toward their callers
    ToSink,
}

impl CallGraph {
    /// Hop count from the nearest entry point, for every node
    ///
    /// Returns the number of nodes reached, entry points included.
    pub fn compute_distance_from_entry_points(&self) -> usize {
        let mut store = self.write();
        let reached = multi_source_bfs(&mut store, Direction::FromEntry);
        log::debug!(
            "distance from {} entry points: {}/{} nodes reached",
            store.entry_points.len(),
            reached,
            store.node_count()
        );
        reached
    }

    /// Hop count to the nearest sink, for every node
    ///
    /// Returns the number of nodes that can reach a sink, sinks included.
    pub fn compute_distance_to_sinks(&self) -> usize {
        let mut store = self.write();
        let reached = multi_source_bfs(&mut store, Direction::ToSink);
        log::debug!(
            "distance to {} sinks: {}/{} nodes reach a sink",
            store.sinks.len(),
            reached,
            store.node_count()
        );
        reached
    }

    /// Exploitability score of a node
    ///
    /// Zero when the node is unknown, unreachable from every entry point, or
    /// cannot reach any sink.
    pub fn priority_score(&self, id: &str) -> f32 {
        self.read().node(id).map_or(0.0, score)
    }

    /// Nodes with a positive score, best first (ties by ID)
    pub fn prioritized_nodes(&self, limit: usize) -> Vec<(Node, f32)> {
        let store = self.read();
        let mut ranked: Vec<(&Node, f32)> = store
            .nodes()
            .map(|node| (node, score(node)))
            .filter(|(_, s)| *s > 0.0)
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(node, s)| (node.clone(), s))
            .collect()
    }
}

/// Inverse product of both distances, shifted so adjacent nodes stay finite
fn score(node: &Node) -> f32 {
    match (node.distance_from_entry, node.distance_to_sink) {
        (Some(from_entry), Some(to_sink)) => {
            1.0 / ((from_entry as f32 + 1.0) * (to_sink as f32 + 1.0))
        }
        _ => 0.0,
    }
}

fn multi_source_bfs(store: &mut GraphStore, direction: Direction) -> usize {
    let mut distances: Vec<(String, u32)> = Vec::new();

    {
        let store: &GraphStore = store;
        let seeds = match direction {
            Direction::FromEntry => &store.entry_points,
            Direction::ToSink => &store.sinks,
        };

        let mut reached = HashSet::new();
        let mut queue = VecDeque::new();
        for seed in seeds {
            if store.contains(seed) && reached.insert(seed.as_str()) {
                queue.push_back((seed.as_str(), 0u32));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            distances.push((current.to_string(), depth));

            let neighbors = match direction {
                Direction::FromEntry => store.successors(current),
                Direction::ToSink => store.predecessors(current),
            };
            for next in neighbors {
                if reached.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }

    // Seeds are part of `distances` at depth 0, so a blanket reset is enough.
    store.for_each_node_mut(|node| *distance_field(node, direction) = None);

    let reached = distances.len();
    for (id, depth) in distances {
        if let Some(node) = store.node_mut(&id) {
            *distance_field(node, direction) = Some(depth);
        }
    }
    reached
}

fn distance_field(node: &mut Node, direction: Direction) -> &mut Option<u32> {
    match direction {
        Direction::FromEntry => &mut node.distance_from_entry,
        Direction::ToSink => &mut node.distance_to_sink,
    }
}
