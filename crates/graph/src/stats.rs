use crate::graph::CallGraph;
use serde::{Deserialize, Serialize};

/// Aggregate counters for diagnostics and reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,

    /// Call sites, duplicates included
    pub total_edges: usize,

    pub entry_points: usize,
    pub sources: usize,
    pub sinks: usize,

    /// Nodes with a computed distance from some entry point
    pub reachable_from_entry: usize,

    /// Current distance cache occupancy
    pub cached_distances: usize,

    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl GraphStats {
    /// Share of distance lookups answered from the cache
    pub fn cache_hit_rate(&self) -> f32 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f32 / lookups as f32
    }
}

impl CallGraph {
    pub fn stats(&self) -> GraphStats {
        let store = self.read();
        let cache = self.lock_cache();

        GraphStats {
            total_nodes: store.node_count(),
            total_edges: store.edge_count(),
            entry_points: store.entry_points.len(),
            sources: store.sources.len(),
            sinks: store.sinks.len(),
            reachable_from_entry: store
                .nodes()
                .filter(|n| n.distance_from_entry.is_some())
                .count(),
            cached_distances: cache.len(),
            cache_hits: cache.hits(),
            cache_misses: cache.misses(),
        }
    }
}
