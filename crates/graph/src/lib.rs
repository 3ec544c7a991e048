//! # Reachscan Graph
//!
//! Call graph reachability and prioritization for taint scanning.
//!
//! ## Features
//!
//! - **Graph store** - functions/methods keyed by stable IDs, bidirectional call indices
//! - **Distance passes** - multi-source BFS from entry points and (reversed) to sinks
//! - **Path queries** - shortest chains, reachable sinks, bounded enumeration of all chains
//! - **Distance cache** - LRU memo of pairwise distances, invalidated when edges or their endpoints arrive
//! - **Prioritization** - composite score surfacing entry-to-sink hot spots
//!
//! ## Architecture
//!
//! ```text
//! Language matchers (one per file, concurrent)
//!     │
//!     ├──> FileIngest + SinkRegistry
//!     │      ├─ Declare functions/methods (conventional IDs)
//!     │      └─ Record call sites (sinks confirmed by the registry)
//!     │
//!     ├──> CallGraph (RwLock-guarded petgraph StableDiGraph)
//!     │      ├─ Nodes by ID, placeholder slots for not-yet-declared callees
//!     │      └─ Entry point / source / sink buckets
//!     │
//!     ├──> Distance passes (once, after ingestion)
//!     │      ├─ distance_from_entry
//!     │      └─ distance_to_sink
//!     │
//!     └──> Queries (concurrent, read-only)
//!            ├─ get_distance (cached), get_shortest_path
//!            ├─ get_reachable_sinks, get_all_paths_to_sinks
//!            └─ priority_score, prioritized_nodes, stats
//! ```
//!
//! ## Example
//!
//! ```rust
//! use reachscan_graph::{CallGraph, Edge, Node, NodeKind};
//!
//! let graph = CallGraph::new();
//! graph.add_node(Node::function("app.py", "view", NodeKind::EntryPoint));
//! graph.add_node(Node::function("app.py", "run", NodeKind::Regular));
//! graph.add_node(Node::function("app.py", "system", NodeKind::Sink));
//! graph.add_edge(Edge::new("app.py:view", "app.py:run"));
//! graph.add_edge(Edge::new("app.py:run", "app.py:system"));
//!
//! graph.compute_distance_from_entry_points();
//! graph.compute_distance_to_sinks();
//!
//! assert_eq!(graph.get_distance("app.py:view", "app.py:system"), Some(2));
//! assert!(graph.priority_score("app.py:run") > 0.0);
//! ```

mod cache;
mod config;
mod distance;
mod error;
mod graph;
mod ingest;
mod paths;
mod stats;
mod types;

pub use cache::{DistanceCache, DistanceKey};
pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use graph::CallGraph;
pub use ingest::{CallSite, CallTarget, FileIngest, SinkRegistry, SinkTable};
pub use stats::GraphStats;
pub use types::{make_method_id, make_node_id, Edge, Node, NodeKind};
