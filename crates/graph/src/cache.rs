//! LRU memo of pairwise shortest distances.
//!
//! Entries are indexed by their `from` node as well, so a topology change can
//! drop every distance measured *from* an endpoint without scanning the whole
//! cache. Entries that only mention the node as `to` are left alone and age
//! out through normal LRU eviction.

use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

/// Cache key: ordered `(from, to)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistanceKey {
    pub from: String,
    pub to: String,
}

impl DistanceKey {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl std::fmt::Display for DistanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

/// Bounded distance memo with hit/miss accounting
///
/// `None` values are cached too: "no path" is as expensive to establish as a path.
pub struct DistanceCache {
    entries: LruCache<DistanceKey, Option<usize>>,
    by_from: HashMap<String, HashSet<String>>,
    hits: u64,
    misses: u64,
}

impl DistanceCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            by_from: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a distance, promoting the entry to most recently used
    pub fn get(&mut self, from: &str, to: &str) -> Option<Option<usize>> {
        match self.entries.get(&DistanceKey::new(from, to)) {
            Some(distance) => {
                self.hits += 1;
                Some(*distance)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert a distance, evicting the least recently used entry when full
    pub fn insert(&mut self, from: &str, to: &str, distance: Option<usize>) {
        let key = DistanceKey::new(from, to);
        if let Some((evicted, _)) = self.entries.push(key.clone(), distance) {
            if evicted != key {
                log::trace!("distance cache evicted {evicted}");
                self.unindex(&evicted);
            }
        }
        self.by_from.entry(key.from).or_default().insert(key.to);
    }

    /// Drop every entry measured from `node`; returns how many were removed
    pub fn invalidate_from(&mut self, node: &str) -> usize {
        let Some(targets) = self.by_from.remove(node) else {
            return 0;
        };

        let mut removed = 0;
        for to in targets {
            let key = DistanceKey {
                from: node.to_string(),
                to,
            };
            if self.entries.pop(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            log::trace!("distance cache invalidated {removed} entries from {node}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_from.clear();
    }

    fn unindex(&mut self, key: &DistanceKey) {
        if let Some(targets) = self.by_from.get_mut(&key.from) {
            targets.remove(&key.to);
            if targets.is_empty() {
                self.by_from.remove(&key.from);
            }
        }
    }
}
