//! Memoized transitive closures over the version DAG.
//!
//! Both closure directions (dependencies and ancestors) run through the same
//! traversal: an iterative post-order DFS that finishes every node exactly
//! once and builds its closure from the already-finished closures of its
//! neighbors. Shared subgraphs (diamonds) are therefore computed once per
//! query instead of once per incoming path.
//!
//! ## Cycle Detection
//!
//! The model assumes an acyclic graph. A node entered while it is still on
//! the current DFS path is a cycle and fails with
//! [`ForestError::CycleDetected`] instead of looping.
//!
//! ## Caching
//!
//! Finished closures are published to an LRU cache shared across queries,
//! guarded by a `parking_lot::RwLock`. Readers use `peek` under the read lock
//! so lookups never contend with each other. Concurrent queries may compute
//! the same closure twice; both publish equal values.
//!
//! ## Configuration
//!
//! Environment variables read by [`CacheConfig::from_env`]:
//! - `VERSION_FOREST_CACHE_ENABLED`: `false`/`0` disables cross-query caching (default: true)
//! - `VERSION_FOREST_CACHE_MAX_ENTRIES`: capacity of each closure cache (default: 10000)

use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;

use crate::error::{ForestError, Result};
use crate::types::VersionKey;

/// A computed closure, shared between the cache and callers.
pub type Closure = Arc<BTreeSet<VersionKey>>;

/// Edge direction followed by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow `dependencies` (dependent -> dependency).
    Dependencies,
    /// Follow `parents` (dependency -> dependent).
    Ancestors,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dependencies => write!(f, "dependencies"),
            Self::Ancestors => write!(f, "ancestors"),
        }
    }
}

/// Configuration for the closure caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of closures retained per direction.
    pub max_entries: usize,
    /// Whether closures are retained across queries.
    pub enabled: bool,
}

impl CacheConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: std::env::var("VERSION_FOREST_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
            enabled: std::env::var("VERSION_FOREST_CACHE_ENABLED")
                .ok()
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.enabled),
        }
    }

    /// Configuration with cross-query caching turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}

/// LRU cache of finished closures for one direction.
pub(crate) struct ClosureCache {
    inner: Option<RwLock<LruCache<VersionKey, Closure>>>,
}

impl ClosureCache {
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let inner = config.enabled.then(|| {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            RwLock::new(LruCache::new(size))
        });
        Self { inner }
    }

    fn get(&self, key: &VersionKey) -> Option<Closure> {
        self.inner.as_ref()?.read().peek(key).cloned()
    }

    fn publish<'k, 'v>(&self, entries: impl IntoIterator<Item = (&'k VersionKey, &'v Closure)>) {
        if let Some(cache) = &self.inner {
            let mut cache = cache.write();
            for (key, closure) in entries {
                cache.put(key.clone(), Arc::clone(closure));
            }
        }
    }

    pub(crate) fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.write().clear();
        }
    }

    pub(crate) fn stats(&self) -> Option<CacheStats> {
        self.inner.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }
}

enum Frame<'g> {
    Enter(&'g VersionKey),
    Exit(&'g VersionKey, Vec<&'g VersionKey>),
}

/// Compute the closure of `start` in one direction.
///
/// `neighbors` returns the direct neighbors of a node in that direction. The
/// start node is never part of its own closure on an acyclic graph.
pub(crate) fn traverse<'g, F>(
    start: &'g VersionKey,
    direction: Direction,
    cache: &ClosureCache,
    mut neighbors: F,
) -> Result<Closure>
where
    F: FnMut(&'g VersionKey) -> Result<Vec<&'g VersionKey>>,
{
    if let Some(hit) = cache.get(start) {
        return Ok(hit);
    }

    let mut finished: HashMap<&'g VersionKey, Closure> = HashMap::new();
    let mut fresh: Vec<&'g VersionKey> = Vec::new();
    let mut on_path: HashSet<&'g VersionKey> = HashSet::new();
    let mut stack = vec![Frame::Enter(start)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(key) => {
                if finished.contains_key(key) {
                    continue;
                }
                // Everything entered after this node's Exit frame is its descendant.
                if on_path.contains(key) {
                    tracing::warn!(
                        version = %key,
                        direction = %direction,
                        "Cycle detected during closure traversal"
                    );
                    return Err(ForestError::CycleDetected(key.clone()));
                }
                if let Some(hit) = cache.get(key) {
                    finished.insert(key, hit);
                    continue;
                }

                on_path.insert(key);
                let next = neighbors(key)?;
                let children: Vec<_> = next.iter().rev().copied().collect();
                stack.push(Frame::Exit(key, next));
                stack.extend(children.into_iter().map(Frame::Enter));
            }
            Frame::Exit(key, next) => {
                on_path.remove(key);

                let mut closure = BTreeSet::new();
                for neighbor in next {
                    closure.insert(neighbor.clone());
                    if let Some(sub) = finished.get(neighbor) {
                        closure.extend(sub.iter().cloned());
                    }
                }
                finished.insert(key, Arc::new(closure));
                fresh.push(key);
            }
        }
    }

    tracing::trace!(
        version = %start,
        direction = %direction,
        computed = fresh.len(),
        "Closure computed"
    );

    cache.publish(
        fresh
            .iter()
            .filter_map(|key| finished.get_key_value(*key).map(|(k, v)| (*k, v))),
    );

    // The start node is always finished last.
    Ok(finished.remove(start).unwrap_or_default())
}
