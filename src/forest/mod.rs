//! The version forest arena.
//!
//! A [`VersionForest`] owns every [`Entity`], the parent back-reference index
//! and the memoized closure caches. Nodes refer to each other only by
//! [`VersionKey`], so there are no reference cycles between entities,
//! versions and their parents.
//!
//! ## Construction
//!
//! Entities are added bottom-up: every dependency must name a version that
//! already exists in the forest, or a version declared by the entity being
//! added. Parent back-references are wired eagerly inside
//! [`VersionForest::add_entity`], so ancestor queries against existing
//! versions see new dependents immediately.
//!
//! ## Edge Direction
//!
//! - `dependencies`: dependent -> dependency (declared, ordered)
//! - `parents`: dependency -> dependent (derived, ordered by key)

pub mod entity;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::canonical::canonical_hash_hex;
use crate::closure::{self, CacheConfig, CacheStats, Closure, ClosureCache, Direction};
use crate::error::{ForestError, Result};
use crate::types::{DependencyEdge, EntityName, VersionKey, VersionNumber};
use crate::FOREST_SCHEMA_VERSION;

pub use entity::{Entity, VersionNode};
use entity::DeclaredVersion;

static NO_PARENTS: BTreeSet<VersionKey> = BTreeSet::new();

/// Cache statistics for both closure directions.
///
/// Each field is `None` if caching is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestCacheStats {
    /// Dependency-closure cache.
    pub dependencies: Option<CacheStats>,
    /// Ancestor-closure cache.
    pub ancestors: Option<CacheStats>,
}

/// Arena of entities and their version DAG.
pub struct VersionForest {
    /// Entities by name.
    entities: BTreeMap<EntityName, Entity>,
    /// Dependency -> dependents mapping.
    parents: BTreeMap<VersionKey, BTreeSet<VersionKey>>,
    /// All declared edges, deduplicated, in insertion order.
    edges: Vec<DependencyEdge>,
    dependency_cache: ClosureCache,
    ancestor_cache: ClosureCache,
    cache_config: CacheConfig,
}

impl VersionForest {
    /// Create an empty forest with the default cache configuration.
    pub fn new() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    /// Create an empty forest with a custom cache configuration.
    pub fn with_cache_config(cache_config: CacheConfig) -> Self {
        Self {
            entities: BTreeMap::new(),
            parents: BTreeMap::new(),
            edges: Vec::new(),
            dependency_cache: ClosureCache::new(&cache_config),
            ancestor_cache: ClosureCache::new(&cache_config),
            cache_config,
        }
    }

    /// Register an entity and wire parent back-references for its versions.
    ///
    /// `versions` maps each version number to its ordered dependency list.
    /// If a number appears more than once, the last declaration wins.
    ///
    /// # Errors
    ///
    /// - [`ForestError::DuplicateEntity`] if the name is already registered.
    /// - [`ForestError::UnknownDependency`] if a dependency names a version
    ///   that is neither in the forest nor declared by this entity.
    ///
    /// On error the forest is unchanged.
    pub fn add_entity<N, I>(&mut self, name: N, versions: I) -> Result<&Entity>
    where
        N: Into<EntityName>,
        I: IntoIterator<Item = (VersionNumber, Vec<VersionKey>)>,
    {
        let name = name.into();
        if self.entities.contains_key(&name) {
            return Err(ForestError::DuplicateEntity(name));
        }

        let versions: BTreeMap<VersionNumber, Vec<VersionKey>> = versions.into_iter().collect();

        for (&number, dependencies) in &versions {
            for dependency in dependencies {
                let exists = if dependency.entity == name {
                    versions.contains_key(&dependency.version)
                } else {
                    self.contains(dependency)
                };
                if !exists {
                    return Err(ForestError::UnknownDependency {
                        dependent: VersionKey::new(name.clone(), number),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let entity = Entity::new(name.clone(), versions);

        let mut new_edges = 0usize;
        for declared in entity.declared_versions() {
            for dependency in declared.dependencies.iter() {
                let inserted = self
                    .parents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(declared.key.clone());
                if inserted {
                    self.edges
                        .push(DependencyEdge::new(declared.key.clone(), dependency.clone()));
                    new_edges += 1;
                }
            }
        }

        // New dependents change the ancestor sets of existing versions. Their
        // dependency closures cannot change.
        if new_edges > 0 {
            self.ancestor_cache.clear();
        }

        tracing::debug!(
            entity = %name,
            versions = entity.num_versions(),
            edges = new_edges,
            "Entity added to forest"
        );

        Ok(self.entities.entry(name).or_insert(entity))
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| ForestError::EntityNotFound(EntityName::new(name)))
    }

    /// All entities, ordered by name.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Whether `key` names a declared version.
    pub fn contains(&self, key: &VersionKey) -> bool {
        self.entities
            .get(&key.entity)
            .is_some_and(|entity| entity.is_declared(key.version))
    }

    /// Versions directly required by `key`, in declaration order.
    pub fn dependencies(&self, key: &VersionKey) -> Result<&[VersionKey]> {
        Ok(&self.declared(key)?.dependencies)
    }

    /// Versions that directly require `key`, ordered by key.
    pub fn parents(&self, key: &VersionKey) -> Result<&BTreeSet<VersionKey>> {
        self.declared(key)?;
        Ok(self.parents_of(key))
    }

    /// Number of entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of declared versions across all entities.
    pub fn num_versions(&self) -> usize {
        self.entities.values().map(Entity::num_versions).sum()
    }

    /// Number of distinct dependency edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// All distinct dependency edges, in insertion order.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Every version reachable from `key` via `dependencies`, excluding `key`.
    ///
    /// # Errors
    ///
    /// [`ForestError::VersionNotFound`] for an undeclared key,
    /// [`ForestError::CycleDetected`] if the traversal revisits its own path.
    pub fn dependency_closure(&self, key: &VersionKey) -> Result<Closure> {
        let start = &self.declared(key)?.key;
        closure::traverse(start, Direction::Dependencies, &self.dependency_cache, |k| {
            Ok(self.declared(k)?.dependencies.iter().collect())
        })
    }

    /// Every version that directly or transitively requires `key`, excluding `key`.
    ///
    /// # Errors
    ///
    /// Same as [`VersionForest::dependency_closure`].
    pub fn ancestors(&self, key: &VersionKey) -> Result<Closure> {
        let start = &self.declared(key)?.key;
        closure::traverse(start, Direction::Ancestors, &self.ancestor_cache, |k| {
            Ok(self.parents_of(k).iter().collect())
        })
    }

    /// Content fingerprint of the forest.
    ///
    /// Hash of every declared version with its ordered dependencies, in key
    /// order. Forests with the same content have the same fingerprint
    /// regardless of the order entities were added in.
    pub fn fingerprint(&self) -> Result<String> {
        #[derive(Serialize)]
        struct FingerprintInput<'a> {
            schema_version: &'static str,
            versions: Vec<(&'a VersionKey, &'a [VersionKey])>,
        }

        let versions = self
            .entities
            .values()
            .flat_map(Entity::declared_versions)
            .map(|declared| (&declared.key, &*declared.dependencies))
            .collect();

        Ok(canonical_hash_hex(&FingerprintInput {
            schema_version: FOREST_SCHEMA_VERSION,
            versions,
        })?)
    }

    /// Cache configuration this forest was built with.
    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache_config
    }

    /// Get closure cache statistics.
    pub fn cache_stats(&self) -> ForestCacheStats {
        ForestCacheStats {
            dependencies: self.dependency_cache.stats(),
            ancestors: self.ancestor_cache.stats(),
        }
    }

    /// Drop every memoized closure.
    pub fn clear_caches(&self) {
        self.dependency_cache.clear();
        self.ancestor_cache.clear();
    }

    fn declared(&self, key: &VersionKey) -> Result<&DeclaredVersion> {
        self.entities
            .get(&key.entity)
            .ok_or_else(|| ForestError::VersionNotFound(key.clone()))?
            .declared_version(key.version)
    }

    fn parents_of(&self, key: &VersionKey) -> &BTreeSet<VersionKey> {
        self.parents.get(key).unwrap_or(&NO_PARENTS)
    }
}

impl Default for VersionForest {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionForest")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("versions", &self.num_versions())
            .field("edges", &self.edges.len())
            .field("cache_config", &self.cache_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, version: u64) -> VersionKey {
        VersionKey::new(name, version)
    }

    /// D{1,2}; C1 -> D1, D2; B1 -> C1; A1 -> B1
    fn diamond() -> VersionForest {
        let mut forest = VersionForest::new();
        forest.add_entity("D", [(1, vec![]), (2, vec![])]).unwrap();
        forest
            .add_entity("C", [(1, vec![key("D", 1), key("D", 2)])])
            .unwrap();
        forest.add_entity("B", [(1, vec![key("C", 1)])]).unwrap();
        forest.add_entity("A", [(1, vec![key("B", 1)])]).unwrap();
        forest
    }

    #[test]
    fn test_parents_are_inverse_of_dependencies() {
        let forest = diamond();

        for edge in forest.edges() {
            assert!(forest.parents(&edge.dependency).unwrap().contains(&edge.dependent));
            assert!(forest.dependencies(&edge.dependent).unwrap().contains(&edge.dependency));
        }
        assert_eq!(forest.num_edges(), 4);
        assert!(forest.parents(&key("A", 1)).unwrap().is_empty());
    }

    #[test]
    fn test_parents_wired_before_dependent_is_materialized() {
        let forest = diamond();

        // Nothing has been requested through get_version yet.
        assert_eq!(forest.entity("C").unwrap().materialized_count(), 0);

        let ancestors = forest.ancestors(&key("D", 2)).unwrap();
        let expected: BTreeSet<_> = [key("A", 1), key("B", 1), key("C", 1)].into_iter().collect();
        assert_eq!(*ancestors, expected);
    }

    #[test]
    fn test_unknown_dependency_rejected_without_changes() {
        let mut forest = diamond();
        let before = forest.num_edges();

        let err = forest
            .add_entity("E", [(1, vec![key("D", 1), key("D", 3)])])
            .unwrap_err();

        assert!(matches!(
            err,
            ForestError::UnknownDependency { ref dependency, .. } if *dependency == key("D", 3)
        ));
        assert!(forest.entity("E").is_err());
        assert_eq!(forest.num_edges(), before);
        assert!(forest.parents(&key("D", 1)).unwrap().len() == 1);
    }

    #[test]
    fn test_dependency_on_later_entity_rejected() {
        let mut forest = VersionForest::new();
        let err = forest.add_entity("A", [(1, vec![key("B", 1)])]).unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let mut forest = diamond();
        let err = forest.add_entity("D", [(3, vec![])]).unwrap_err();
        assert!(matches!(err, ForestError::DuplicateEntity(_)));
        assert!(!forest.contains(&key("D", 3)));
    }

    #[test]
    fn test_same_entity_dependency_allowed() {
        let mut forest = VersionForest::new();
        forest
            .add_entity("A", [(1, vec![]), (2, vec![key("A", 1)])])
            .unwrap();

        let closure = forest.dependency_closure(&key("A", 2)).unwrap();
        assert_eq!(closure.len(), 1);
        assert!(closure.contains(&key("A", 1)));
    }

    #[test]
    fn test_same_entity_cycle_detected() {
        let mut forest = VersionForest::new();
        forest
            .add_entity("A", [(1, vec![key("A", 2)]), (2, vec![key("A", 1)])])
            .unwrap();

        let err = forest.dependency_closure(&key("A", 1)).unwrap_err();
        assert!(matches!(err, ForestError::CycleDetected(_)));

        let err = forest.ancestors(&key("A", 2)).unwrap_err();
        assert!(matches!(err, ForestError::CycleDetected(_)));
    }

    #[test]
    fn test_new_dependent_invalidates_ancestors() {
        let mut forest = diamond();
        let before = forest.ancestors(&key("B", 1)).unwrap();
        assert_eq!(before.len(), 1);

        forest.add_entity("Z", [(1, vec![key("B", 1)])]).unwrap();

        let after = forest.ancestors(&key("B", 1)).unwrap();
        assert_eq!(after.len(), 2);
        assert!(after.contains(&key("Z", 1)));
    }

    #[test]
    fn test_closures_are_cached() {
        let forest = diamond();
        forest.dependency_closure(&key("A", 1)).unwrap();

        let stats = forest.cache_stats();
        // A1, B1, C1, D1, D2
        assert_eq!(stats.dependencies.unwrap().len, 5);

        forest.clear_caches();
        assert_eq!(forest.cache_stats().dependencies.unwrap().len, 0);
    }

    #[test]
    fn test_undeclared_key_lookup() {
        let forest = diamond();
        assert!(matches!(
            forest.dependency_closure(&key("D", 9)),
            Err(ForestError::VersionNotFound(_))
        ));
        assert!(matches!(
            forest.parents(&key("Q", 1)),
            Err(ForestError::VersionNotFound(_))
        ));
        assert!(matches!(forest.entity("Q"), Err(ForestError::EntityNotFound(_))));
    }

    #[test]
    fn test_fingerprint_independent_of_insertion_order() {
        let a = diamond();

        let mut b = VersionForest::new();
        b.add_entity("D", [(2, vec![]), (1, vec![])]).unwrap();
        b.add_entity("C", [(1, vec![key("D", 1), key("D", 2)])]).unwrap();
        b.add_entity("B", [(1, vec![key("C", 1)])]).unwrap();
        b.add_entity("A", [(1, vec![key("B", 1)])]).unwrap();

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        b.add_entity("E", [(1, vec![])]).unwrap();
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_counts() {
        let forest = diamond();
        assert_eq!(forest.num_entities(), 4);
        assert_eq!(forest.num_versions(), 5);
        let names: Vec<_> = forest.entities().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }
}
