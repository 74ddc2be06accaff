//! Conflict detection and convergence-point queries.
//!
//! Every query here is a pure read over the already-wired forest. Results
//! are ordered by [`VersionKey`] (or [`EntityName`]), so the same forest
//! always produces the same output.
//!
//! ## Contradictions
//!
//! A version's dependency closure is grouped by entity. Any entity present
//! with two or more distinct version numbers is a contradiction.
//!
//! ## Lowest Commonalities
//!
//! Given a root and two versions `a` and `b` below it:
//!
//! 1. Candidates are the common ancestors of `a` and `b` that the root
//!    requires, plus the root itself when there is at least one.
//! 2. A candidate is dropped when one of its direct dependencies is also a
//!    candidate and none of its direct dependencies leads toward only `a`
//!    or only `b`. A strictly lower candidate already captures it.
//! 3. Everything left is a lowest convergence point.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::closure::Closure;
use crate::error::Result;
use crate::forest::{VersionForest, VersionNode};
use crate::types::{EntityName, VersionKey, VersionNumber};

/// Conflicting version numbers per entity.
pub type ContradictionDetails = BTreeMap<EntityName, BTreeSet<VersionNumber>>;

impl VersionForest {
    /// Get a query handle for a declared version.
    ///
    /// Materializes the node through [`Entity::get_version`](crate::Entity::get_version).
    pub fn version(&self, name: &str, number: VersionNumber) -> Result<Version<'_>> {
        let node = self.entity(name)?.get_version(number)?;
        Ok(Version { forest: self, node })
    }

    /// Get a query handle for a version key.
    pub fn version_of(&self, key: &VersionKey) -> Result<Version<'_>> {
        self.version(key.entity.as_str(), key.version)
    }

    /// Entities with two or more distinct versions in `key`'s dependency closure.
    pub fn contradictions(&self, key: &VersionKey) -> Result<BTreeSet<EntityName>> {
        Ok(self.contradiction_details(key)?.into_keys().collect())
    }

    /// Like [`VersionForest::contradictions`], with the clashing version numbers.
    pub fn contradiction_details(&self, key: &VersionKey) -> Result<ContradictionDetails> {
        let closure = self.dependency_closure(key)?;

        let mut by_entity = ContradictionDetails::new();
        for version in closure.iter() {
            by_entity
                .entry(version.entity.clone())
                .or_default()
                .insert(version.version);
        }
        by_entity.retain(|_, versions| versions.len() > 1);

        if !by_entity.is_empty() {
            tracing::debug!(
                version = %key,
                conflicts = by_entity.len(),
                "Contradictions found in dependency closure"
            );
        }

        Ok(by_entity)
    }

    /// Every version that is an ancestor of both `a` and `b`.
    pub fn find_commonalities(&self, a: &VersionKey, b: &VersionKey) -> Result<BTreeSet<VersionKey>> {
        let ancestors_a = self.ancestors(a)?;
        let ancestors_b = self.ancestors(b)?;
        Ok(ancestors_a.intersection(&ancestors_b).cloned().collect())
    }

    /// Common ancestors of `a` and `b` that `root` requires, plus `root` itself
    /// if there are any.
    pub fn find_commonalities_under(
        &self,
        root: &VersionKey,
        a: &VersionKey,
        b: &VersionKey,
    ) -> Result<BTreeSet<VersionKey>> {
        let common = self.find_commonalities(a, b)?;
        let required = self.dependency_closure(root)?;

        let mut under: BTreeSet<VersionKey> = common.intersection(&required).cloned().collect();
        if !under.is_empty() {
            under.insert(root.clone());
        }
        Ok(under)
    }

    /// Lowest convergence points of `a` and `b` under `root`, in key order.
    ///
    /// A candidate from [`VersionForest::find_commonalities_under`] is kept
    /// when it has no candidate among its direct dependencies, or when at
    /// least one direct dependency is an ancestor of `a` or `b` without being
    /// a candidate itself.
    pub fn find_lowest_commonalities(
        &self,
        root: &VersionKey,
        a: &VersionKey,
        b: &VersionKey,
    ) -> Result<Vec<VersionKey>> {
        let candidates = self.find_commonalities_under(root, a, b)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ancestors_a = self.ancestors(a)?;
        let ancestors_b = self.ancestors(b)?;

        let mut lowest = Vec::new();
        for candidate in &candidates {
            let dependencies = self.dependencies(candidate)?;

            let commonality_as_child = dependencies.iter().any(|d| candidates.contains(d));
            let ancestor_as_child = dependencies.iter().any(|d| {
                !candidates.contains(d) && (ancestors_a.contains(d) || ancestors_b.contains(d))
            });

            if ancestor_as_child || !commonality_as_child {
                lowest.push(candidate.clone());
            }
        }

        tracing::debug!(
            root = %root,
            a = %a,
            b = %b,
            candidates = candidates.len(),
            lowest = lowest.len(),
            "Resolved lowest commonalities"
        );

        Ok(lowest)
    }
}

/// Query handle for one materialized version.
///
/// Borrows the forest; every method delegates to the forest's query API with
/// this version's key.
#[derive(Clone)]
pub struct Version<'f> {
    forest: &'f VersionForest,
    node: Arc<VersionNode>,
}

impl<'f> Version<'f> {
    /// Structural key.
    pub fn key(&self) -> &VersionKey {
        self.node.key()
    }

    /// Owning entity name.
    pub fn name(&self) -> &EntityName {
        self.node.name()
    }

    /// Version number.
    pub fn number(&self) -> VersionNumber {
        self.node.number()
    }

    /// The materialized node backing this handle.
    pub fn node(&self) -> &Arc<VersionNode> {
        &self.node
    }

    /// Versions this one requires, in declaration order.
    pub fn dependencies(&self) -> &[VersionKey] {
        self.node.dependencies()
    }

    /// Versions that directly require this one.
    pub fn parents(&self) -> Result<&'f BTreeSet<VersionKey>> {
        self.forest.parents(self.node.key())
    }

    /// Transitive dependency closure, excluding this version.
    pub fn get_all_dependency_versions(&self) -> Result<Closure> {
        self.forest.dependency_closure(self.key())
    }

    /// Entities whose versions conflict within this version's closure.
    pub fn get_contradictions(&self) -> Result<BTreeSet<EntityName>> {
        self.forest.contradictions(self.key())
    }

    /// Conflicting version numbers per entity.
    pub fn contradiction_details(&self) -> Result<ContradictionDetails> {
        self.forest.contradiction_details(self.key())
    }

    /// Every version that requires this one, in key order.
    pub fn get_ancestors(&self) -> Result<Vec<VersionKey>> {
        Ok(self.forest.ancestors(self.key())?.iter().cloned().collect())
    }

    /// Common ancestors of this version and `other`.
    pub fn find_commonalities(&self, other: &Version<'_>) -> Result<BTreeSet<VersionKey>> {
        self.forest.find_commonalities(self.key(), other.key())
    }

    /// Common ancestors of `a` and `b` required by this version.
    pub fn find_commonalities_under(
        &self,
        a: &Version<'_>,
        b: &Version<'_>,
    ) -> Result<BTreeSet<VersionKey>> {
        self.forest.find_commonalities_under(self.key(), a.key(), b.key())
    }

    /// Lowest convergence points of `a` and `b` under this version.
    pub fn find_lowest_commonalities(
        &self,
        a: &Version<'_>,
        b: &Version<'_>,
    ) -> Result<Vec<VersionKey>> {
        self.forest.find_lowest_commonalities(self.key(), a.key(), b.key())
    }
}

impl PartialEq for Version<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version<'_> {}

impl fmt::Debug for Version<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Version").field(self.key()).finish()
    }
}

impl fmt::Display for Version<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}
