//! Entity registry: one named entity and its versions.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ForestError, Result};
use crate::types::{EntityName, VersionKey, VersionNumber};

/// A version as declared at construction time.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredVersion {
    pub(crate) key: VersionKey,
    pub(crate) dependencies: Arc<[VersionKey]>,
}

/// A materialized version node.
///
/// Holds the node's identity and its ordered dependency list. Parent
/// back-references live in the forest's parent index, see
/// [`VersionForest::parents`](super::VersionForest::parents).
#[derive(Debug, Clone)]
pub struct VersionNode {
    key: VersionKey,
    dependencies: Arc<[VersionKey]>,
}

impl VersionNode {
    fn from_declared(declared: &DeclaredVersion) -> Self {
        Self {
            key: declared.key.clone(),
            dependencies: Arc::clone(&declared.dependencies),
        }
    }

    /// Structural key of this node.
    pub fn key(&self) -> &VersionKey {
        &self.key
    }

    /// Name of the owning entity.
    pub fn name(&self) -> &EntityName {
        &self.key.entity
    }

    /// Version number within the owning entity.
    pub fn number(&self) -> VersionNumber {
        self.key.version
    }

    /// Versions this node requires, in declaration order.
    pub fn dependencies(&self) -> &[VersionKey] {
        &self.dependencies
    }
}

impl PartialEq for VersionNode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for VersionNode {}

impl std::fmt::Display for VersionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.key.fmt(f)
    }
}

/// A named entity owning a set of declared versions.
///
/// Version nodes are materialized on first request and cached, so repeated
/// calls to [`Entity::get_version`] return the same `Arc`.
#[derive(Debug)]
pub struct Entity {
    name: EntityName,
    declared: BTreeMap<VersionNumber, DeclaredVersion>,
    materialized: RwLock<BTreeMap<VersionNumber, Arc<VersionNode>>>,
}

impl Entity {
    pub(crate) fn new(name: EntityName, versions: BTreeMap<VersionNumber, Vec<VersionKey>>) -> Self {
        let declared = versions
            .into_iter()
            .map(|(number, dependencies)| {
                let declared = DeclaredVersion {
                    key: VersionKey::new(name.clone(), number),
                    dependencies: dependencies.into(),
                };
                (number, declared)
            })
            .collect();

        Self {
            name,
            declared,
            materialized: RwLock::new(BTreeMap::new()),
        }
    }

    /// Entity name.
    pub fn name(&self) -> &EntityName {
        &self.name
    }

    /// Declared version numbers in ascending order.
    pub fn version_numbers(&self) -> impl Iterator<Item = VersionNumber> + '_ {
        self.declared.keys().copied()
    }

    /// Number of declared versions.
    pub fn num_versions(&self) -> usize {
        self.declared.len()
    }

    /// Whether `number` is a declared version of this entity.
    pub fn is_declared(&self, number: VersionNumber) -> bool {
        self.declared.contains_key(&number)
    }

    /// Dependencies declared for `number`, in declaration order.
    pub fn declared_dependencies(&self, number: VersionNumber) -> Result<&[VersionKey]> {
        self.declared_version(number)
            .map(|declared| &*declared.dependencies)
    }

    /// Get the materialized node for a declared version.
    ///
    /// The first call creates and caches the node; later calls return the
    /// cached `Arc`. Undeclared numbers fail with
    /// [`ForestError::VersionNotFound`] and leave the cache untouched.
    pub fn get_version(&self, number: VersionNumber) -> Result<Arc<VersionNode>> {
        let declared = self.declared_version(number)?;

        if let Some(node) = self.materialized.read().get(&number) {
            return Ok(Arc::clone(node));
        }

        // Check and insert under one write lock so concurrent first access
        // still yields a single node.
        let mut materialized = self.materialized.write();
        let node = materialized.entry(number).or_insert_with(|| {
            tracing::trace!(version = %declared.key, "Materializing version node");
            Arc::new(VersionNode::from_declared(declared))
        });
        Ok(Arc::clone(node))
    }

    /// Number of versions materialized so far.
    pub fn materialized_count(&self) -> usize {
        self.materialized.read().len()
    }

    pub(crate) fn declared_version(&self, number: VersionNumber) -> Result<&DeclaredVersion> {
        self.declared
            .get(&number)
            .ok_or_else(|| ForestError::VersionNotFound(VersionKey::new(self.name.clone(), number)))
    }

    pub(crate) fn declared_versions(&self) -> impl Iterator<Item = &DeclaredVersion> + '_ {
        self.declared.values()
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}
