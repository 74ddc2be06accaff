//! Identity types for entities and their versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number of an entity.
pub type VersionNumber = u64;

/// Unique name of an entity in the forest.
///
/// Wraps a `String` and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName(String);

impl EntityName {
    /// Create a new entity name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash, Eq and Ord all delegate to the inner String, so lookups by &str agree.
impl std::borrow::Borrow<str> for EntityName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Structural identity of a version node: (entity name, version number).
///
/// Two keys are equal iff they name the same entity and the same version,
/// regardless of how a caller reached them. Every set and map of versions in
/// this crate is keyed by `VersionKey`.
///
/// Ordering is canonical: entity name first, then version number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    /// Owning entity.
    pub entity: EntityName,
    /// Version number within the entity.
    pub version: VersionNumber,
}

impl VersionKey {
    /// Create a new version key.
    pub fn new(entity: impl Into<EntityName>, version: VersionNumber) -> Self {
        Self {
            entity: entity.into(),
            version,
        }
    }

    /// Name of the owning entity.
    pub fn name(&self) -> &EntityName {
        &self.entity
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity, self.version)
    }
}
