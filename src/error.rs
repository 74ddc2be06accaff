//! Error types for forest construction and queries.

use crate::types::{EntityName, VersionKey};

/// Error type for version forest operations.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Entity not registered in the forest.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityName),

    /// Version number not declared for its entity.
    #[error("Version not found: {0}")]
    VersionNotFound(VersionKey),

    /// A declared dependency points at a version that does not exist.
    #[error("Unknown dependency: {dependent} requires {dependency}, which is not declared")]
    UnknownDependency {
        /// Version declaring the dependency.
        dependent: VersionKey,
        /// Missing target.
        dependency: VersionKey,
    },

    /// Entity name already registered.
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(EntityName),

    /// Traversal reached a version that is already on the current path.
    #[error("Dependency cycle detected at {0}")]
    CycleDetected(VersionKey),

    /// Canonical serialization failed while fingerprinting.
    #[error("Canonical serialization failed: {0}")]
    Canonical(#[from] serde_json::Error),
}

impl ForestError {
    /// Whether this error is a lookup failure (unknown entity, version or dependency target).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound(_) | Self::VersionNotFound(_) | Self::UnknownDependency { .. }
        )
    }
}

/// A specialized Result type for forest operations.
pub type Result<T> = std::result::Result<T, ForestError>;
