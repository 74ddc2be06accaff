//! Dependency edges between versions.

use serde::{Deserialize, Serialize};
use super::version::VersionKey;

/// Directed edge in the version DAG.
///
/// Points from the version that declares the requirement to the version it
/// requires. The inverse direction is the parent back-reference.
/// Implements `Ord` for deterministic ordering: (dependent, dependency).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Version that declares the dependency (source).
    pub dependent: VersionKey,
    /// Version being required (target).
    pub dependency: VersionKey,
}

impl DependencyEdge {
    /// Create a new edge.
    pub fn new(dependent: VersionKey, dependency: VersionKey) -> Self {
        Self {
            dependent,
            dependency,
        }
    }
}

// Canonical ordering: dependent, then dependency
impl PartialOrd for DependencyEdge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyEdge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dependent
            .cmp(&other.dependent)
            .then_with(|| self.dependency.cmp(&other.dependency))
    }
}

impl std::fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.dependent, self.dependency)
    }
}
