//! # version-forest
//!
//! Version conflict detection and convergence-point resolution for forests
//! of versioned entities.
//!
//! An entity (a library, a module) has several versions; each version may
//! require specific versions of other entities. The forest answers two
//! questions:
//!
//! > Which entities does a version transitively require in more than one version?
//!
//! > Where, below a given root, do two versions first converge?
//!
//! ## Architecture
//!
//! ```text
//! add_entity → Entity (declared versions, lazy VersionNode cache)
//!                  ↓
//!            VersionForest (parent index, closure caches)
//!                  ↓
//!   dependency_closure / ancestors → contradictions, commonalities
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Versions are identified structurally by `(entity name, version number)`
//! - Every result set is ordered by `VersionKey` or `EntityName`
//! - The graph is immutable once an entity is added; queries are pure reads
//!
//! ## Example
//!
//! ```rust
//! use version_forest::{VersionForest, VersionKey};
//!
//! let mut forest = VersionForest::new();
//! forest.add_entity("D", [(1, vec![]), (2, vec![])])?;
//! forest.add_entity("C", [(1, vec![VersionKey::new("D", 1), VersionKey::new("D", 2)])])?;
//! forest.add_entity("B", [(1, vec![VersionKey::new("C", 1)])])?;
//!
//! let b1 = forest.version("B", 1)?;
//! let conflicts = b1.get_contradictions()?;
//! assert!(conflicts.iter().any(|e| e.as_str() == "D"));
//! # Ok::<(), version_forest::ForestError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod canonical;
pub mod closure;
pub mod forest;
pub mod analysis;

// Re-exports
pub use types::{DependencyEdge, EntityName, VersionKey, VersionNumber};
pub use error::{ForestError, Result};
pub use closure::{CacheConfig, CacheStats, Closure, Direction};
pub use forest::{Entity, ForestCacheStats, VersionForest, VersionNode};
pub use analysis::{ContradictionDetails, Version};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Schema version folded into forest fingerprints.
/// Increment when the fingerprint input changes shape.
pub const FOREST_SCHEMA_VERSION: &str = "1.0.0";
