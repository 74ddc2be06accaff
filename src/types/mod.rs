//! Core types for the version forest.

pub mod version;
pub mod edge;

pub use version::{EntityName, VersionKey, VersionNumber};
pub use edge::DependencyEdge;
