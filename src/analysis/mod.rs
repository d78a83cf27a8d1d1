//! Analyses over algebra trees shared by the analyzers and the CLI.

/// Characteristic sets of subject variables.
pub mod characteristic;
/// Backward requirement propagation and OPTIONAL classification.
pub mod dependency;
/// Property-path and predicate utilities.
pub mod paths;
/// Pre-order traversal.
pub mod walk;

pub use characteristic::{characteristic_sets, CharacteristicSet, StarTally};
pub use dependency::{analyze_dependencies, DependencyMap, OptionalSite, Requirement};
pub use paths::{count_complex_elements, has_unbound_predicate, property_paths, PathPattern, PathRewriter};
pub use walk::WalkConfig;
