//! textrec-search
//!
//! Offline build of the matched artifact set (vectorizer, reducer, index)
//! and the online searcher that consumes it.

pub mod artifacts;
pub mod pipeline;
pub mod searcher;

pub use artifacts::{ArtifactSet, Manifest};
pub use pipeline::{build_artifacts, run_build, BuildReport};
pub use searcher::{SearchOptions, Searcher};
