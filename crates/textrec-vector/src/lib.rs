//! textrec-vector
//!
//! Approximate nearest-neighbor search over the reduced document vectors:
//! a forest of random-projection trees, plus a brute-force index with the
//! same interface for measuring recall.

pub mod distance;
pub mod exact;
pub mod forest;

pub use exact::ExactIndex;
pub use forest::{AnnoyIndex, ForestOptions};
pub use textrec_core::traits::VectorIndex;
