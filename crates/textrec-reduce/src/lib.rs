//! textrec-reduce
//!
//! Dense projection of the sparse TF-IDF space onto a small number of
//! dimensions with a seeded randomized truncated SVD.

pub mod linalg;
pub mod svd;

pub use svd::{effective_dims, SvdOptions, TruncatedSvd};
