//! textrec-core
//!
//! Shared building blocks for the recommender: corpus records and loader,
//! the error taxonomy, configuration, the sparse matrix handed from the
//! vectorizer to the reducer, and versioned artifact file I/O.

#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod persist;
pub mod sparse;
pub mod traits;
pub mod types;
