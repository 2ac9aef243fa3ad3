//! Domain types shared by the normalizer, vectorizer, reducer and index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Dense 0-based row position of a record, fixed for the lifetime of a build.
pub type Ordinal = usize;
pub type Meta = BTreeMap<String, String>;

/// One content item of the corpus.
///
/// - `ordinal`: row position; also the identifier used by the ANN index
/// - `text`: the raw text that gets normalized and vectorized
/// - `metadata`: every other input column, carried through untouched
///
/// Serializes as a flat object (`text` plus the metadata columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    #[serde(skip)]
    pub ordinal: Ordinal,
    pub text: String,
    #[serde(flatten)]
    pub metadata: Meta,
}

/// Distance used by the ANN index. Lower distance is always closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `sqrt(2 - 2 * cos)`, i.e. euclidean distance of the normalized vectors.
    #[default]
    Angular,
    Euclidean,
    Manhattan,
    /// Negated inner product.
    Dot,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Angular => "angular",
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Dot => "dot",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "angular" | "cosine" => Ok(Metric::Angular),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "manhattan" | "l1" => Ok(Metric::Manhattan),
            "dot" => Ok(Metric::Dot),
            other => Err(Error::config(format!("unknown metric '{other}' (expected angular, euclidean, manhattan or dot)"))),
        }
    }
}

/// A single index hit: the record ordinal and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: Ordinal,
    pub distance: f32,
}
