//! Brute-force index: scores every item. Used as ground truth for recall.

use textrec_core::error::{Error, Result};
use textrec_core::traits::VectorIndex;
use textrec_core::types::{Metric, Neighbor};

use crate::distance::distance;

#[derive(Debug, Clone)]
pub struct ExactIndex {
    dim: usize,
    metric: Metric,
    vectors: Vec<Vec<f32>>,
}

impl ExactIndex {
    pub fn new(vectors: Vec<Vec<f32>>, metric: Metric) -> Result<Self> {
        let dim = vectors.first().map_or(0, Vec::len);
        if let Some(i) = vectors.iter().position(|v| v.len() != dim) {
            return Err(Error::data(format!("vector {i} has {} dimensions, expected {dim}", vectors[i].len())));
        }
        Ok(Self { dim, metric, vectors })
    }
}

impl VectorIndex for ExactIndex {
    fn dim(&self) -> usize { self.dim }
    fn len(&self) -> usize { self.vectors.len() }
    fn metric(&self) -> Metric { self.metric }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if !self.vectors.is_empty() && query.len() != self.dim {
            return Err(Error::artifact(format!(
                "query has {} dimensions but the index holds {}",
                query.len(),
                self.dim
            )));
        }
        let mut scored: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| Neighbor { id, distance: distance(self.metric, query, v) })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        scored.truncate(k);
        Ok(scored)
    }
}
