use crate::error::Result;
use crate::types::{Metric, Neighbor};

/// Read-only nearest-neighbor lookup over dense vectors whose identifiers are
/// corpus ordinals.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn metric(&self) -> Metric;
    /// Up to `k` neighbors, nearest first, without duplicates. `k` larger than
    /// [`len`](Self::len) yields every item.
    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// [`nearest`](Self::nearest) with an explicit candidate budget. Exact
    /// indexes ignore the budget.
    fn nearest_with_budget(&self, query: &[f32], k: usize, _search_k: usize) -> Result<Vec<Neighbor>> {
        self.nearest(query, k)
    }
}
