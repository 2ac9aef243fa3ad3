//! Compressed sparse row matrix.
//!
//! The TF-IDF vectorizer produces one of these and the reducer consumes it.
//! Only the handful of products the reducer needs are implemented.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f64],
}

impl SparseRow<'_> {
    pub fn nnz(&self) -> usize { self.indices.len() }
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

impl SparseMatrix {
    /// Empty matrix with `n_cols` columns and no rows.
    pub fn new(n_cols: usize) -> Self {
        Self { n_cols, indptr: vec![0], indices: Vec::new(), data: Vec::new() }
    }

    /// Append a row given as (column, value) pairs. Columns must be `< n_cols`;
    /// they are stored sorted and zero values are dropped.
    pub fn push_row(&mut self, mut entries: Vec<(usize, f64)>) {
        entries.sort_by_key(|(c, _)| *c);
        for (c, v) in entries {
            debug_assert!(c < self.n_cols, "column {c} out of bounds ({})", self.n_cols);
            if v != 0.0 {
                self.indices.push(c);
                self.data.push(v);
            }
        }
        self.indptr.push(self.indices.len());
    }

    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        let mut m = Self::new(n_cols);
        for row in rows { m.push_row(row); }
        m
    }

    pub fn n_rows(&self) -> usize { self.indptr.len() - 1 }
    pub fn n_cols(&self) -> usize { self.n_cols }
    pub fn shape(&self) -> (usize, usize) { (self.n_rows(), self.n_cols) }
    pub fn nnz(&self) -> usize { self.data.len() }

    pub fn row(&self, i: usize) -> SparseRow<'_> {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        SparseRow { indices: &self.indices[start..end], values: &self.data[start..end] }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseRow<'_>> + '_ { (0..self.n_rows()).map(|i| self.row(i)) }

    pub fn row_to_dense(&self, i: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.n_cols];
        for (c, v) in self.row(i).iter() { out[c] = v; }
        out
    }

    /// `self · rhs`, with `rhs` of shape `(n_cols, l)`.
    pub fn mul_dense(&self, rhs: &Array2<f64>) -> Array2<f64> {
        assert_eq!(rhs.nrows(), self.n_cols, "inner dimensions must agree");
        let l = rhs.ncols();
        let mut out = Array2::<f64>::zeros((self.n_rows(), l));
        for (i, row) in self.rows().enumerate() {
            let mut out_row = out.row_mut(i);
            for (c, v) in row.iter() {
                out_row.scaled_add(v, &rhs.row(c));
            }
        }
        out
    }

    /// `selfᵀ · rhs`, with `rhs` of shape `(n_rows, l)`.
    pub fn transpose_mul_dense(&self, rhs: &Array2<f64>) -> Array2<f64> {
        assert_eq!(rhs.nrows(), self.n_rows(), "inner dimensions must agree");
        let l = rhs.ncols();
        let mut out = Array2::<f64>::zeros((self.n_cols, l));
        for (i, row) in self.rows().enumerate() {
            let rhs_row = rhs.row(i);
            for (c, v) in row.iter() {
                out.row_mut(c).scaled_add(v, &rhs_row);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> SparseMatrix {
        // [[1 0 2]
        //  [0 0 0]
        //  [0 3 0]]
        SparseMatrix::from_rows(3, vec![vec![(2, 2.0), (0, 1.0)], vec![], vec![(1, 3.0), (0, 0.0)]])
    }

    #[test]
    fn rows_are_sorted_and_zeros_dropped() {
        let m = sample();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(0).indices, &[0, 2]);
        assert_eq!(m.row(1).nnz(), 0);
        assert_eq!(m.row_to_dense(2), vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn products_match_dense_arithmetic() {
        let m = sample();
        let rhs = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        assert_eq!(m.mul_dense(&rhs), array![[3.0, 2.0], [0.0, 0.0], [0.0, 3.0]]);
        let rhs_t = array![[1.0], [5.0], [2.0]];
        assert_eq!(m.transpose_mul_dense(&rhs_t), array![[1.0], [6.0], [2.0]]);
    }
}
