//! TF-IDF vectorizer over cleaned text.
//!
//! Fitting learns a capped vocabulary and smoothed inverse document
//! frequencies; transforming only ever uses what was learned, so unseen terms
//! contribute nothing.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use textrec_core::error::{Error, Result};
use textrec_core::sparse::SparseMatrix;
use tracing::{debug, info};

/// Shortest term kept in the vocabulary, in characters.
pub const MIN_TERM_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    /// term -> column; columns follow alphabetical term order
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

fn terms_of(doc: &str) -> impl Iterator<Item = &str> {
    doc.split_whitespace().filter(|t| t.chars().count() >= MIN_TERM_LEN)
}

impl TfidfVectorizer {
    /// Learn vocabulary and idf weights from cleaned documents.
    ///
    /// When more than `max_features` distinct terms exist the most frequent
    /// ones (by corpus-wide count, ties alphabetical) are kept.
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Result<Self> {
        if max_features == 0 {
            return Err(Error::config("max_features must be >= 1"));
        }
        if documents.is_empty() {
            return Err(Error::data("cannot fit a vectorizer on an empty corpus"));
        }

        let mut term_count: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in terms_of(doc.as_ref()) {
                *term_count.entry(term).or_insert(0) += 1;
                if seen.insert(term) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }
        if term_count.is_empty() {
            return Err(Error::data(format!(
                "empty vocabulary: all {} documents are empty after cleaning",
                documents.len()
            )));
        }

        let distinct = term_count.len();
        let mut ranked: Vec<(&str, usize)> = term_count.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n = documents.len() as f64;
        let idf = kept
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = kept.into_iter().enumerate().map(|(i, t)| (t.to_string(), i)).collect();

        let fitted = Self { max_features, vocabulary, idf };
        info!(
            documents = documents.len(),
            distinct_terms = distinct,
            vocabulary = fitted.vocabulary_size(),
            "Fitted TF-IDF vectorizer"
        );
        Ok(fitted)
    }

    /// One L2-normalized TF-IDF row per input text. Out-of-vocabulary terms
    /// are ignored; a text with none in the vocabulary gives an all-zero row.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> SparseMatrix {
        let mut matrix = SparseMatrix::new(self.vocabulary_size());
        for text in texts {
            matrix.push_row(self.row(text.as_ref()));
        }
        debug!(rows = matrix.n_rows(), nnz = matrix.nnz(), "TF-IDF transform");
        matrix
    }

    pub fn fit_transform<S: AsRef<str>>(documents: &[S], max_features: usize) -> Result<(Self, SparseMatrix)> {
        let fitted = Self::fit(documents, max_features)?;
        let matrix = fitted.transform(documents);
        Ok((fitted, matrix))
    }

    fn row(&self, text: &str) -> Vec<(usize, f64)> {
        // column order keeps the norm's summation order, and so the bits, stable
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in terms_of(text) {
            if let Some(&col) = self.vocabulary.get(term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }
        let mut entries: Vec<(usize, f64)> = counts.into_iter().map(|(col, tf)| (col, tf * self.idf[col])).collect();
        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut entries {
                *v /= norm;
            }
        }
        entries
    }

    pub fn vocabulary_size(&self) -> usize { self.idf.len() }
    pub fn max_features(&self) -> usize { self.max_features }
    pub fn term_index(&self, term: &str) -> Option<usize> { self.vocabulary.get(term).copied() }
    /// Terms in column order.
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ { self.vocabulary.keys().map(String::as_str) }
    pub fn idf(&self) -> &[f64] { &self.idf }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: [&str; 3] = ["cat sat mat", "dog ran fast", "cat ran fast"];

    #[test]
    fn vocabulary_is_alphabetical_with_smoothed_idf() {
        let v = TfidfVectorizer::fit(&DOCS, 100).unwrap();
        let terms: Vec<&str> = v.terms().collect();
        assert_eq!(terms, ["cat", "dog", "fast", "mat", "ran", "sat"]);
        let cat = v.idf()[v.term_index("cat").unwrap()];
        let dog = v.idf()[v.term_index("dog").unwrap()];
        assert!((cat - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        assert!((dog - (2.0f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn rows_are_unit_length() {
        let (_, m) = TfidfVectorizer::fit_transform(&DOCS, 100).unwrap();
        assert_eq!(m.shape(), (3, 6));
        for row in m.rows() {
            let norm: f64 = row.iter().map(|(_, v)| v * v).sum();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn max_features_keeps_most_frequent_terms() {
        let docs = ["apple apple banana", "apple cherry", "banana date"];
        let v = TfidfVectorizer::fit(&docs, 2).unwrap();
        let terms: Vec<&str> = v.terms().collect();
        assert_eq!(terms, ["apple", "banana"]);
        // cherry and date tie at one occurrence; alphabetical order decides
        let v = TfidfVectorizer::fit(&docs, 3).unwrap();
        assert_eq!(v.terms().collect::<Vec<_>>(), ["apple", "banana", "cherry"]);
    }

    #[test]
    fn out_of_vocabulary_text_is_all_zero() {
        let v = TfidfVectorizer::fit(&DOCS, 100).unwrap();
        let m = v.transform(&["zebra quantum", ""]);
        assert_eq!(m.shape(), (2, 6));
        assert_eq!(m.nnz(), 0);
        assert!(m.row_to_dense(0).iter().all(|x| *x == 0.0));
    }

    #[test]
    fn repeated_transforms_are_bit_identical() {
        let text: String = (0..60).flat_map(|i| vec![format!("term{i}"); 1 + i % 3]).collect::<Vec<_>>().join(" ");
        let v = TfidfVectorizer::fit(&[text.as_str(), "other words here"], 100).unwrap();
        let first = v.transform(&[text.as_str()]);
        for _ in 0..50 {
            assert_eq!(v.transform(&[text.as_str()]), first);
            assert_eq!(TfidfVectorizer::fit(&[text.as_str(), "other words here"], 100).unwrap().transform(&[text.as_str()]), first);
        }
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let v = TfidfVectorizer::fit(&["a b cc", "dd e"], 10).unwrap();
        assert_eq!(v.terms().collect::<Vec<_>>(), ["cc", "dd"]);
    }

    #[test]
    fn degenerate_inputs_are_data_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(TfidfVectorizer::fit(&empty, 10), Err(Error::Data(_))));
        assert!(matches!(TfidfVectorizer::fit(&["", "  ", "x"], 10), Err(Error::Data(_))));
        assert!(matches!(TfidfVectorizer::fit(&DOCS, 0), Err(Error::Config(_))));
    }
}
