//! Query-time retrieval over a loaded artifact set.

use std::path::Path;
use std::sync::Arc;

use textrec_core::corpus::{load_corpus, Corpus};
use textrec_core::error::{Error, Result};
use textrec_core::traits::VectorIndex;
use textrec_core::types::{CorpusRecord, Neighbor};
use textrec_reduce::TruncatedSvd;
use textrec_text::{Normalizer, TfidfVectorizer};
use textrec_vector::AnnoyIndex;
use tracing::debug;

use crate::artifacts::ArtifactSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Candidate budget per query; `None` lets the index pick its default.
    pub search_k: Option<usize>,
}

/// Normalizer -> vectorizer -> reducer -> index, then ordinals back to
/// records. Immutable after construction; share it behind an `Arc`.
pub struct Searcher<I: VectorIndex = AnnoyIndex> {
    normalizer: Arc<Normalizer>,
    vectorizer: TfidfVectorizer,
    reducer: TruncatedSvd,
    index: I,
    corpus: Corpus,
    build_id: String,
    options: SearchOptions,
}

impl Searcher<AnnoyIndex> {
    /// Wrap a loaded set after checking it was built from `corpus`.
    pub fn new(artifacts: ArtifactSet, corpus: Corpus, normalizer: Arc<Normalizer>) -> Result<Self> {
        artifacts.check_consistency()?;
        artifacts.check_corpus(&corpus)?;
        let ArtifactSet { manifest, vectorizer, reducer, index } = artifacts;
        Self::from_parts(normalizer, vectorizer, reducer, index, corpus, manifest.build_id)
    }

    /// Load the artifact set in `models_dir` and the corpus at `corpus_path`.
    pub fn open(models_dir: &Path, corpus_path: &Path, options: SearchOptions) -> Result<Self> {
        let artifacts = ArtifactSet::load(models_dir)?;
        let corpus = load_corpus(corpus_path)?;
        Ok(Self::new(artifacts, corpus, Arc::new(Normalizer::english()))?.with_options(options))
    }
}

impl<I: VectorIndex> Searcher<I> {
    /// Assemble a searcher from individual parts. Shapes must line up:
    /// vectorizer vocabulary = reducer input, reducer output = index dim,
    /// index size = corpus size.
    pub fn from_parts(
        normalizer: Arc<Normalizer>,
        vectorizer: TfidfVectorizer,
        reducer: TruncatedSvd,
        index: I,
        corpus: Corpus,
        build_id: impl Into<String>,
    ) -> Result<Self> {
        if reducer.n_features() != vectorizer.vocabulary_size() {
            return Err(Error::artifact(format!(
                "reducer expects {} features, vectorizer produces {}",
                reducer.n_features(),
                vectorizer.vocabulary_size()
            )));
        }
        if reducer.n_components() != index.dim() {
            return Err(Error::artifact(format!(
                "reducer outputs {} dims, index holds {}",
                reducer.n_components(),
                index.dim()
            )));
        }
        if index.len() != corpus.len() {
            return Err(Error::artifact(format!(
                "index holds {} items, corpus has {} records",
                index.len(),
                corpus.len()
            )));
        }
        Ok(Self {
            normalizer,
            vectorizer,
            reducer,
            index,
            corpus,
            build_id: build_id.into(),
            options: SearchOptions::default(),
        })
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Dense query vector in the reduced space. Empty or fully
    /// out-of-vocabulary text yields the zero vector.
    pub fn query_vector(&self, query: &str) -> Vec<f32> {
        let cleaned = self.normalizer.clean(query);
        let sparse = self.vectorizer.transform(&[cleaned.as_str()]);
        self.reducer.transform_row(sparse.row(0))
    }

    /// Nearest ordinals with distances, nearest first.
    pub fn neighbors(&self, query: &str, top_k: usize) -> Result<Vec<Neighbor>> {
        let vector = self.query_vector(query);
        let hits = match self.options.search_k {
            Some(search_k) => self.index.nearest_with_budget(&vector, top_k, search_k)?,
            None => self.index.nearest(&vector, top_k)?,
        };
        debug!(query, top_k, hits = hits.len(), "neighbors");
        Ok(hits)
    }

    /// Up to `top_k` records most similar to `query`, nearest first.
    pub fn find_similar(&self, query: &str, top_k: usize) -> Result<Vec<&CorpusRecord>> {
        self.neighbors(query, top_k)?
            .into_iter()
            .map(|hit| {
                self.corpus
                    .get(hit.id)
                    .ok_or_else(|| Error::artifact(format!("index returned unknown ordinal {}", hit.id)))
            })
            .collect()
    }

    pub fn build_id(&self) -> &str { &self.build_id }
    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn len(&self) -> usize { self.corpus.len() }
    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }
    pub fn dims(&self) -> usize { self.index.dim() }
}
