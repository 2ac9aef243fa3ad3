//! Offline build: corpus -> normalizer -> TF-IDF -> SVD -> ANN forest.
//!
//! Every stage must succeed before anything is written; the artifact set is
//! then published atomically (see [`ArtifactSet::save`]).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use textrec_core::config::BuildSettings;
use textrec_core::corpus::{load_corpus, Corpus};
use textrec_core::error::{Error, Result};
use textrec_core::types::Metric;
use textrec_reduce::{SvdOptions, TruncatedSvd};
use textrec_text::{Normalizer, TfidfVectorizer};
use textrec_vector::{AnnoyIndex, ForestOptions};
use tracing::info;

use crate::artifacts::{ArtifactSet, Manifest};

/// Summary of a finished build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub build_id: String,
    pub n_records: usize,
    pub vocabulary_size: usize,
    pub requested_dims: usize,
    pub dims: usize,
    pub clamped: bool,
    pub n_trees: usize,
    pub metric: Metric,
    pub output_dir: PathBuf,
    pub elapsed: Duration,
}

/// 16 hex chars of blake3 over the corpus fingerprint, the settings and the
/// build timestamp.
pub fn build_id_for(corpus_fingerprint: &str, settings: &BuildSettings, timestamp: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(corpus_fingerprint.as_bytes());
    hasher.update(serde_json::to_string(settings).unwrap_or_default().as_bytes());
    hasher.update(timestamp.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}

/// Fit all three artifacts in memory without progress output.
pub fn build_artifacts(corpus: &Corpus, settings: &BuildSettings, normalizer: &Normalizer) -> Result<ArtifactSet> {
    build_artifacts_with_progress(corpus, settings, normalizer, &ProgressBar::hidden())
}

/// Fit all three artifacts, reporting normalized records and finished trees
/// on `pb`.
pub fn build_artifacts_with_progress(
    corpus: &Corpus,
    settings: &BuildSettings,
    normalizer: &Normalizer,
    pb: &ProgressBar,
) -> Result<ArtifactSet> {
    if corpus.is_empty() {
        return Err(Error::data("corpus is empty"));
    }
    let created_at = Utc::now();
    let fingerprint = corpus.fingerprint();
    let build_id = build_id_for(&fingerprint, settings, &created_at.to_rfc3339());
    info!(build_id = %build_id, records = corpus.len(), "Starting build");

    pb.set_length((corpus.len() + settings.n_trees) as u64);
    pb.set_message("normalizing");
    let cleaned: Vec<String> = corpus
        .texts()
        .map(|text| {
            pb.inc(1);
            normalizer.clean(text)
        })
        .collect();

    pb.set_message("fitting TF-IDF");
    let (vectorizer, tfidf) = TfidfVectorizer::fit_transform(&cleaned, settings.max_features)?;

    pb.set_message("fitting SVD");
    let options = SvdOptions::default().with_seed(settings.seed);
    let reducer = TruncatedSvd::fit(&tfidf, settings.n_components, options)?;
    let reduced = reducer.transform(&tfidf)?;
    let vectors: Vec<Vec<f32>> = reduced.rows().into_iter().map(|row| row.to_vec()).collect();

    pb.set_message("building index");
    let forest = ForestOptions::new(settings.n_trees, settings.metric)
        .with_leaf_size(settings.leaf_size)
        .with_seed(settings.seed);
    let index = AnnoyIndex::build_with_progress(&vectors, forest, |_| pb.inc(1))?;

    let manifest = Manifest {
        format_version: textrec_core::persist::FORMAT_VERSION,
        build_id,
        created_at,
        metric: settings.metric,
        dims: reducer.n_components(),
        requested_dims: settings.n_components,
        vocabulary_size: vectorizer.vocabulary_size(),
        n_items: corpus.len(),
        n_trees: settings.n_trees,
        corpus_fingerprint: fingerprint,
        files: Default::default(),
    };
    Ok(ArtifactSet { manifest, vectorizer, reducer, index })
}

/// Load the corpus named by `settings`, build, and publish into
/// `settings.models_dir`.
pub fn run_build(settings: &BuildSettings) -> Result<BuildReport> {
    let started = Instant::now();
    let corpus = load_corpus(&settings.text_data_path)?;
    let normalizer = Normalizer::english();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| Error::config(format!("progress template: {e}")))?
            .progress_chars("#>-"),
    );
    let result = build_artifacts_with_progress(&corpus, settings, &normalizer, &pb);
    let mut set = match result {
        Ok(set) => set,
        Err(e) => {
            pb.abandon_with_message("build failed");
            return Err(e);
        }
    };
    pb.set_message("writing artifacts");
    set.save(&settings.models_dir)?;
    pb.finish_with_message("done");

    let report = BuildReport {
        build_id: set.manifest.build_id.clone(),
        n_records: corpus.len(),
        vocabulary_size: set.manifest.vocabulary_size,
        requested_dims: set.manifest.requested_dims,
        dims: set.manifest.dims,
        clamped: set.reducer.was_clamped(),
        n_trees: set.manifest.n_trees,
        metric: set.manifest.metric,
        output_dir: settings.models_dir.clone(),
        elapsed: started.elapsed(),
    };
    info!(build_id = %report.build_id, dims = report.dims, elapsed_ms = report.elapsed.as_millis() as u64, "Build finished");
    Ok(report)
}
