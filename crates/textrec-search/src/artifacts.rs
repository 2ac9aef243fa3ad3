//! The matched artifact set and its manifest.
//!
//! A models directory holds `tfidf.bin`, `svd.bin`, `content_index.ann` and
//! `manifest.json`. All three artifacts embed the same build id; the manifest
//! records it together with file checksums and the shape of the reduced space.
//! Loading refuses any set whose parts disagree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textrec_core::corpus::Corpus;
use textrec_core::error::{Error, Result};
use textrec_core::persist::{file_checksum, read_artifact, write_artifact, ArtifactKind, FORMAT_VERSION};
use textrec_core::traits::VectorIndex;
use textrec_core::types::Metric;
use textrec_reduce::TruncatedSvd;
use textrec_text::TfidfVectorizer;
use textrec_vector::AnnoyIndex;
use tracing::{info, warn};

pub const VECTORIZER_FILE: &str = "tfidf.bin";
pub const REDUCER_FILE: &str = "svd.bin";
pub const INDEX_FILE: &str = "content_index.ann";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub checksum: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub build_id: String,
    pub created_at: DateTime<Utc>,
    pub metric: Metric,
    pub dims: usize,
    pub requested_dims: usize,
    pub vocabulary_size: usize,
    pub n_items: usize,
    pub n_trees: usize,
    pub corpus_fingerprint: String,
    /// File name -> checksum, filled in when the set is written.
    #[serde(default)]
    pub files: BTreeMap<String, ArtifactFile>,
}

impl Manifest {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::artifact(format!("cannot read {}: {e}", path.display())))?;
        let manifest: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::artifact(format!("invalid manifest {}: {e}", path.display())))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::artifact(format!(
                "{}: unsupported format version {} (expected {FORMAT_VERSION})",
                path.display(),
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::artifact(format!("cannot encode manifest: {e}")))?;
        fs::write(&path, json).map_err(|e| Error::artifact(format!("cannot write {}: {e}", path.display())))
    }

    fn expect_file(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        let entry = self
            .files
            .get(name)
            .ok_or_else(|| Error::artifact(format!("manifest does not list {name}")))?;
        let actual = file_checksum(&path)?;
        if actual != entry.checksum {
            return Err(Error::artifact(format!("{}: checksum mismatch", path.display())));
        }
        Ok(path)
    }
}

/// Vectorizer, reducer and index from one build, plus their manifest.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub manifest: Manifest,
    pub vectorizer: TfidfVectorizer,
    pub reducer: TruncatedSvd,
    pub index: AnnoyIndex,
}

impl ArtifactSet {
    pub fn build_id(&self) -> &str { &self.manifest.build_id }

    /// Publish the set into `dir`, replacing the set that was there.
    ///
    /// Files are written into a sibling staging directory which is renamed
    /// into place only once every file is complete; on error the staging
    /// directory is removed and `dir` is left as it was. The whole directory
    /// is swapped, so an existing `dir` holding anything besides artifact set
    /// files is refused rather than replaced.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        check_replaceable(dir)?;
        let (parent, name) = split_dir(dir)?;
        fs::create_dir_all(&parent)
            .map_err(|e| Error::artifact(format!("cannot create {}: {e}", parent.display())))?;
        let staging = parent.join(format!(".{name}.staging-{}", self.manifest.build_id));
        if staging.exists() {
            remove_dir(&staging);
        }
        fs::create_dir(&staging).map_err(|e| Error::artifact(format!("cannot create {}: {e}", staging.display())))?;

        if let Err(e) = self.write_files(&staging) {
            remove_dir(&staging);
            return Err(e);
        }

        let previous = parent.join(format!(".{name}.previous-{}", self.manifest.build_id));
        let had_previous = dir.exists();
        if had_previous {
            if let Err(e) = fs::rename(dir, &previous) {
                remove_dir(&staging);
                return Err(Error::artifact(format!("cannot move aside {}: {e}", dir.display())));
            }
        }
        if let Err(e) = fs::rename(&staging, dir) {
            if had_previous {
                restore_previous(&previous, dir);
            }
            remove_dir(&staging);
            return Err(Error::artifact(format!("cannot publish {}: {e}", dir.display())));
        }
        if had_previous {
            remove_dir(&previous);
        }

        info!(dir = %dir.display(), build_id = %self.manifest.build_id, "Published artifact set");
        Ok(())
    }

    fn write_files(&mut self, dir: &Path) -> Result<()> {
        let build_id = self.manifest.build_id.clone();
        let mut files = BTreeMap::new();

        let path = dir.join(VECTORIZER_FILE);
        let bytes = write_artifact(&path, ArtifactKind::Vectorizer, &build_id, &self.vectorizer)?;
        files.insert(VECTORIZER_FILE.to_string(), ArtifactFile { checksum: file_checksum(&path)?, bytes });

        let path = dir.join(REDUCER_FILE);
        let bytes = write_artifact(&path, ArtifactKind::Reducer, &build_id, &self.reducer)?;
        files.insert(REDUCER_FILE.to_string(), ArtifactFile { checksum: file_checksum(&path)?, bytes });

        let path = dir.join(INDEX_FILE);
        let bytes = self.index.save(&path, &build_id)?;
        files.insert(INDEX_FILE.to_string(), ArtifactFile { checksum: file_checksum(&path)?, bytes });

        self.manifest.files = files;
        self.manifest.write(dir)
    }

    /// Load and cross-check a published set.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest = Manifest::read(dir)?;

        let path = manifest.expect_file(dir, VECTORIZER_FILE)?;
        let (vectorizer_build, vectorizer): (String, TfidfVectorizer) = read_artifact(&path, ArtifactKind::Vectorizer)?;
        let path = manifest.expect_file(dir, REDUCER_FILE)?;
        let (reducer_build, reducer): (String, TruncatedSvd) = read_artifact(&path, ArtifactKind::Reducer)?;
        let path = manifest.expect_file(dir, INDEX_FILE)?;
        let (index_build, index) = AnnoyIndex::load(&path, manifest.dims, manifest.metric)?;

        for (name, id) in [(VECTORIZER_FILE, &vectorizer_build), (REDUCER_FILE, &reducer_build), (INDEX_FILE, &index_build)] {
            if *id != manifest.build_id {
                return Err(Error::artifact(format!(
                    "{name} belongs to build {id}, manifest is for build {}",
                    manifest.build_id
                )));
            }
        }

        let set = Self { manifest, vectorizer, reducer, index };
        set.check_consistency()?;
        info!(dir = %dir.display(), build_id = %set.manifest.build_id, items = set.index.len(), "Loaded artifact set");
        Ok(set)
    }

    /// Shape agreement between the manifest and the three artifacts.
    pub fn check_consistency(&self) -> Result<()> {
        let m = &self.manifest;
        if self.vectorizer.vocabulary_size() != m.vocabulary_size
            || self.reducer.n_features() != self.vectorizer.vocabulary_size()
        {
            return Err(Error::artifact(format!(
                "vocabulary mismatch: manifest {}, vectorizer {}, reducer input {}",
                m.vocabulary_size,
                self.vectorizer.vocabulary_size(),
                self.reducer.n_features()
            )));
        }
        if self.reducer.n_components() != m.dims || self.index.dim() != m.dims {
            return Err(Error::artifact(format!(
                "dimensionality mismatch: manifest {}, reducer {}, index {}",
                m.dims,
                self.reducer.n_components(),
                self.index.dim()
            )));
        }
        if self.index.metric() != m.metric {
            return Err(Error::artifact(format!("metric mismatch: manifest {}, index {}", m.metric, self.index.metric())));
        }
        if self.index.len() != m.n_items {
            return Err(Error::artifact(format!("index holds {} items, manifest lists {}", self.index.len(), m.n_items)));
        }
        Ok(())
    }

    /// The set must have been built from exactly this corpus snapshot.
    pub fn check_corpus(&self, corpus: &Corpus) -> Result<()> {
        if corpus.len() != self.manifest.n_items {
            return Err(Error::artifact(format!(
                "corpus has {} records but the index was built over {}",
                corpus.len(),
                self.manifest.n_items
            )));
        }
        if corpus.fingerprint() != self.manifest.corpus_fingerprint {
            return Err(Error::artifact("corpus content differs from the one the artifacts were built from"));
        }
        Ok(())
    }
}

fn split_dir(dir: &Path) -> Result<(PathBuf, String)> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::config(format!("invalid models directory: {}", dir.display())))?
        .to_string();
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

/// `dir` may be replaced only when it is absent or holds nothing but set files.
fn check_replaceable(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::artifact(format!("cannot read {}: {e}", dir.display()))),
    };
    let foreign: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| ![VECTORIZER_FILE, REDUCER_FILE, INDEX_FILE, MANIFEST_FILE].contains(&name.as_str()))
        .collect();
    if foreign.is_empty() {
        Ok(())
    } else {
        Err(Error::artifact(format!(
            "refusing to replace {}: it holds files that are not part of an artifact set ({})",
            dir.display(),
            foreign.join(", ")
        )))
    }
}

/// Put the moved-aside set back after a failed publish.
fn restore_previous(previous: &Path, dir: &Path) -> bool {
    match fs::rename(previous, dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                previous = %previous.display(),
                dir = %dir.display(),
                error = %e,
                "Failed to restore the previous artifact set; it is left in place"
            );
            false
        }
    }
}

fn remove_dir(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn only_set_files_may_be_replaced() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("models");
        check_replaceable(&dir).unwrap();
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "{}").unwrap();
        fs::write(dir.join(INDEX_FILE), "").unwrap();
        check_replaceable(&dir).unwrap();
        fs::write(dir.join("notes.txt"), "keep me").unwrap();
        let err = check_replaceable(&dir).unwrap_err();
        assert!(err.to_string().contains("notes.txt"), "{err}");
    }

    #[test]
    fn failed_restore_is_reported() {
        let tmp = TempDir::new().unwrap();
        let previous = tmp.path().join(".models.previous-x");
        let dir = tmp.path().join("models");
        assert!(!restore_previous(&previous, &dir));
        fs::create_dir(&previous).unwrap();
        fs::write(previous.join(MANIFEST_FILE), "{}").unwrap();
        assert!(restore_previous(&previous, &dir));
        assert!(dir.join(MANIFEST_FILE).is_file());
    }
}
