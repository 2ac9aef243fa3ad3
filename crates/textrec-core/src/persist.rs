//! Versioned artifact files.
//!
//! Every model artifact is written as a bincode envelope
//! `{format_version, kind, build_id, payload}` followed by an 8-byte footer
//! `[magic "TRA1"][CRC32 BE]`. Writes go to a temp file that is renamed into
//! place, so a reader never sees a half-written artifact.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const FORMAT_VERSION: u32 = 1;
const FOOTER_MAGIC: &[u8; 4] = b"TRA1";

/// What an artifact file contains. Checked on read so that, e.g., a reducer
/// file cannot be opened as an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Vectorizer,
    Reducer,
    Index,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: ArtifactKind,
    build_id: String,
    payload: T,
}

/// Serialize `payload` into `path`, tagged with `kind` and `build_id`.
/// Returns the number of bytes written.
pub fn write_artifact<T: Serialize>(path: &Path, kind: ArtifactKind, build_id: &str, payload: &T) -> Result<u64> {
    let envelope = Envelope { format_version: FORMAT_VERSION, kind, build_id: build_id.to_string(), payload };
    let bytes = bincode::serialize(&envelope)
        .map_err(|e| Error::artifact(format!("cannot serialize {kind:?}: {e}")))?;
    let crc = crc32fast::hash(&bytes);

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(FOOTER_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &output)
        .and_then(|()| fs::rename(&tmp_path, path))
        .map_err(|e| Error::artifact(format!("cannot write {}: {e}", path.display())))?;

    tracing::debug!(?kind, path = %path.display(), bytes = output.len(), crc = %format!("{crc:#010x}"), "wrote artifact");
    Ok(output.len() as u64)
}

/// Read an artifact written by [`write_artifact`], verifying footer, CRC,
/// format version and kind. Returns `(build_id, payload)`.
pub fn read_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<(String, T)> {
    let raw = fs::read(path).map_err(|e| Error::artifact(format!("cannot read {}: {e}", path.display())))?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != FOOTER_MAGIC {
        return Err(Error::artifact(format!("{} is not a textrec artifact", path.display())));
    }
    let payload = &raw[..raw.len() - 8];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&raw[raw.len() - 4..]);
    let stored = u32::from_be_bytes(crc_bytes);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(Error::artifact(format!(
            "{}: CRC32 mismatch (stored {stored:#010x}, computed {computed:#010x})",
            path.display()
        )));
    }

    let envelope: Envelope<T> = bincode::deserialize(payload)
        .map_err(|e| Error::artifact(format!("cannot decode {}: {e}", path.display())))?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(Error::artifact(format!(
            "{}: unsupported format version {} (expected {FORMAT_VERSION})",
            path.display(),
            envelope.format_version
        )));
    }
    if envelope.kind != kind {
        return Err(Error::artifact(format!("{}: expected {kind:?} artifact, found {:?}", path.display(), envelope.kind)));
    }
    Ok((envelope.build_id, envelope.payload))
}

/// Hex blake3 digest of a file's bytes.
pub fn file_checksum(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::artifact(format!("cannot read {}: {e}", path.display())))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload { dims: usize, weights: Vec<f32> }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("svd.bin");
        let p = Payload { dims: 2, weights: vec![0.5, -1.0] };
        write_artifact(&path, ArtifactKind::Reducer, "b1", &p).unwrap();
        let (build_id, back): (String, Payload) = read_artifact(&path, ArtifactKind::Reducer).unwrap();
        assert_eq!(build_id, "b1");
        assert_eq!(back, p);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn wrong_kind_and_corruption_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("svd.bin");
        write_artifact(&path, ArtifactKind::Reducer, "b1", &Payload { dims: 1, weights: vec![1.0] }).unwrap();
        assert!(matches!(read_artifact::<Payload>(&path, ArtifactKind::Index), Err(Error::Artifact(_))));

        let mut raw = fs::read(&path).unwrap();
        raw[0] ^= 0xff;
        fs::write(&path, raw).unwrap();
        let err = read_artifact::<Payload>(&path, ArtifactKind::Reducer).unwrap_err();
        assert!(err.to_string().contains("CRC32"), "{err}");
    }

    #[test]
    fn missing_file_is_artifact_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(read_artifact::<Payload>(&tmp.path().join("nope.bin"), ArtifactKind::Index), Err(Error::Artifact(_))));
    }
}
