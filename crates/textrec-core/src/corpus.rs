//! Corpus loading.
//!
//! A corpus is a table with at least a `text` column. Rows become
//! [`CorpusRecord`]s whose ordinals follow file order; every other column is
//! kept as opaque metadata.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{CorpusRecord, Meta, Ordinal};

pub const DEFAULT_TEXT_COLUMN: &str = "text";

/// An immutable, ordinal-addressed snapshot of the input records.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<CorpusRecord>,
}

impl Corpus {
    /// Build a corpus from bare texts (no metadata).
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| CorpusRecord { ordinal, text: text.into(), metadata: Meta::new() })
            .collect();
        Self { records }
    }

    /// Build a corpus from (text, metadata) pairs, assigning ordinals in order.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, Meta)>,
    {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(ordinal, (text, metadata))| CorpusRecord { ordinal, text, metadata })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn get(&self, ordinal: Ordinal) -> Option<&CorpusRecord> { self.records.get(ordinal) }
    pub fn records(&self) -> &[CorpusRecord] { &self.records }
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ { self.records.iter().map(|r| r.text.as_str()) }

    /// Hex blake3 digest over the raw texts in ordinal order.
    ///
    /// Two corpora with the same fingerprint produce the same ordinals, which
    /// is what the artifact bundle checks at load time.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for text in self.texts() {
            hasher.update(text.as_bytes());
            hasher.update(&[0u8]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// CSV corpus reader.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    text_column: String,
}

impl Default for CorpusLoader {
    fn default() -> Self { Self { text_column: DEFAULT_TEXT_COLUMN.to_string() } }
}

impl CorpusLoader {
    pub fn new() -> Self { Self::default() }

    pub fn with_text_column(mut self, column: impl Into<String>) -> Self {
        self.text_column = column.into();
        self
    }

    pub fn load(&self, path: &Path) -> Result<Corpus> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::data(format!("cannot open corpus {}: {e}", path.display())))?;
        let corpus = self.load_reader(file).map_err(|e| match e {
            Error::Data(msg) => Error::data(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        tracing::info!(records = corpus.len(), path = %path.display(), "loaded corpus");
        Ok(corpus)
    }

    pub fn load_reader<R: std::io::Read>(&self, reader: R) -> Result<Corpus> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers().map_err(|e| Error::data(format!("cannot read header row: {e}")))?.clone();
        let text_idx = headers
            .iter()
            .position(|h| h.trim() == self.text_column)
            .ok_or_else(|| Error::data(format!("missing required column '{}'", self.text_column)))?;

        let mut rows = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| Error::data(format!("malformed row {}: {e}", row + 1)))?;
            let text = record.get(text_idx).unwrap_or_default().to_string();
            let metadata: Meta = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(i, _)| *i != text_idx)
                .map(|(_, (k, v))| (k.trim().to_string(), v.to_string()))
                .collect();
            rows.push((text, metadata));
        }
        Ok(Corpus::from_rows(rows))
    }
}

/// Load a CSV corpus using the default `text` column.
pub fn load_corpus(path: &Path) -> Result<Corpus> { CorpusLoader::new().load(path) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_on_order_and_boundaries() {
        let a = Corpus::from_texts(["ab", "c"]);
        let b = Corpus::from_texts(["a", "bc"]);
        let c = Corpus::from_texts(["c", "ab"]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint(), Corpus::from_texts(["ab", "c"]).fingerprint());
    }

    #[test]
    fn reader_keeps_metadata_and_ordinals() {
        let csv = "id,text,author\n7,hello world,ann\n8,\"quoted, text\",bob\n";
        let corpus = CorpusLoader::new().load_reader(csv.as_bytes()).unwrap();
        assert_eq!(corpus.len(), 2);
        let second = corpus.get(1).unwrap();
        assert_eq!(second.ordinal, 1);
        assert_eq!(second.text, "quoted, text");
        assert_eq!(second.metadata.get("id").map(String::as_str), Some("8"));
        assert_eq!(second.metadata.get("author").map(String::as_str), Some("bob"));
        assert!(!second.metadata.contains_key("text"));
    }

    #[test]
    fn missing_text_column_is_data_error() {
        let err = CorpusLoader::new().load_reader("id,body\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
