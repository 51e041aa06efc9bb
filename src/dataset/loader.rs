//! CSV dataset loading.
//!
//! Parses uploaded CSV files into [`Dataset`]s and caches them by content
//! fingerprint, so loading the same bytes twice yields the same table.

use super::Dataset;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to turn an uploaded file into a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file} has no header row")]
    NoColumns { file: String },

    #[error("{file} contains no data rows")]
    Empty { file: String },

    #[error("{file} line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        file: String,
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Number of parsed datasets kept by a loader.
pub const MAX_CACHED: usize = 4;

/// Loads CSV files and caches parsed datasets by content fingerprint.
///
/// At most [`MAX_CACHED`] datasets are kept; the least recently loaded one
/// is dropped first.
#[derive(Debug, Default)]
pub struct DatasetLoader {
    cache: HashMap<u64, Arc<Dataset>>,
    /// Fingerprints, least recently loaded first.
    order: VecDeque<u64>,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a CSV file from disk.
    pub fn load_path(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.load_bytes(&name, &bytes)
    }

    /// Parse CSV content, returning the cached dataset when the bytes were seen before.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<Arc<Dataset>, LoadError> {
        let fingerprint = fingerprint(bytes);

        if let Some(cached) = self.cache.get(&fingerprint) {
            debug!("Dataset cache hit for {} ({:016x})", name, fingerprint);
            let cached = Arc::clone(cached);
            self.touch(fingerprint);
            return Ok(cached);
        }

        let dataset = Arc::new(parse_csv(name, fingerprint, bytes)?);
        info!(
            "Loaded {}: {} rows x {} columns",
            name,
            dataset.row_count(),
            dataset.column_count()
        );

        self.cache.insert(fingerprint, Arc::clone(&dataset));
        self.touch(fingerprint);
        while self.order.len() > MAX_CACHED {
            if let Some(evicted) = self.order.pop_front() {
                debug!("Evicting cached dataset {:016x}", evicted);
                self.cache.remove(&evicted);
            }
        }
        Ok(dataset)
    }

    fn touch(&mut self, fingerprint: u64) {
        self.order.retain(|f| *f != fingerprint);
        self.order.push_back(fingerprint);
    }

    /// Number of distinct files held in the cache.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Content fingerprint used as the file identity.
fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn parse_csv(name: &str, fingerprint: u64, bytes: &[u8]) -> Result<Dataset, LoadError> {
    let parse_err = |source: csv::Error| LoadError::Parse {
        file: name.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::NoColumns {
            file: name.to_string(),
        });
    }

    let expected = headers.len();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(parse_err)?;

        if record.len() > expected {
            return Err(LoadError::RaggedRow {
                file: name.to_string(),
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected,
                found: record.len(),
            });
        }

        let mut row: Vec<String> = record.iter().map(String::from).collect();
        // Missing trailing cells become empty values
        row.resize(expected, String::new());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LoadError::Empty {
            file: name.to_string(),
        });
    }

    Ok(Dataset::new(name.to_string(), fingerprint, headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = include_str!("../../fixtures/posts_sample.csv");

    #[test]
    fn test_load_sample_fixture() {
        let mut loader = DatasetLoader::new();
        let dataset = loader.load_bytes("posts_sample.csv", SAMPLE.as_bytes()).unwrap();

        assert_eq!(dataset.row_count(), 12);
        assert!(dataset.columns().contains(&"impressions".to_string()));
        assert!(dataset.columns().contains(&"post_type".to_string()));
    }

    #[test]
    fn test_empty_rows_rejected() {
        let mut loader = DatasetLoader::new();
        let err = loader
            .load_bytes("empty.csv", include_bytes!("../../fixtures/header_only.csv"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
        assert_eq!(loader.cached(), 0);
    }

    #[test]
    fn test_blank_file_has_no_columns() {
        let mut loader = DatasetLoader::new();
        let err = loader.load_bytes("blank.csv", b"").unwrap_err();
        assert!(matches!(err, LoadError::NoColumns { .. }));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut loader = DatasetLoader::new();
        let dataset = loader
            .load_bytes("short.csv", b"a,b,c\n1,2\n4,5,6\n")
            .unwrap();
        let preview = dataset.preview(2);
        assert_eq!(preview.rows[0], vec!["1", "2", ""]);
    }

    #[test]
    fn test_long_row_rejected() {
        let mut loader = DatasetLoader::new();
        let err = loader
            .load_bytes("long.csv", b"a,b\n1,2\n1,2,3\n")
            .unwrap_err();
        match err {
            LoadError::RaggedRow {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_bytes_hit_cache() {
        let mut loader = DatasetLoader::new();
        let first = loader.load_bytes("a.csv", SAMPLE.as_bytes()).unwrap();
        let second = loader.load_bytes("b.csv", SAMPLE.as_bytes()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.preview(5), second.preview(5));
        assert_eq!(loader.cached(), 1);
    }

    #[test]
    fn test_loading_is_deterministic_across_loaders() {
        let a = DatasetLoader::new()
            .load_bytes("posts.csv", SAMPLE.as_bytes())
            .unwrap();
        let b = DatasetLoader::new()
            .load_bytes("posts.csv", SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(a.row_count(), b.row_count());
        assert_eq!(a.column_count(), b.column_count());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_bom_and_blank_lines() {
        let mut loader = DatasetLoader::new();
        let dataset = loader
            .load_bytes("bom.csv", b"\xEF\xBB\xBFpost_type,reach\n\nReel,1200\n\n")
            .unwrap();

        assert_eq!(dataset.columns(), ["post_type", "reach"]);
        assert_eq!(dataset.row_count(), 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let mut loader = DatasetLoader::new();
        let first = loader.load_bytes("0.csv", b"a\n0\n").unwrap();
        for i in 1..=MAX_CACHED {
            let content = format!("a\n{}\n", i);
            loader.load_bytes("n.csv", content.as_bytes()).unwrap();
        }

        assert_eq!(loader.cached(), MAX_CACHED);
        let reloaded = loader.load_bytes("0.csv", b"a\n0\n").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(loader.cached(), MAX_CACHED);
    }

    #[test]
    fn test_cache_hit_refreshes_entry() {
        let mut loader = DatasetLoader::new();
        let first = loader.load_bytes("0.csv", b"a\n0\n").unwrap();
        for i in 1..MAX_CACHED {
            let content = format!("a\n{}\n", i);
            loader.load_bytes("n.csv", content.as_bytes()).unwrap();
        }
        // Touch the oldest entry, then push one more
        loader.load_bytes("0.csv", b"a\n0\n").unwrap();
        loader.load_bytes("new.csv", b"a\nnew\n").unwrap();

        let again = loader.load_bytes("0.csv", b"a\n0\n").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_load_path_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"post_type,reach\nReel,1200\n").unwrap();

        let mut loader = DatasetLoader::new();
        let dataset = loader.load_path(file.path()).unwrap();
        assert_eq!(dataset.row_count(), 1);

        let err = loader
            .load_path(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
