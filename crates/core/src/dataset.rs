//! Tabular loader: CSV/TSV files into an in-memory table, plus the per-query file cache.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Rendered in place of absent cells wherever a value is shown to a reader.
pub const MISSING_VALUE: &str = "[value not available]";

/// Field spellings read as "missing", on top of the empty field.
const NA_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "<NA>", "#N/A",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{0} has no header row")]
    MissingHeader(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("{0} does not resolve inside the data directory")]
    OutsideRoot(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || NA_TOKENS.contains(&trimmed) {
            return CellValue::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }
        CellValue::Text(raw.to_string())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// The value as text, `None` when missing.
    pub fn text(&self) -> Option<String> {
        match self {
            CellValue::Missing => None,
            other => Some(other.to_string()),
        }
    }

    /// Field text for delimited row lines; missing cells become empty fields.
    pub fn csv_field(&self) -> String {
        self.text().unwrap_or_default()
    }

    /// Exact textual comparison. Missing never matches.
    pub fn text_eq(&self, other: &str) -> bool {
        self.text().is_some_and(|t| t == other)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => f.write_str(MISSING_VALUE),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One loaded file. Column set is fixed and row order is the canonical row index.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Builds a dataset, padding short rows with missing cells and cutting long ones.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, CellValue::Missing);
                r
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let name = file_name(path);
        let delimiter = match extension(path).as_str() {
            "csv" | "txt" => b',',
            "tsv" => b'\t',
            other => return Err(LoadError::UnsupportedFormat(other.to_string())),
        };
        let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(name, file, delimiter)
    }

    pub fn from_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        delimiter: u8,
    ) -> Result<Self, LoadError> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| LoadError::Csv {
                path: name.clone(),
                source,
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(LoadError::MissingHeader(name));
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| LoadError::Csv {
                path: name.clone(),
                source,
            })?;
            rows.push(record.iter().map(CellValue::parse).collect());
        }
        Ok(Self::new(name, headers, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All column names, comma-joined.
    pub fn header_line(&self) -> String {
        self.columns.join(",")
    }

    /// The row as a comma-delimited line; missing cells are empty fields.
    pub fn row_line(&self, row: usize) -> Option<String> {
        self.rows.get(row).map(|cells| {
            cells
                .iter()
                .map(CellValue::csv_field)
                .collect::<Vec<_>>()
                .join(",")
        })
    }

    /// `"col1: v1 | col2: v2 | ..."` in column order, `None` when out of bounds.
    pub fn format_row(&self, row: usize) -> Option<String> {
        self.rows.get(row).map(|cells| {
            self.columns
                .iter()
                .zip(cells)
                .map(|(col, cell)| format!("{}: {}", col, cell))
                .collect::<Vec<_>>()
                .join(" | ")
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn slash_joined(relative: &Path) -> Option<String> {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Name a file is indexed under: its `/`-separated path relative to `root` when it
/// lives inside it, else its bare file name.
pub fn source_name(path: &Path, root: Option<&Path>) -> String {
    let relative = root.and_then(|root| {
        path.strip_prefix(root)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| {
                let path = path.canonicalize().ok()?;
                let root = root.canonicalize().ok()?;
                path.strip_prefix(&root).ok().map(Path::to_path_buf)
            })
    });
    relative
        .as_deref()
        .and_then(slash_joined)
        .unwrap_or_else(|| file_name(path))
}

/// Where datasets are re-read from at query time, keyed by source file name.
pub trait DatasetSource: Send + Sync {
    fn load(&self, source_file: &str) -> Result<Dataset, LoadError>;
}

/// Files under one data directory, plus files whose ingestion path is known.
///
/// A known name loads from its recorded path. Any other name is resolved under the
/// root and must stay inside it.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    known: HashMap<String, PathBuf>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            known: HashMap::new(),
        }
    }

    pub fn insert(&mut self, source_file: impl Into<String>, path: impl Into<PathBuf>) {
        self.known.insert(source_file.into(), path.into());
    }

    fn resolve(&self, source_file: &str) -> Option<PathBuf> {
        if let Some(path) = self.known.get(source_file) {
            return Some(path.clone());
        }
        let relative = Path::new(source_file);
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.root.join(relative))
    }
}

impl DatasetSource for DirectorySource {
    fn load(&self, source_file: &str) -> Result<Dataset, LoadError> {
        let path = self
            .resolve(source_file)
            .ok_or_else(|| LoadError::OutsideRoot(source_file.to_string()))?;
        let mut dataset = Dataset::from_path(&path)?;
        dataset.name = source_file.to_string();
        Ok(dataset)
    }
}

/// Query-scoped cache: each file is loaded at most once per query.
///
/// A failed load is remembered as absent so it is not retried within the query.
pub struct DatasetCache<'a> {
    source: &'a dyn DatasetSource,
    entries: BTreeMap<String, Option<Arc<Dataset>>>,
}

impl<'a> DatasetCache<'a> {
    pub fn new(source: &'a dyn DatasetSource) -> Self {
        Self {
            source,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, source_file: &str) -> Option<Arc<Dataset>> {
        if let Some(entry) = self.entries.get(source_file) {
            return entry.clone();
        }
        let loaded = match self.source.load(source_file) {
            Ok(ds) => Some(Arc::new(ds)),
            Err(e) => {
                warn!(file = source_file, error = %e, "dataset unavailable");
                None
            }
        };
        self.entries.insert(source_file.to_string(), loaded.clone());
        loaded
    }

    /// Already-loaded datasets, ordered by file name.
    pub fn loaded(&self) -> impl Iterator<Item = (&str, &Arc<Dataset>)> {
        self.entries
            .iter()
            .filter_map(|(name, ds)| ds.as_ref().map(|d| (name.as_str(), d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn payroll() -> Dataset {
        Dataset::from_reader(
            "payroll.csv",
            "id,name,bonus,note\n1,Ana,100,\n2,Bruno,NaN,late\n3,Carla,1.5\n".as_bytes(),
            b',',
        )
        .unwrap()
    }

    #[test]
    fn parses_scalars_and_missing() {
        let ds = payroll();
        assert_eq!(ds.columns, vec!["id", "name", "bonus", "note"]);
        assert_eq!(ds.value(0, "bonus"), Some(&CellValue::Int(100)));
        assert_eq!(ds.value(0, "note"), Some(&CellValue::Missing));
        assert_eq!(ds.value(1, "bonus"), Some(&CellValue::Missing));
        assert_eq!(ds.value(2, "bonus"), Some(&CellValue::Float(1.5)));
        // Short row padded.
        assert_eq!(ds.value(2, "note"), Some(&CellValue::Missing));
    }

    #[test]
    fn format_row_uses_sentinel_for_missing() {
        let ds = payroll();
        assert_eq!(
            ds.format_row(0).unwrap(),
            format!("id: 1 | name: Ana | bonus: 100 | note: {}", MISSING_VALUE)
        );
        assert_eq!(ds.row_line(0).unwrap(), "1,Ana,100,");
        assert!(ds.format_row(9).is_none());
    }

    #[test]
    fn empty_text_and_missing_are_distinct() {
        assert!(CellValue::parse("").is_missing());
        assert!(!CellValue::Text(String::new()).is_missing());
        assert_ne!(CellValue::Missing.to_string(), "");
    }

    #[test]
    fn directory_source_loads_tsv_and_rejects_unknown() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.tsv"), "id\tcity\n1\tRecife\n").unwrap();
        fs::write(temp.path().join("a.bin"), "x").unwrap();
        let source = DirectorySource::new(temp.path());
        let ds = source.load("a.tsv").unwrap();
        assert_eq!(ds.value(0, "city"), Some(&CellValue::Text("Recife".into())));
        assert!(matches!(
            source.load("a.bin"),
            Err(LoadError::UnsupportedFormat(_))
        ));
        assert!(matches!(source.load("missing.csv"), Err(LoadError::Io { .. })));
        assert!(matches!(
            source.load("../a.tsv"),
            Err(LoadError::OutsideRoot(_))
        ));
    }

    #[test]
    fn nested_and_recorded_files_reload_under_their_source_name() {
        let temp = tempfile::tempdir().unwrap();
        let data = temp.path().join("data");
        fs::create_dir_all(data.join("hr")).unwrap();
        fs::create_dir_all(temp.path().join("elsewhere")).unwrap();
        fs::write(data.join("hr").join("payroll.csv"), "id,name\n1,Ana\n").unwrap();
        let outside = temp.path().join("elsewhere").join("payroll.csv");
        fs::write(&outside, "id,name\n1,Bruno\n2,Carla\n").unwrap();

        let nested = data.join("hr").join("payroll.csv");
        assert_eq!(source_name(&nested, Some(&data)), "hr/payroll.csv");
        assert_eq!(source_name(&outside, Some(&data)), "payroll.csv");
        assert_eq!(source_name(&outside, None), "payroll.csv");

        let mut source = DirectorySource::new(&data);
        let ds = source.load("hr/payroll.csv").unwrap();
        assert_eq!(ds.name, "hr/payroll.csv");
        assert_eq!(ds.len(), 1);

        // Without a recorded path the outside file cannot be found.
        assert!(source.load("payroll.csv").is_err());
        source.insert("payroll.csv", &outside);
        let ds = source.load("payroll.csv").unwrap();
        assert_eq!(ds.name, "payroll.csv");
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn cache_remembers_failures() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("ok.csv"), "id,v\n1,x\n").unwrap();
        let source = DirectorySource::new(temp.path());
        let mut cache = DatasetCache::new(&source);
        assert!(cache.get("ok.csv").is_some());
        assert!(cache.get("gone.csv").is_none());
        let names: Vec<&str> = cache.loaded().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ok.csv"]);
    }
}
