pub mod csv_sink;
pub mod models;
pub mod sqlite;

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::analyzer::linear::LinearRange;
use models::{DatasetStats, FeatureMode, FeatureRow};

pub use csv_sink::CsvSink;
pub use sqlite::SqliteSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dataset schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Append-only store of feature rows.
///
/// Each `append` is durable on return. A row torn by an interrupted append
/// is discarded when the sink is next opened.
pub trait DatasetSink {
    /// File identities that already have a row.
    fn processed_files(&self) -> Result<HashSet<String>>;

    fn append(&mut self, row: &FeatureRow) -> Result<()>;

    fn stats(&self) -> Result<DatasetStats>;
}

/// Open the sink matching the dataset's extension: `.db`/`.sqlite` go to
/// SQLite, anything else is CSV.
pub fn open_sink(path: &Path, mode: FeatureMode, range: &LinearRange) -> Result<Box<dyn DatasetSink>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => {
            log::debug!("Using SQLite dataset at {}", path.display());
            Ok(Box::new(SqliteSink::open(path, mode)?))
        }
        _ => {
            log::debug!("Using CSV dataset at {}", path.display());
            Ok(Box::new(CsvSink::open(path, mode, range)?))
        }
    }
}

/// Like `open_sink`, but returns `None` instead of creating a dataset that
/// doesn't exist yet.
pub fn open_existing(
    path: &Path,
    mode: FeatureMode,
    range: &LinearRange,
) -> Result<Option<Box<dyn DatasetSink>>> {
    if !path.exists() {
        return Ok(None);
    }
    open_sink(path, mode, range).map(Some)
}

/// Tally rows per label, most frequent first.
pub(crate) fn label_counts<I: IntoIterator<Item = String>>(labels: I) -> Vec<(String, usize)> {
    let mut counts = std::collections::HashMap::new();
    for l in labels {
        *counts.entry(l).or_insert(0usize) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
