use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::path::Path;

use super::models::{DatasetStats, FeatureMode, FeatureRow};
use super::{DatasetSink, Result, SinkError};

/// SQLite dataset. Features are stored as a JSON array per row; one table
/// can hold both feature modes side by side.
pub struct SqliteSink {
    pub conn: Connection,
    mode: FeatureMode,
}

impl SqliteSink {
    pub fn open(path: &Path, mode: FeatureMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn, mode };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory(mode: FeatureMode) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn, mode };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        // Each append must be on disk before the next file starts
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > 1 {
            return Err(SinkError::Migration(format!(
                "dataset schema version {} is newer than supported (1)",
                version
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    /// V1: feature rows keyed by (file_name, mode)
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS feature_rows (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name   TEXT NOT NULL,
                mode        TEXT NOT NULL,
                key_label   TEXT NOT NULL,
                features    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (file_name, mode)
            );

            CREATE INDEX IF NOT EXISTS idx_feature_rows_mode ON feature_rows(mode);
            ",
        )?;
        Ok(())
    }

    /// Stored feature values for a file, if present.
    pub fn features_for(&self, file_name: &str) -> Result<Option<Vec<f64>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT features FROM feature_rows WHERE file_name = ?1 AND mode = ?2")?;
        let mut rows = stmt.query(params![file_name, self.mode.as_str()])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }
}

impl DatasetSink for SqliteSink {
    fn processed_files(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_name FROM feature_rows WHERE mode = ?1")?;
        let names = stmt
            .query_map(params![self.mode.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    fn append(&mut self, row: &FeatureRow) -> Result<()> {
        if row.features.mode() != self.mode {
            return Err(SinkError::SchemaMismatch(format!(
                "row for {} holds {} features, dataset is {}",
                row.file_name,
                row.features.mode().as_str(),
                self.mode.as_str()
            )));
        }
        let json = serde_json::to_string(row.features.values())?;
        self.conn.execute(
            "INSERT INTO feature_rows (file_name, mode, key_label, features)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.file_name, self.mode.as_str(), row.key_label, json],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<DatasetStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT key_label FROM feature_rows WHERE mode = ?1")?;
        let labels = stmt
            .query_map(params![self.mode.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(DatasetStats {
            rows: labels.len(),
            labels: super::label_counts(labels),
        })
    }
}
