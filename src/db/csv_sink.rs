use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::models::{self, DatasetStats, FeatureMode, FeatureRow, FILE_COLUMN};
use super::{DatasetSink, Result, SinkError};
use crate::analyzer::linear::LinearRange;

/// CSV dataset: one header line, then one line per processed file.
///
/// Every row ends with `key,file_name`, so both are read from the tail of
/// each record.
pub struct CsvSink {
    path: PathBuf,
    mode: FeatureMode,
    header: Vec<String>,
}

impl CsvSink {
    /// Open (without creating) a CSV dataset, checking any existing header.
    ///
    /// A trailing partial line left by an interrupted append is cut off
    /// before anything is read.
    pub fn open(path: &Path, mode: FeatureMode, range: &LinearRange) -> Result<Self> {
        let header = models::header(mode, range);
        let sink = Self {
            path: path.to_path_buf(),
            mode,
            header,
        };

        if sink.has_rows_or_header() {
            sink.truncate_torn_tail()?;
        }

        if let Some(existing) = sink.existing_header()? {
            if existing != sink.header {
                return Err(SinkError::SchemaMismatch(format!(
                    "{} has {} columns starting with {:?}, expected {} columns for {} features",
                    path.display(),
                    existing.len(),
                    existing.first().map(String::as_str).unwrap_or(""),
                    sink.header.len(),
                    mode.as_str(),
                )));
            }
        }
        Ok(sink)
    }

    fn has_rows_or_header(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    fn existing_header(&self) -> Result<Option<Vec<String>>> {
        if !self.has_rows_or_header() {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let header = reader.headers()?.iter().map(|s| s.to_string()).collect();
        Ok(Some(header))
    }

    /// Truncate the file back to its last newline. Returns the number of
    /// bytes dropped.
    fn truncate_torn_tail(&self) -> Result<u64> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let len = file.metadata()?.len();

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(0))?;
        let mut contents = Vec::with_capacity(len as usize);
        file.read_to_end(&mut contents)?;
        let keep = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i as u64 + 1)
            .unwrap_or(0);
        file.set_len(keep)?;
        file.sync_data()?;

        let dropped = len - keep;
        log::warn!(
            "{}: dropped {} bytes of a partially written row",
            self.path.display(),
            dropped
        );
        Ok(dropped)
    }

    /// Records with the expected field count. Anything else is logged and skipped.
    fn complete_records(&self, reader: &mut csv::Reader<std::fs::File>) -> Result<Vec<csv::StringRecord>> {
        let mut records = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != self.header.len() {
                log::warn!(
                    "{}: skipping record {} with {} fields (expected {})",
                    self.path.display(),
                    i + 1,
                    record.len(),
                    self.header.len()
                );
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    fn reader(&self) -> Result<Option<csv::Reader<std::fs::File>>> {
        if !self.has_rows_or_header() {
            return Ok(None);
        }
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        Ok(Some(reader))
    }
}

impl DatasetSink for CsvSink {
    fn processed_files(&self) -> Result<HashSet<String>> {
        let mut files = HashSet::new();
        let Some(mut reader) = self.reader()? else {
            return Ok(files);
        };
        if reader.headers()?.iter().last() != Some(FILE_COLUMN) {
            return Err(SinkError::SchemaMismatch(format!(
                "{} has no trailing {} column",
                self.path.display(),
                FILE_COLUMN
            )));
        }

        for record in self.complete_records(&mut reader)? {
            if let Some(name) = record.iter().last() {
                files.insert(name.to_string());
            }
        }
        Ok(files)
    }

    fn append(&mut self, row: &FeatureRow) -> Result<()> {
        let values = row.features.values();
        if row.features.mode() != self.mode || values.len() + 2 != self.header.len() {
            return Err(SinkError::SchemaMismatch(format!(
                "row for {} has {} {} values, dataset expects {} {} values",
                row.file_name,
                values.len(),
                row.features.mode().as_str(),
                self.header.len() - 2,
                self.mode.as_str(),
            )));
        }

        let is_new = !self.has_rows_or_header();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(&self.header)?;
        }

        let mut record: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        record.push(row.key_label.clone());
        record.push(row.file_name.clone());
        writer.write_record(&record)?;

        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    fn stats(&self) -> Result<DatasetStats> {
        let Some(mut reader) = self.reader()? else {
            return Ok(DatasetStats::default());
        };

        let mut labels = Vec::new();
        for record in self.complete_records(&mut reader)? {
            let n = record.len();
            if n >= 2 {
                labels.push(record[n - 2].to_string());
            }
        }
        Ok(DatasetStats {
            rows: labels.len(),
            labels: super::label_counts(labels),
        })
    }
}
