pub mod label;

use crate::SUPPORTED_EXTENSIONS;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Audio directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Which files of a corpus still need a dataset row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusPlan {
    /// Every supported audio file, in listing order.
    pub all: Vec<String>,
    /// `all` minus the files already in the dataset, same order.
    pub outstanding: Vec<String>,
}

impl CorpusPlan {
    pub fn already_processed(&self) -> usize {
        self.all.len() - self.outstanding.len()
    }
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// List supported audio files directly inside `dir` (not recursive).
/// The file name is the file's identity in the dataset.
pub fn list_audio_files(dir: &Path) -> Result<Vec<String>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::MissingDir(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => files.push(name.to_string()),
            None => log::warn!("Skipping non-UTF-8 file name: {}", entry.path().display()),
        }
    }
    Ok(files)
}

/// `all - processed`, preserving the order of `all`.
pub fn outstanding(all: &[String], processed: &HashSet<String>) -> Vec<String> {
    all.iter()
        .filter(|f| !processed.contains(f.as_str()))
        .cloned()
        .collect()
}

/// List `dir` and diff it against the processed set.
pub fn plan(dir: &Path, processed: &HashSet<String>) -> Result<CorpusPlan, ScanError> {
    let all = list_audio_files(dir)?;
    let outstanding = outstanding(&all, processed);
    log::info!(
        "{} audio files in {}, {} already in dataset, {} outstanding",
        all.len(),
        dir.display(),
        all.len() - outstanding.len(),
        outstanding.len()
    );
    Ok(CorpusPlan { all, outstanding })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_outstanding_preserves_order() {
        let all = names(&["c.mp3", "a.mp3", "b.mp3", "d.mp3"]);
        let processed: HashSet<String> = names(&["a.mp3", "d.mp3", "zzz.mp3"]).into_iter().collect();
        assert_eq!(outstanding(&all, &processed), names(&["c.mp3", "b.mp3"]));
    }

    #[test]
    fn test_outstanding_empty_processed() {
        let all = names(&["x.wav", "y.wav"]);
        assert_eq!(outstanding(&all, &HashSet::new()), all);
    }

    #[test]
    fn test_all_processed() {
        let all = names(&["x.wav"]);
        let processed: HashSet<String> = all.iter().cloned().collect();
        assert!(outstanding(&all, &processed).is_empty());
    }

    #[test]
    fn test_list_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mp3", "b.WAV", "notes.txt", "c.flac", "d.key"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        std::fs::write(dir.path().join("nested.mp3").join("e.mp3"), b"").unwrap();

        let mut files = list_audio_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files, names(&["a.mp3", "b.WAV", "c.flac"]));
    }

    #[test]
    fn test_missing_dir() {
        let err = list_audio_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ScanError::MissingDir(_)));
    }

    #[test]
    fn test_plan_counts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.wav", "b.wav", "c.wav"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let processed: HashSet<String> = names(&["b.wav"]).into_iter().collect();
        let plan = plan(dir.path(), &processed).unwrap();
        assert_eq!(plan.all.len(), 3);
        assert_eq!(plan.outstanding.len(), 2);
        assert_eq!(plan.already_processed(), 1);
        assert!(!plan.outstanding.contains(&"b.wav".to_string()));
    }
}
