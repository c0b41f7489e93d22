use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("No key label for {file_name} (looked for {path})")]
    Missing { file_name: String, path: PathBuf },
    #[error("IO error reading label for {file_name}: {source}")]
    Io {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ground-truth key label lookup by audio file identity.
pub trait LabelResolver {
    fn resolve(&self, file_name: &str) -> Result<String, LabelError>;
}

/// Reads the first line of `<key_dir>/<file stem>.key`.
#[derive(Debug, Clone)]
pub struct KeyFileResolver {
    pub key_dir: PathBuf,
}

impl KeyFileResolver {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }

    pub fn key_path(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        self.key_dir.join(format!("{}.key", stem))
    }
}

impl LabelResolver for KeyFileResolver {
    fn resolve(&self, file_name: &str) -> Result<String, LabelError> {
        let path = self.key_path(file_name);
        let missing = || LabelError::Missing {
            file_name: file_name.to_string(),
            path: path.clone(),
        };

        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(source) => {
                return Err(LabelError::Io {
                    file_name: file_name.to_string(),
                    source,
                });
            }
        };

        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .map_err(|source| LabelError::Io {
                file_name: file_name.to_string(),
                source,
            })?;

        let label = line.trim();
        if label.is_empty() {
            return Err(missing());
        }
        Ok(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path_uses_stem() {
        let r = KeyFileResolver::new("/data/key");
        assert_eq!(r.key_path("song 01.mp3"), PathBuf::from("/data/key/song 01.key"));
        assert_eq!(r.key_path("a.b.wav"), PathBuf::from("/data/key/a.b.key"));
    }

    #[test]
    fn test_reads_first_line_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.key"), "A minor\nsecond line\n").unwrap();
        let r = KeyFileResolver::new(dir.path());
        assert_eq!(r.resolve("clip.mp3").unwrap(), "A minor");
    }

    #[test]
    fn test_missing_label() {
        let dir = tempfile::tempdir().unwrap();
        let r = KeyFileResolver::new(dir.path());
        assert!(matches!(r.resolve("nope.mp3"), Err(LabelError::Missing { .. })));
    }

    #[test]
    fn test_empty_label_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.key"), "\n").unwrap();
        let r = KeyFileResolver::new(dir.path());
        assert!(matches!(r.resolve("blank.wav"), Err(LabelError::Missing { .. })));
    }
}
