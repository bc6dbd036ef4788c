use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes pretty-printed JSON snapshots into an output directory.
///
/// Snapshots are for debugging only; a failed write is logged and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct ArtifactWriter {
    dir: Option<PathBuf>,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A writer that drops everything
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn from_option(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// A writer for `<dir>/<name>`; stays disabled if this one is
    pub fn subdir(&self, name: &str) -> Self {
        Self {
            dir: self.dir.as_ref().map(|dir| dir.join(name)),
        }
    }

    /// Serializes `value` to `<dir>/<name>`. Returns the path when written.
    pub fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(name);
        let written = fs::create_dir_all(dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(value).map_err(|e| e.to_string()))
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));

        match written {
            Ok(()) => {
                ::log::debug!("Wrote {}", path.display());
                Some(path)
            }
            Err(e) => {
                ::log::warn!("Failed to write {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("output"));
        let path = writer.write("seo_keywords.json", &json!(["crm"])).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, json!(["crm"]));
    }

    #[test]
    fn test_disabled_writer() {
        assert!(ArtifactWriter::disabled().write("x.json", &1).is_none());
        assert!(ArtifactWriter::disabled().subdir("acme.com").dir().is_none());
    }

    #[test]
    fn test_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).subdir("acme.com");
        let path = writer.write("prompt.json", &json!({})).unwrap();
        assert_eq!(path, dir.path().join("acme.com").join("prompt.json"));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let writer = ArtifactWriter::new(&blocker);
        assert!(writer.write("x.json", &1).is_none());
    }
}
