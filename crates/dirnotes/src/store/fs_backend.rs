use super::backend::{parse_index, StorageBackend};
use super::AnnotationIndex;
use crate::error::{DirnotesError, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// JSON file backend. One file holds the whole mapping.
pub struct FsBackend {
    data_file: PathBuf,
}

impl FsBackend {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }

    /// Backend for `file_name` inside `data_dir`.
    pub fn in_dir(data_dir: &Path, file_name: &str) -> Self {
        Self::new(data_dir.join(file_name))
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn data_dir(&self) -> PathBuf {
        self.data_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn file_name(&self) -> String {
        self.data_file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("annotations.json")
            .to_string()
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(DirnotesError::Io)?;
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn load_index(&self) -> Result<Option<AnnotationIndex>> {
        if !self.data_file.exists() {
            return Ok(None);
        }
        let source = self.data_file.display().to_string();
        let bytes = fs::read(&self.data_file).map_err(DirnotesError::Io)?;
        let content = String::from_utf8(bytes)
            .map_err(|e| DirnotesError::PersistenceCorrupt(format!("{}: {}", source, e)))?;
        parse_index(&content, &source)
    }

    fn save_index(&self, index: &AnnotationIndex) -> Result<()> {
        let root = self.data_dir();
        self.ensure_dir(&root)?;

        let content = serde_json::to_string_pretty(index).map_err(DirnotesError::Serialization)?;

        // Atomic write
        let tmp_file = root.join(format!(".{}-{}.tmp", self.file_name(), Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(DirnotesError::Io)?;
        fs::rename(&tmp_file, &self.data_file).map_err(DirnotesError::Io)?;

        Ok(())
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.data_file.exists() {
            return Ok(None);
        }
        let target = self.data_dir().join(format!(
            "{}.corrupt-{}",
            self.file_name(),
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        fs::rename(&self.data_file, &target).map_err(DirnotesError::Io)?;
        Ok(Some(target))
    }

    fn location(&self) -> PathBuf {
        self.data_file.clone()
    }
}
