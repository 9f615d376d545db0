use super::AnnotationIndex;
use crate::error::{DirnotesError, Result};
use std::path::PathBuf;

/// Abstract interface for raw storage I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while AnnotationStore handles the "what" (replace semantics, batching, recovery).
pub trait StorageBackend {
    /// Load the persisted mapping.
    /// Returns Ok(None) when nothing has been persisted yet (or the data is blank).
    /// Returns `DirnotesError::PersistenceCorrupt` when the data cannot be parsed.
    fn load_index(&self) -> Result<Option<AnnotationIndex>>;

    /// Persist the full mapping.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save_index(&self, index: &AnnotationIndex) -> Result<()>;

    /// Move unreadable data out of the way so the next save does not clobber it.
    /// Returns where it went, if anywhere.
    fn quarantine(&self) -> Result<Option<PathBuf>>;

    /// Where the data lives. For MemBackend, a virtual path.
    fn location(&self) -> PathBuf;
}

// Lets a caller keep ownership of a backend while a store borrows it.
impl<T: StorageBackend + ?Sized> StorageBackend for &T {
    fn load_index(&self) -> Result<Option<AnnotationIndex>> {
        (**self).load_index()
    }

    fn save_index(&self, index: &AnnotationIndex) -> Result<()> {
        (**self).save_index(index)
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        (**self).quarantine()
    }

    fn location(&self) -> PathBuf {
        (**self).location()
    }
}

/// Parse the persisted JSON form shared by all backends.
pub(crate) fn parse_index(text: &str, source: &str) -> Result<Option<AnnotationIndex>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| DirnotesError::PersistenceCorrupt(format!("{}: {}", source, e)))
}
