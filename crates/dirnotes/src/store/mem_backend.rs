use super::backend::{parse_index, StorageBackend};
use super::AnnotationIndex;
use crate::error::{DirnotesError, Result};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

/// In-memory storage backend for testing.
///
/// Holds the serialized JSON text rather than the parsed map, so loading goes through
/// the same parser as the file backend and tests can plant corrupt data.
///
/// Uses `RefCell` for interior mutability since dirnotes is single-threaded.
#[derive(Default)]
pub struct MemBackend {
    raw: RefCell<Option<String>>,
    quarantined: RefCell<Vec<String>>,
    saves: Cell<usize>,
    simulate_write_error: Cell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted (possibly corrupt) text.
    pub fn with_raw(text: &str) -> Self {
        let backend = Self::default();
        *backend.raw.borrow_mut() = Some(text.to_string());
        backend
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// The currently persisted text, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.borrow().clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// Texts moved aside by `quarantine`.
    pub fn quarantined(&self) -> Vec<String> {
        self.quarantined.borrow().clone()
    }
}

impl StorageBackend for MemBackend {
    fn load_index(&self) -> Result<Option<AnnotationIndex>> {
        match self.raw.borrow().as_deref() {
            None => Ok(None),
            Some(text) => parse_index(text, "memory://annotations.json"),
        }
    }

    fn save_index(&self, index: &AnnotationIndex) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(DirnotesError::Store("Simulated write error".to_string()));
        }
        let text = serde_json::to_string_pretty(index)?;
        *self.raw.borrow_mut() = Some(text);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        match self.raw.borrow_mut().take() {
            Some(text) => {
                let mut quarantined = self.quarantined.borrow_mut();
                quarantined.push(text);
                Ok(Some(PathBuf::from(format!(
                    "memory://annotations.json.corrupt-{}",
                    quarantined.len()
                ))))
            }
            None => Ok(None),
        }
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://annotations.json")
    }
}
