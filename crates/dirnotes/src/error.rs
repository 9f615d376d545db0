use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirnotesError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Path does not resolve to a directory identifier: {0}")]
    UnresolvedPath(String),

    #[error("Persisted annotations are corrupt: {0}")]
    PersistenceCorrupt(String),

    #[error("Directory operation failed: {0}")]
    DirectoryOperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

impl DirnotesError {
    /// True for errors the store recovers from by starting empty.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, DirnotesError::PersistenceCorrupt(_))
    }
}

pub type Result<T> = std::result::Result<T, DirnotesError>;
