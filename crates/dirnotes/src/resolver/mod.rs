//! # Identifier Resolution
//!
//! Annotations are keyed by *stable directory identifiers*, not by paths. Paths change
//! whenever a directory is renamed or moved; the identifier does not. Translating between
//! the two belongs to the host environment, which the store consumes through the
//! [`Resolver`] trait.
//!
//! ## Paths
//!
//! Paths are host-style strings with `/` separators, relative to the host's project
//! (e.g. `Assets/TestFolders/Art`). Empty segments are ignored, so `Art//Textures/`
//! and `Art/Textures` name the same directory. Paths never climb: a path with a `.` or
//! `..` segment names no directory, so nothing outside the project is ever touched.
//!
//! ## Contract
//!
//! - Results are authoritative at call time. Callers never cache them across calls.
//! - `id_to_path` may return `None` for an identifier that outlived its directory.
//! - `create_directory` is idempotent: an existing child is returned as-is.
//! - `delete_directory` is recursive and reports whether anything was deleted.
//!
//! ## Implementations
//!
//! - [`memory::MemResolver`]: in-memory directory tree for tests and tooling.
//! - [`fs::FsResolver`]: real directories; the identifier lives in a sidecar file inside
//!   each directory so it travels with renames and moves.

use crate::error::Result;

pub mod fs;
pub mod memory;

pub use fs::FsResolver;
pub use memory::MemResolver;

/// The host's path/identifier oracle.
pub trait Resolver {
    /// Stable identifier of the directory at `path`, or `None` if there is no directory.
    fn path_to_id(&self, path: &str) -> Option<String>;

    /// Current path of the directory with `id`, or `None` if it no longer exists.
    fn id_to_path(&self, id: &str) -> Option<String>;

    /// Does a directory exist at `path`?
    fn exists(&self, path: &str) -> bool;

    /// Create `name` under `parent` and return the new path.
    /// Fails with `DirectoryOperationFailed` if `parent` is missing or `name` is invalid.
    fn create_directory(&self, parent: &str, name: &str) -> Result<String>;

    /// Delete the directory at `path` and everything below it.
    fn delete_directory(&self, path: &str) -> bool;

    /// Direct child directories of `path`, sorted. Empty if `path` does not exist.
    fn list_subdirectories(&self, path: &str) -> Vec<String>;
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a path: segments joined by single slashes.
pub fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// Join a child name (or relative path) onto a parent path.
pub fn join(parent: &str, child: &str) -> String {
    let parent = normalize(parent);
    let child = normalize(child);
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child,
        (_, true) => parent,
        _ => format!("{}/{}", parent, child),
    }
}

/// Split into `(parent, name)`. `None` for the empty path.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let normalized = normalize(path);
    if normalized.is_empty() {
        return None;
    }
    match normalized.rsplit_once('/') {
        Some((parent, name)) => Some((parent.to_string(), name.to_string())),
        None => Some((String::new(), normalized)),
    }
}

/// True when every segment is a plain directory name (no `.` or `..`).
pub fn is_confined(path: &str) -> bool {
    segments(path).all(is_valid_name)
}

/// A directory name must be a single, non-special segment.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
}
