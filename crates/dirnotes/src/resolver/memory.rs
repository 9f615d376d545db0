use super::{is_valid_name, join, normalize, split_parent, Resolver};
use crate::error::{DirnotesError, Result};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use uuid::Uuid;

/// In-memory directory tree for testing.
///
/// Maps normalized paths to identifiers. The empty path is the virtual project root:
/// it always accepts new top-level directories but is not itself a directory.
///
/// Uses `RefCell` for interior mutability since dirnotes is single-threaded.
pub struct MemResolver {
    dirs: RefCell<BTreeMap<String, String>>,
    simulate_create_error: Cell<bool>,
}

impl Default for MemResolver {
    fn default() -> Self {
        Self::new(&["Assets"])
    }
}

impl MemResolver {
    /// A tree that starts with the given top-level directories.
    pub fn new(roots: &[&str]) -> Self {
        let resolver = Self {
            dirs: RefCell::new(BTreeMap::new()),
            simulate_create_error: Cell::new(false),
        };
        for root in roots {
            let mut current = String::new();
            for segment in super::segments(root) {
                current = join(&current, segment);
                resolver
                    .dirs
                    .borrow_mut()
                    .entry(current.clone())
                    .or_insert_with(new_id);
            }
        }
        resolver
    }

    /// Make every `create_directory` call fail.
    pub fn set_simulate_create_error(&self, simulate: bool) {
        self.simulate_create_error.set(simulate);
    }

    /// Number of directories in the tree.
    pub fn len(&self) -> usize {
        self.dirs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.borrow().is_empty()
    }

    /// Rename the directory at `path`, keeping its identifier and those below it.
    pub fn rename(&self, path: &str, new_name: &str) -> Result<String> {
        if !is_valid_name(new_name) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "invalid directory name: {:?}",
                new_name
            )));
        }
        let (parent, _) = split_parent(path).ok_or_else(|| {
            DirnotesError::DirectoryOperationFailed("cannot rename the project root".to_string())
        })?;
        self.relocate(path, &join(&parent, new_name))
    }

    /// Move the directory at `path` under `new_parent`, keeping identifiers.
    pub fn move_to(&self, path: &str, new_parent: &str) -> Result<String> {
        let (_, name) = split_parent(path).ok_or_else(|| {
            DirnotesError::DirectoryOperationFailed("cannot move the project root".to_string())
        })?;
        let new_parent = normalize(new_parent);
        if !new_parent.is_empty() && !self.exists(&new_parent) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "destination does not exist: {}",
                new_parent
            )));
        }
        self.relocate(path, &join(&new_parent, &name))
    }

    fn relocate(&self, from: &str, to: &str) -> Result<String> {
        let from = normalize(from);
        let to = normalize(to);
        let mut dirs = self.dirs.borrow_mut();

        if !dirs.contains_key(&from) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "no such directory: {}",
                from
            )));
        }
        if dirs.contains_key(&to) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "destination already exists: {}",
                to
            )));
        }
        if is_within(&to, &from) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "cannot move {} into itself",
                from
            )));
        }

        let moved: Vec<String> = dirs
            .keys()
            .filter(|p| is_within(p, &from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(id) = dirs.remove(&old) {
                let new_path = format!("{}{}", to, &old[from.len()..]);
                dirs.insert(new_path, id);
            }
        }
        Ok(to)
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `path` is `ancestor` or lies below it.
fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

impl Resolver for MemResolver {
    fn path_to_id(&self, path: &str) -> Option<String> {
        self.dirs.borrow().get(&normalize(path)).cloned()
    }

    fn id_to_path(&self, id: &str) -> Option<String> {
        self.dirs
            .borrow()
            .iter()
            .find(|(_, v)| v.as_str() == id)
            .map(|(k, _)| k.clone())
    }

    fn exists(&self, path: &str) -> bool {
        self.dirs.borrow().contains_key(&normalize(path))
    }

    fn create_directory(&self, parent: &str, name: &str) -> Result<String> {
        if self.simulate_create_error.get() {
            return Err(DirnotesError::DirectoryOperationFailed(
                "Simulated create error".to_string(),
            ));
        }
        if !is_valid_name(name) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "invalid directory name: {:?}",
                name
            )));
        }
        let parent = normalize(parent);
        if !parent.is_empty() && !self.exists(&parent) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "parent does not exist: {}",
                parent
            )));
        }
        let path = join(&parent, name);
        self.dirs
            .borrow_mut()
            .entry(path.clone())
            .or_insert_with(new_id);
        Ok(path)
    }

    fn delete_directory(&self, path: &str) -> bool {
        let path = normalize(path);
        let mut dirs = self.dirs.borrow_mut();
        if path.is_empty() || !dirs.contains_key(&path) {
            return false;
        }
        dirs.retain(|p, _| !is_within(p, &path));
        true
    }

    fn list_subdirectories(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        let dirs = self.dirs.borrow();
        if !dirs.contains_key(&path) {
            return Vec::new();
        }
        let prefix = format!("{}/", path);
        dirs.keys()
            .filter_map(|p| {
                p.strip_prefix(&prefix)
                    .filter(|rest| !rest.contains('/'))
                    .map(|_| p.clone())
            })
            .collect()
    }
}
