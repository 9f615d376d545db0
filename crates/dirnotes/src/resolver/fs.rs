use super::{is_confined, is_valid_name, join, normalize, segments, Resolver};
use crate::error::{DirnotesError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the sidecar file holding a directory's identifier.
pub const ID_FILE: &str = ".dirnotes-id";

/// Resolver over real directories below a project root.
///
/// A directory's identifier is a UUID written to [`ID_FILE`] inside it the first time it
/// is resolved. Because the file lives inside the directory, renames and moves carry the
/// identifier along. Hidden directories (names starting with `.`) are never listed.
///
/// ## Sidecar Format
///
/// ```text
/// <id>
/// <path the id was last resolved at>
/// ```
///
/// The recorded path tells a move from a copy. When a directory is resolved somewhere
/// other than its recorded path, the tree is searched for another directory holding the
/// same id. None found: it was moved, and the record is updated. Found: it is a copy
/// (`cp -r`, a file manager duplicate), and the copy gets a fresh id. The directory at
/// the recorded path always keeps the id and its annotation.
pub struct FsResolver {
    root: PathBuf,
}

/// Parsed contents of an [`ID_FILE`].
struct Sidecar {
    id: String,
    recorded_path: Option<String>,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `path`, or `None` if it would leave the root.
    fn abs(&self, path: &str) -> Option<PathBuf> {
        if !is_confined(path) {
            return None;
        }
        Some(segments(path).fold(self.root.clone(), |acc, s| acc.join(s)))
    }

    fn read_sidecar(dir: &Path) -> Option<Sidecar> {
        let content = fs::read_to_string(dir.join(ID_FILE)).ok()?;
        let mut lines = content.lines().map(str::trim);
        let id = lines.next().filter(|id| !id.is_empty())?.to_string();
        let recorded_path = lines.next().filter(|p| !p.is_empty()).map(str::to_string);
        Some(Sidecar { id, recorded_path })
    }

    fn write_sidecar(dir: &Path, id: &str, rel: &str) -> Option<String> {
        match fs::write(dir.join(ID_FILE), format!("{}\n{}\n", id, rel)) {
            Ok(()) => Some(id.to_string()),
            Err(e) => {
                log::warn!("Could not write id for {}: {}", dir.display(), e);
                None
            }
        }
    }

    fn assign_id(dir: &Path, rel: &str) -> Option<String> {
        Self::write_sidecar(dir, &Uuid::new_v4().simple().to_string(), rel)
    }

    /// Every directory below `dir` whose sidecar holds `id`, with its recorded path.
    fn collect_holders(&self, dir: &Path, rel: &str, id: &str, out: &mut Vec<(String, Sidecar)>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let child_rel = join(rel, name);
            if let Some(sidecar) = Self::read_sidecar(&path) {
                if sidecar.id == id {
                    out.push((child_rel.clone(), sidecar));
                }
            }
            self.collect_holders(&path, &child_rel, id, out);
        }
    }

    fn holders(&self, id: &str) -> Vec<(String, Sidecar)> {
        let mut out = Vec::new();
        self.collect_holders(&self.root, "", id, &mut out);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Resolver for FsResolver {
    fn path_to_id(&self, path: &str) -> Option<String> {
        let rel = normalize(path);
        if rel.is_empty() {
            return None;
        }
        let dir = self.abs(&rel)?;
        if !dir.is_dir() {
            return None;
        }

        let Some(sidecar) = Self::read_sidecar(&dir) else {
            return Self::assign_id(&dir, &rel);
        };
        if sidecar.recorded_path.as_deref() == Some(rel.as_str()) {
            return Some(sidecar.id);
        }

        let duplicated = self.holders(&sidecar.id).iter().any(|(p, _)| *p != rel);
        if duplicated {
            log::info!("{} is a copy of an annotated directory, assigning a new id", rel);
            Self::assign_id(&dir, &rel)
        } else {
            Self::write_sidecar(&dir, &sidecar.id, &rel)
        }
    }

    fn id_to_path(&self, id: &str) -> Option<String> {
        if id.trim().is_empty() {
            return None;
        }
        let holders = self.holders(id);
        // The directory that still sits where the id was recorded owns it.
        let owner = holders
            .iter()
            .position(|(p, s)| s.recorded_path.as_deref() == Some(p.as_str()))
            .unwrap_or(0);
        holders.into_iter().nth(owner).map(|(p, _)| p)
    }

    fn exists(&self, path: &str) -> bool {
        !normalize(path).is_empty() && self.abs(path).is_some_and(|d| d.is_dir())
    }

    fn create_directory(&self, parent: &str, name: &str) -> Result<String> {
        if !is_valid_name(name) {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "invalid directory name: {:?}",
                name
            )));
        }
        let Some(parent_dir) = self.abs(parent).filter(|d| d.is_dir()) else {
            return Err(DirnotesError::DirectoryOperationFailed(format!(
                "parent does not exist: {}",
                normalize(parent)
            )));
        };
        let path = join(parent, name);
        let dir = parent_dir.join(name);
        if !dir.is_dir() {
            fs::create_dir(&dir).map_err(|e| {
                DirnotesError::DirectoryOperationFailed(format!("{}: {}", path, e))
            })?;
        }
        Ok(path)
    }

    fn delete_directory(&self, path: &str) -> bool {
        if !self.exists(path) {
            return false;
        }
        let Some(dir) = self.abs(path) else {
            return false;
        };
        match fs::remove_dir_all(dir) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete {}: {}", path, e);
                false
            }
        }
    }

    fn list_subdirectories(&self, path: &str) -> Vec<String> {
        let Some(dir) = self.abs(path) else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut children: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .map(|name| join(path, &name))
            .collect();
        children.sort();
        children
    }
}
