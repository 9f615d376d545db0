//! # Session Setup
//!
//! A host opens one annotation session per project. [`initialize`] wires the production
//! collaborators together:
//!
//! 1. **Settings**: layered by [`clapfig`] from the global data directory and
//!    `<project>/.dirnotes/dirnotes.toml` (project wins), plus `DIRNOTES__*` env vars.
//! 2. **Store**: [`FsBackend`] at `<project>/.dirnotes/<data_file>`, opened in the
//!    write mode the settings ask for.
//! 3. **Resolver**: [`FsResolver`] rooted at the project directory.
//!
//! ## Project Root Detection
//!
//! [`find_project_root`] walks up from a starting directory to the closest ancestor that
//! has a `.dirnotes` directory, stopping at `HOME` or the filesystem root.
//!
//! ## Global Data Directory
//!
//! Resolved in order:
//! 1. The `global_override` argument.
//! 2. The `DIRNOTES_GLOBAL_DATA` environment variable (primarily for testing).
//! 3. The OS-appropriate data directory via the `directories` crate.
//! 4. The project data directory, when the OS gives no answer.

use crate::api::DirNotesApi;
use crate::config::Settings;
use crate::resolver::FsResolver;
use crate::store::fs_backend::FsBackend;
use crate::store::AnnotationStore;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};

/// Name of the per-project data directory.
pub const DATA_DIR: &str = ".dirnotes";

pub struct DirNotesContext {
    pub api: DirNotesApi<FsBackend, FsResolver>,
    pub data_dir: PathBuf,
    pub global_dir: PathBuf,
}

/// Walk up from `start` to the closest directory containing `.dirnotes`.
/// Returns None if none is found before reaching home or root.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let home_dir = BaseDirs::new().map(|bd| bd.home_dir().to_path_buf());
    let mut current = start.to_path_buf();

    loop {
        if current.join(DATA_DIR).is_dir() {
            return Some(current);
        }

        if let Some(ref home) = home_dir {
            if &current == home {
                return None;
            }
        }

        match current.parent() {
            Some(parent) if parent != current => {
                current = parent.to_path_buf();
            }
            _ => return None,
        }
    }
}

fn global_data_dir(global_override: Option<PathBuf>, fallback: &Path) -> PathBuf {
    global_override
        .or_else(|| std::env::var("DIRNOTES_GLOBAL_DATA").ok().map(PathBuf::from))
        .or_else(|| {
            ProjectDirs::from("com", "dirnotes", "dirnotes").map(|d| d.data_dir().to_path_buf())
        })
        .unwrap_or_else(|| fallback.to_path_buf())
}

/// Load settings for a project, falling back to defaults if anything goes wrong.
/// Global provides defaults, project overrides.
pub fn load_settings(data_dir: &Path, global_dir: &Path) -> Settings {
    Clapfig::builder()
        .app_name("dirnotes")
        .file_name("dirnotes.toml")
        .search_paths(vec![
            SearchPath::Path(global_dir.to_path_buf()),
            SearchPath::Path(data_dir.to_path_buf()),
        ])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

/// Open the annotation session for the project at `project_root`.
///
/// # Arguments
///
/// * `project_root` - Directory whose subdirectories get annotated
/// * `global_override` - Optional explicit global data directory (for isolation in tests)
pub fn initialize(project_root: &Path, global_override: Option<PathBuf>) -> DirNotesContext {
    let data_dir = project_root.join(DATA_DIR);
    let global_dir = global_data_dir(global_override, &data_dir);

    let settings = load_settings(&data_dir, &global_dir);
    let backend = FsBackend::in_dir(&data_dir, settings.data_file());
    log::debug!("Opening annotations at {}", backend.data_file().display());

    let store = AnnotationStore::open_with_mode(backend, settings.write_mode());
    let resolver = FsResolver::new(project_root);

    DirNotesContext {
        api: DirNotesApi::new(store, resolver, settings),
        data_dir,
        global_dir,
    }
}
