use crate::init::{initialize, DirNotesContext};
use std::path::PathBuf;
use tempfile::TempDir;

/// A project directory on disk with an open session over it.
pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    // Kept apart from the project so no user config leaks in
    pub _global_dir: TempDir,
    pub root: PathBuf,
    pub ctx: DirNotesContext,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    /// A project with an empty `Assets` directory.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let global_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        std::fs::create_dir(root.join("Assets")).expect("failed to create Assets");
        let ctx = initialize(&root, Some(global_dir.path().to_path_buf()));
        Self {
            _temp_dir: temp_dir,
            _global_dir: global_dir,
            root,
            ctx,
        }
    }

    /// Close the session and open a fresh one over the same directories, as a host restart would.
    pub fn reopen(&mut self) {
        self.ctx.api.flush().expect("flush before reopen");
        self.ctx = initialize(&self.root, Some(self._global_dir.path().to_path_buf()));
    }
}
