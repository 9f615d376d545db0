//! # API Facade
//!
//! The API layer is a **thin facade** that bundles one session's collaborators: the
//! [`AnnotationStore`], the host's [`Resolver`], and the [`Settings`]. UI and tooling
//! callers hold a `DirNotesApi` instead of reaching for process-wide singletons.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Owns** exactly one store and one resolver for the session's lifetime
//! - **Dispatches** to the store and to [`crate::bulk`]
//! - **Threads the resolver** into path-based calls so callers don't have to
//!
//! It holds no logic of its own: replace semantics live in the store, batching and
//! failure accounting in the bulk module.
//!
//! ## Generic Over Backend and Resolver
//!
//! - Production: `DirNotesApi<FsBackend, FsResolver>` (see [`crate::init`])
//! - Testing: `DirNotesApi<MemBackend, MemResolver>` (see [`DirNotesApi::in_memory`])

use crate::bulk::{self, BenchReport, BulkSummary, Manifest};
use crate::config::Settings;
use crate::error::Result;
use crate::model::{Annotation, Color};
use crate::resolver::{MemResolver, Resolver};
use crate::store::backend::StorageBackend;
use crate::store::mem_backend::MemBackend;
use crate::store::AnnotationStore;
use std::sync::atomic::AtomicBool;

/// One annotation session: store, resolver and settings.
pub struct DirNotesApi<B: StorageBackend, R: Resolver> {
    store: AnnotationStore<B>,
    resolver: R,
    settings: Settings,
}

impl DirNotesApi<MemBackend, MemResolver> {
    /// A session held entirely in memory, starting with the given top-level directories.
    pub fn in_memory(roots: &[&str]) -> Self {
        let settings = Settings::default();
        let store = AnnotationStore::open_with_mode(MemBackend::new(), settings.write_mode());
        Self::new(store, MemResolver::new(roots), settings)
    }
}

impl<B: StorageBackend, R: Resolver> DirNotesApi<B, R> {
    pub fn new(store: AnnotationStore<B>, resolver: R, settings: Settings) -> Self {
        Self {
            store,
            resolver,
            settings,
        }
    }

    pub fn store(&self) -> &AnnotationStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore<B> {
        &mut self.store
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_parts(self) -> (AnnotationStore<B>, R, Settings) {
        (self.store, self.resolver, self.settings)
    }

    // --- By identifier ---

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.store.get(id)
    }

    pub fn set(&mut self, id: &str, title: &str, comment: &str, color: Color) -> Result<()> {
        self.store.set(id, title, comment, color)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool> {
        self.store.remove(id)
    }

    // --- By path ---

    pub fn get_by_path(&self, path: &str) -> Result<Option<&Annotation>> {
        self.store.get_by_path(&self.resolver, path)
    }

    pub fn set_by_path(
        &mut self,
        path: &str,
        title: &str,
        comment: &str,
        color: Color,
    ) -> Result<()> {
        self.store
            .set_by_path(&self.resolver, path, title, comment, color)
    }

    pub fn remove_by_path(&mut self, path: &str) -> Result<bool> {
        self.store.remove_by_path(&self.resolver, path)
    }

    // --- Maintenance ---

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    pub fn prune_orphans(&mut self) -> Result<usize> {
        self.store.prune_orphans(&self.resolver)
    }

    // --- Bulk ---

    pub fn apply_all(&mut self, manifest: &Manifest, cancel: Option<&AtomicBool>) -> BulkSummary {
        bulk::apply_all(&mut self.store, &self.resolver, manifest, cancel)
    }

    pub fn create_all(&self, manifest: &Manifest, cancel: Option<&AtomicBool>) -> BulkSummary {
        bulk::create_all(&self.resolver, manifest, cancel)
    }

    pub fn annotate_all(
        &mut self,
        manifest: &Manifest,
        cancel: Option<&AtomicBool>,
    ) -> BulkSummary {
        bulk::annotate_all(&mut self.store, &self.resolver, manifest, cancel)
    }

    pub fn clear_all(&mut self, manifest: &Manifest, cancel: Option<&AtomicBool>) -> BulkSummary {
        bulk::clear_all(&mut self.store, &self.resolver, manifest, cancel)
    }

    pub fn delete_all(&mut self, manifest: &Manifest, cancel: Option<&AtomicBool>) -> BulkSummary {
        bulk::delete_all(&mut self.store, &self.resolver, manifest, cancel)
    }

    /// Make sure `path` exists and carries no annotation.
    pub fn create_bare(&mut self, path: &str) -> BulkSummary {
        bulk::create_bare(&mut self.store, &self.resolver, path)
    }

    pub fn run_benchmark(&mut self, root: &str, count: usize) -> BenchReport {
        bulk::run_benchmark(&mut self.store, &self.resolver, root, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_session() {
        let api = DirNotesApi::in_memory(&["Assets"]);
        assert!(api.resolver().exists("Assets"));
        assert!(api.store().is_empty());
        assert_eq!(api.settings(), &Settings::default());
    }

    #[test]
    fn test_path_calls_use_owned_resolver() {
        let mut api = DirNotesApi::in_memory(&["Assets"]);
        api.resolver().create_directory("Assets", "Scripts").unwrap();

        api.set_by_path("Assets/Scripts", "Scripts", "Logic", Color::rgb(0.4, 0.8, 1.0))
            .unwrap();
        let id = api.resolver().path_to_id("Assets/Scripts").unwrap();
        assert_eq!(api.get(&id).unwrap().title, "Scripts");
        assert_eq!(api.get_by_path("Assets/Scripts").unwrap().unwrap().comment, "Logic");

        assert!(api.remove_by_path("Assets/Scripts").unwrap());
        assert!(!api.remove(&id).unwrap());
    }

    #[test]
    fn test_bulk_dispatch() {
        let mut api = DirNotesApi::in_memory(&["Assets"]);
        let manifest = Manifest::sample("Assets/TestFolders");

        let summary = api.apply_all(&manifest, None);
        assert_eq!(summary.annotated, 10);
        assert_eq!(api.store().len(), 10);

        let summary = api.delete_all(&manifest, None);
        assert_eq!(summary.removed, 10);
        assert!(!api.resolver().exists("Assets/TestFolders"));
    }

    #[test]
    fn test_bare_folder_dispatch() {
        let mut api = DirNotesApi::in_memory(&["Assets"]);
        let path = bulk::bare_folder_path("Assets");

        assert_eq!(api.create_bare(&path).created, 1);
        assert!(api.get_by_path(&path).unwrap().is_none());
    }

    #[test]
    fn test_prune_after_directory_deleted() {
        let mut api = DirNotesApi::in_memory(&["Assets"]);
        api.resolver().create_directory("Assets", "Tmp").unwrap();
        api.set_by_path("Assets/Tmp", "Tmp", "", Color::DEFAULT).unwrap();
        api.resolver().delete_directory("Assets/Tmp");

        assert_eq!(api.prune_orphans().unwrap(), 1);
        assert!(api.store().is_empty());
    }
}
