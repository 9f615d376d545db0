use super::backend::StorageBackend;
use super::{AnnotationIndex, LoadStatus, WriteMode};
use crate::error::{DirnotesError, Result};
use crate::model::{Annotation, Color};
use crate::resolver::Resolver;
use chrono::Utc;

/// The id -> annotation mapping and its persistence.
pub struct AnnotationStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
    entries: AnnotationIndex,
    mode: WriteMode,
    dirty: bool,
    status: LoadStatus,
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(DirnotesError::InvalidArgument(
            "directory id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn resolve_id<R: Resolver + ?Sized>(resolver: &R, path: &str) -> Result<String> {
    resolver
        .path_to_id(path)
        .ok_or_else(|| DirnotesError::UnresolvedPath(path.to_string()))
}

impl<B: StorageBackend> AnnotationStore<B> {
    /// Open the store, loading whatever the backend holds.
    pub fn open(backend: B) -> Self {
        Self::open_with_mode(backend, WriteMode::Immediate)
    }

    pub fn open_with_mode(backend: B, mode: WriteMode) -> Self {
        let (entries, status) = Self::load(&backend);
        Self {
            backend,
            entries,
            mode,
            dirty: false,
            status,
        }
    }

    /// Re-read the backing form, discarding anything staged.
    pub fn reload(&mut self) {
        if self.dirty {
            log::warn!(
                "Reloading {} discards unflushed changes",
                self.backend.location().display()
            );
        }
        let (entries, status) = Self::load(&self.backend);
        self.entries = entries;
        self.status = status;
        self.dirty = false;
    }

    fn load(backend: &B) -> (AnnotationIndex, LoadStatus) {
        match backend.load_index() {
            Ok(None) => (AnnotationIndex::new(), LoadStatus::Missing),
            Ok(Some(mut index)) => {
                let before = index.len();
                index.retain(|id, _| !id.trim().is_empty());
                if index.len() != before {
                    log::warn!(
                        "Dropped {} annotation(s) with blank ids from {}",
                        before - index.len(),
                        backend.location().display()
                    );
                }
                let count = index.len();
                log::debug!(
                    "Loaded {} annotation(s) from {}",
                    count,
                    backend.location().display()
                );
                (index, LoadStatus::Loaded(count))
            }
            Err(e) => {
                if e.is_corrupt() {
                    log::warn!("{}; starting with no annotations", e);
                } else {
                    log::error!(
                        "Could not read {}: {}; starting with no annotations",
                        backend.location().display(),
                        e
                    );
                }
                // Whatever could not be read must not be overwritten by the next save.
                match backend.quarantine() {
                    Ok(Some(moved)) => {
                        log::warn!("Moved unreadable annotations to {}", moved.display())
                    }
                    Ok(None) => {}
                    Err(qe) => log::error!("Could not quarantine unreadable annotations: {}", qe),
                }
                (AnnotationIndex::new(), LoadStatus::Recovered(e.to_string()))
            }
        }
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or fully replace the annotation for `id`.
    ///
    /// Setting content identical to what is stored is a no-op. Otherwise title, comment
    /// and color are replaced, the original `created_at` is kept and `updated_at` stamped.
    pub fn set(
        &mut self,
        id: &str,
        title: impl Into<String>,
        comment: impl Into<String>,
        color: Color,
    ) -> Result<()> {
        validate_id(id)?;
        let now = Utc::now();
        let mut record = Annotation::new(title, comment, color);

        match self.entries.get(id) {
            Some(existing) if existing.same_content(&record) => return Ok(()),
            Some(existing) => record.created_at = existing.created_at,
            None => record.created_at = Some(now),
        }
        record.updated_at = Some(now);

        self.entries.insert(id.to_string(), record);
        self.mark_changed()
    }

    /// [`set`](Self::set) with [`Color::DEFAULT`].
    pub fn set_default_color(
        &mut self,
        id: &str,
        title: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<()> {
        self.set(id, title, comment, Color::DEFAULT)
    }

    /// Remove the annotation for `id`. Returns whether one existed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        validate_id(id)?;
        if self.entries.remove(id).is_none() {
            return Ok(false);
        }
        self.mark_changed()?;
        Ok(true)
    }

    pub fn get_by_path<R: Resolver + ?Sized>(
        &self,
        resolver: &R,
        path: &str,
    ) -> Result<Option<&Annotation>> {
        let id = resolve_id(resolver, path)?;
        Ok(self.get(&id))
    }

    pub fn set_by_path<R: Resolver + ?Sized>(
        &mut self,
        resolver: &R,
        path: &str,
        title: impl Into<String>,
        comment: impl Into<String>,
        color: Color,
    ) -> Result<()> {
        let id = resolve_id(resolver, path)?;
        self.set(&id, title, comment, color)
    }

    pub fn remove_by_path<R: Resolver + ?Sized>(
        &mut self,
        resolver: &R,
        path: &str,
    ) -> Result<bool> {
        let id = resolve_id(resolver, path)?;
        self.remove(&id)
    }

    /// Remove annotations whose directory no longer exists.
    /// Returns how many were removed.
    pub fn prune_orphans<R: Resolver + ?Sized>(&mut self, resolver: &R) -> Result<usize> {
        let orphans: Vec<String> = self
            .entries
            .keys()
            .filter(|id| resolver.id_to_path(id).is_none())
            .cloned()
            .collect();

        for id in &orphans {
            self.entries.remove(id);
        }
        if !orphans.is_empty() {
            log::info!("Pruned {} orphaned annotation(s)", orphans.len());
            self.mark_changed()?;
        }
        Ok(orphans.len())
    }

    /// Write staged changes to the backend. A no-op when nothing is staged.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.backend.save_index(&self.entries)?;
        self.dirty = false;
        log::debug!(
            "Saved {} annotation(s) to {}",
            self.entries.len(),
            self.backend.location().display()
        );
        Ok(())
    }

    pub fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Switch write mode. Going back to Immediate flushes anything staged.
    pub fn set_write_mode(&mut self, mode: WriteMode) -> Result<()> {
        self.mode = mode;
        if mode == WriteMode::Immediate {
            self.flush()?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All annotations, sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.entries.iter().map(|(id, a)| (id.as_str(), a))
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn mark_changed(&mut self) -> Result<()> {
        self.dirty = true;
        match self.mode {
            WriteMode::Immediate => self.flush(),
            WriteMode::Deferred => Ok(()),
        }
    }
}

impl<B: StorageBackend> Drop for AnnotationStore<B> {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        log::warn!("Annotation store dropped with unflushed changes, flushing");
        if let Err(e) = self.flush() {
            log::error!("Final flush failed, changes lost: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemResolver;
    use crate::store::backend::StorageBackend;
    use crate::store::mem_backend::MemBackend;

    fn make_store() -> AnnotationStore<MemBackend> {
        AnnotationStore::open(MemBackend::new())
    }

    fn scripts_color() -> Color {
        Color::rgb(0.4, 0.8, 1.0)
    }

    // --- Basic CRUD Tests ---

    #[test]
    fn test_set_get_remove_scenario() {
        let mut store = make_store();
        assert!(store.is_empty());

        store
            .set("GUID-1", "Scripts", "Holds game logic", scripts_color())
            .unwrap();

        let record = store.get("GUID-1").unwrap();
        assert_eq!(record.title, "Scripts");
        assert_eq!(record.comment, "Holds game logic");
        assert_eq!(record.title_color, scripts_color());

        assert!(store.remove("GUID-1").unwrap());
        assert!(store.get("GUID-1").is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = make_store();
        store.set_default_color("a", "T", "C").unwrap();

        assert!(store.remove("a").unwrap());
        assert!(store.get("a").is_none());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_remove_absent_does_not_write() {
        let mut store = make_store();
        assert!(!store.remove("never-set").unwrap());
        assert_eq!(store.backend.save_count(), 0);
    }

    #[test]
    fn test_set_replaces_whole_record() {
        let mut store = make_store();
        store.set("a", "Old", "Old comment", Color::rgb(1.0, 0.0, 0.0)).unwrap();
        store.set("a", "New", "", Color::DEFAULT).unwrap();

        let record = store.get("a").unwrap();
        assert_eq!(record.title, "New");
        assert_eq!(record.comment, "");
        assert_eq!(record.title_color, Color::DEFAULT);
    }

    #[test]
    fn test_set_keeps_created_at_and_stamps_updated_at() {
        let mut store = make_store();
        store.set_default_color("a", "One", "").unwrap();
        let created = store.get("a").unwrap().created_at;
        assert!(created.is_some());

        store.set_default_color("a", "Two", "").unwrap();
        let record = store.get("a").unwrap();
        assert_eq!(record.created_at, created);
        assert!(record.updated_at >= created);
    }

    #[test]
    fn test_identical_set_is_noop() {
        let mut store = make_store();
        store.set("a", "T", "C", scripts_color()).unwrap();
        let first = store.get("a").unwrap().clone();
        let saves = store.backend.save_count();

        store.set("a", "T", "C", scripts_color()).unwrap();
        assert_eq!(store.get("a").unwrap(), &first);
        assert_eq!(store.backend.save_count(), saves);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_id_is_invalid() {
        let mut store = make_store();
        let err = store.set_default_color("", "T", "C").unwrap_err();
        assert!(matches!(err, DirnotesError::InvalidArgument(_)));

        let err = store.remove("   ").unwrap_err();
        assert!(matches!(err, DirnotesError::InvalidArgument(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_title_and_comment_allowed() {
        let mut store = make_store();
        store.set_default_color("a", "", "").unwrap();
        let record = store.get("a").unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.comment, "");
    }

    // --- Persistence Tests ---

    #[test]
    fn test_immediate_mode_persists_each_change() {
        let mut store = make_store();
        store.set_default_color("a", "T", "").unwrap();
        assert_eq!(store.backend.save_count(), 1);
        assert!(!store.is_dirty());

        store.remove("a").unwrap();
        assert_eq!(store.backend.save_count(), 2);
    }

    #[test]
    fn test_deferred_mode_waits_for_flush() {
        let mut store = AnnotationStore::open_with_mode(MemBackend::new(), WriteMode::Deferred);
        store.set_default_color("a", "T", "").unwrap();
        store.set_default_color("b", "T", "").unwrap();
        assert_eq!(store.backend.save_count(), 0);
        assert!(store.is_dirty());

        store.flush().unwrap();
        assert_eq!(store.backend.save_count(), 1);
        assert!(!store.is_dirty());

        // Idempotent
        store.flush().unwrap();
        assert_eq!(store.backend.save_count(), 1);
    }

    #[test]
    fn test_switching_to_immediate_flushes() {
        let mut store = AnnotationStore::open_with_mode(MemBackend::new(), WriteMode::Deferred);
        store.set_default_color("a", "T", "").unwrap();
        store.set_write_mode(WriteMode::Immediate).unwrap();
        assert_eq!(store.backend.save_count(), 1);
        assert_eq!(store.write_mode(), WriteMode::Immediate);
    }

    #[test]
    fn test_reload_roundtrip() {
        let mut store = make_store();
        store.set("a", "<b>Bold</b>", "line one\nline two", scripts_color()).unwrap();
        store.set_default_color("b", "Other", "").unwrap();
        let before: Vec<(String, Annotation)> =
            store.iter().map(|(id, a)| (id.to_string(), a.clone())).collect();

        store.reload();
        let after: Vec<(String, Annotation)> =
            store.iter().map(|(id, a)| (id.to_string(), a.clone())).collect();

        assert_eq!(before, after);
        assert_eq!(store.load_status(), &LoadStatus::Loaded(2));
    }

    #[test]
    fn test_out_of_range_color_roundtrips_clamped() {
        let mut store = make_store();
        let wild = Color {
            r: 2.0,
            g: f32::NAN,
            b: 0.5,
            a: 1.0,
        };
        store.set("a", "T", "", wild).unwrap();
        let stored = store.get("a").unwrap().title_color;
        assert_eq!(stored, Color::rgb(1.0, 0.0, 0.5));

        store.reload();
        assert_eq!(store.get("a").unwrap().title_color, stored);
    }

    #[test]
    fn test_save_fails_on_write_error() {
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        let mut store = AnnotationStore::open(backend);

        let result = store.set_default_color("a", "T", "");
        assert!(result.is_err());

        // Kept in memory, retried by the next flush
        assert!(store.get("a").is_some());
        assert!(store.is_dirty());

        store.backend.set_simulate_write_error(false);
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert!(store.backend.raw().unwrap().contains("\"a\""));
    }

    // --- Load / Recovery Tests ---

    #[test]
    fn test_open_missing_is_empty() {
        let store = make_store();
        assert!(store.is_empty());
        assert_eq!(store.load_status(), &LoadStatus::Missing);
    }

    #[test]
    fn test_open_blank_is_empty() {
        let store = AnnotationStore::open(MemBackend::with_raw("   "));
        assert!(store.is_empty());
        assert_eq!(store.load_status(), &LoadStatus::Missing);
    }

    #[test]
    fn test_open_corrupt_recovers_empty() {
        let store = AnnotationStore::open(MemBackend::with_raw("{\"a\": {\"title\": "));
        assert!(store.is_empty());
        assert!(matches!(store.load_status(), LoadStatus::Recovered(_)));
        assert_eq!(store.backend.quarantined().len(), 1);
        assert!(store.backend.raw().is_none());
    }

    #[test]
    fn test_corrupt_store_is_usable_after_recovery() {
        let mut store = AnnotationStore::open(MemBackend::with_raw("not json at all"));
        store.set_default_color("a", "T", "").unwrap();
        assert_eq!(store.len(), 1);
        let reloaded = store.backend.load_index().unwrap().unwrap();
        assert!(reloaded.contains_key("a"));
    }

    #[test]
    fn test_open_drops_blank_ids() {
        let raw = r#"{"": {"title": "ghost"}, "ok": {"title": "real"}}"#;
        let store = AnnotationStore::open(MemBackend::with_raw(raw));
        assert_eq!(store.len(), 1);
        assert!(store.contains("ok"));
        assert_eq!(store.load_status(), &LoadStatus::Loaded(1));
    }

    // --- Path Indirection Tests ---

    #[test]
    fn test_path_operations_match_id_operations() {
        let resolver = MemResolver::default();
        resolver.create_directory("Assets", "Scripts").unwrap();
        let mut store = make_store();

        store
            .set_by_path(&resolver, "Assets/Scripts", "Scripts", "Logic", scripts_color())
            .unwrap();

        let id = resolver.path_to_id("Assets/Scripts").unwrap();
        let by_path = store.get_by_path(&resolver, "Assets/Scripts").unwrap().cloned();
        assert_eq!(by_path.as_ref(), store.get(&id));
        assert_eq!(by_path.unwrap().title, "Scripts");

        assert!(store.remove_by_path(&resolver, "Assets/Scripts").unwrap());
        assert!(!store.remove_by_path(&resolver, "Assets/Scripts").unwrap());
    }

    #[test]
    fn test_unresolved_path() {
        let resolver = MemResolver::default();
        let mut store = make_store();

        let err = store
            .set_by_path(&resolver, "Assets/Missing", "T", "", Color::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, DirnotesError::UnresolvedPath(p) if p == "Assets/Missing"));

        assert!(store.get_by_path(&resolver, "Assets/Missing").is_err());
        assert!(store.remove_by_path(&resolver, "Assets/Missing").is_err());
    }

    #[test]
    fn test_annotation_follows_rename() {
        let resolver = MemResolver::default();
        resolver.create_directory("Assets", "Art").unwrap();
        let mut store = make_store();
        store
            .set_by_path(&resolver, "Assets/Art", "Art", "", Color::DEFAULT)
            .unwrap();

        resolver.rename("Assets/Art", "Graphics").unwrap();

        let record = store.get_by_path(&resolver, "Assets/Graphics").unwrap();
        assert_eq!(record.unwrap().title, "Art");
    }

    #[test]
    fn test_prune_orphans() {
        let resolver = MemResolver::default();
        resolver.create_directory("Assets", "Keep").unwrap();
        resolver.create_directory("Assets", "Gone").unwrap();
        let mut store = make_store();
        store.set_by_path(&resolver, "Assets/Keep", "K", "", Color::DEFAULT).unwrap();
        store.set_by_path(&resolver, "Assets/Gone", "G", "", Color::DEFAULT).unwrap();

        resolver.delete_directory("Assets/Gone");

        assert_eq!(store.prune_orphans(&resolver).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get_by_path(&resolver, "Assets/Keep").unwrap().is_some());
        assert_eq!(store.prune_orphans(&resolver).unwrap(), 0);
    }

    #[test]
    fn test_drop_flushes_staged_changes() {
        let backend = MemBackend::new();
        {
            let mut store = AnnotationStore::open_with_mode(&backend, WriteMode::Deferred);
            store.set_default_color("a", "T", "").unwrap();
        }
        assert!(backend.raw().unwrap().contains("\"a\""));
    }
}
