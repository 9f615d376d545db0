//! # Bulk Operations
//!
//! Applies a [`Manifest`] (a table of relative paths to annotation content) against a
//! root directory. The same helper builds test fixtures and drives scale runs of
//! hundreds of folders.
//!
//! ## Operations
//!
//! - [`create_all`]: create the root and every missing segment of every entry path.
//! - [`annotate_all`]: set the annotation of every entry whose directory exists.
//! - [`apply_all`]: both of the above.
//! - [`clear_all`]: remove every entry's annotation.
//! - [`delete_all`]: clear the entries and the root itself, then delete the root directory.
//! - [`create_bare`]: make sure a directory exists and carries no annotation (the
//!   "empty comment" fixture; remove it again with `delete_all(&Manifest::new(path))`).
//! - [`annotate_subdirectories`] / [`clear_subdirectories`]: act on whatever children
//!   exist under a root, without a manifest.
//! - [`run_benchmark`]: time the full create → annotate → clear → delete cycle.
//!
//! ## Failure Policy
//!
//! A failing entry never aborts the batch. Failures are logged and counted in the
//! returned [`BulkSummary`]. If the single flush at the end of a batch fails, the summary
//! still carries every per-entry count and sets `flush_failed`; the changes stay staged
//! in the store (it reports dirty) so a later flush can retry.
//!
//! ## Batching
//!
//! Store mutations inside a batch are staged ([`WriteMode::Deferred`]) and written by
//! one flush at the end; the store's previous write mode is restored afterwards.
//!
//! ## Cancellation
//!
//! Every operation takes an optional flag, checked before each entry. Once it is set
//! the batch stops, the summary reports `cancelled`, and staged changes are still
//! flushed.

use crate::error::{DirnotesError, Result};
use crate::model::{format_timestamp, Annotation, Color};
use crate::resolver::{join, segments, Resolver};
use crate::store::backend::StorageBackend;
use crate::store::{AnnotationStore, WriteMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Directory name of the empty-comment fixture.
pub const BARE_FOLDER_NAME: &str = "EmptyCommentTest";

/// One row of a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Path below the manifest root, `/`-separated. May span several levels.
    pub relative_path: String,
    pub title: String,
    pub comment: String,
    pub color: Color,
}

impl ManifestEntry {
    pub fn new(
        relative_path: impl Into<String>,
        title: impl Into<String>,
        comment: impl Into<String>,
        color: Color,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            title: title.into(),
            comment: comment.into(),
            color,
        }
    }
}

/// A root directory plus the annotated directories below it.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub root: String,
    pub entries: Vec<ManifestEntry>,
}

const LONG_SENTENCE: &str =
    "This is a very long comment used to check how wrapping and truncation behave. ";

impl Manifest {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(
        mut self,
        relative_path: &str,
        title: &str,
        comment: &str,
        color: Color,
    ) -> Self {
        self.entries
            .push(ManifestEntry::new(relative_path, title, comment, color));
        self
    }

    /// The fixture set: plain folders, a parent listed after its child, a three-level
    /// nested path, rich text, a long comment and an intentionally empty folder.
    pub fn sample(root: &str) -> Self {
        Self::new(root)
            .with_entry(
                "Scripts",
                "Scripts",
                "All project scripts: gameplay logic, UI controllers and the like",
                Color::rgb(0.4, 0.8, 1.0),
            )
            .with_entry("Prefabs", "Prefabs", "All prefab assets", Color::rgb(0.4, 1.0, 0.4))
            .with_entry("3DModels", "Models", "All 3D model assets", Color::rgb(1.0, 0.4, 0.4))
            .with_entry(
                "Art/Textures",
                "Textures",
                "All textures and images",
                Color::rgb(1.0, 1.0, 0.4),
            )
            .with_entry(
                "EmptyFolder",
                "Empty folder",
                "An empty folder, kept for testing",
                Color::rgb(0.7, 0.7, 0.7),
            )
            .with_entry("Art", "Art", "All art assets", Color::rgb(1.0, 0.6, 0.8))
            .with_entry(
                "Nested/Level1/Level2",
                "Nested folder",
                "A folder several levels deep",
                Color::rgb(0.5, 0.5, 1.0),
            )
            .with_entry(
                "RichText",
                "<b>Rich text</b> title",
                "<color=#FF0000>Red text</color>\n<b>Bold text</b>\n<i>Italic text</i>\n<size=14>Large text</size>",
                Color::rgb(1.0, 0.5, 0.5),
            )
            .with_entry(
                "LongComment",
                "Long comment",
                LONG_SENTENCE.repeat(5).trim_end(),
                Color::rgb(0.5, 0.5, 0.5),
            )
            .with_entry("Audio", "Audio", "Music and sound effects", Color::rgb(0.6, 0.4, 1.0))
    }

    /// `count` flat folders named `TestFolder_000`, `TestFolder_001`, ...
    pub fn performance(root: &str, count: usize) -> Self {
        let entries = (0..count)
            .map(|i| {
                let name = performance_folder_name(i);
                let annotation = performance_annotation(i, &name);
                ManifestEntry::new(
                    name,
                    annotation.title,
                    annotation.comment,
                    annotation.title_color,
                )
            })
            .collect();
        Self {
            root: root.to_string(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full path of an entry.
    pub fn path_of(&self, entry: &ManifestEntry) -> String {
        join(&self.root, &entry.relative_path)
    }
}

pub fn performance_folder_name(i: usize) -> String {
    format!("TestFolder_{:03}", i)
}

/// Content used for the `i`-th performance folder. Colors vary but are deterministic.
pub fn performance_annotation(i: usize, name: &str) -> Annotation {
    let channel = |k: usize| ((i * k) % 100) as f32 / 100.0;
    Annotation::new(
        format!("Performance test {}", name),
        format!(
            "Comment for performance test folder {}.\nIncludes some <b>rich text</b> and <color=#FF0000>color</color> markup.",
            name
        ),
        Color::rgb(channel(37), channel(59), channel(83)),
    )
}

/// Outcome counts of a bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub created: usize,
    pub annotated: usize,
    pub removed: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// The batch ran but its changes could not be persisted.
    pub flush_failed: bool,
}

impl BulkSummary {
    /// Fold another summary into this one.
    pub fn absorb(&mut self, other: BulkSummary) {
        self.created += other.created;
        self.annotated += other.annotated;
        self.removed += other.removed;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
        self.flush_failed |= other.flush_failed;
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled && !self.flush_failed
    }
}

impl fmt::Display for BulkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, annotated {}, removed {}, failed {}",
            self.created, self.annotated, self.removed, self.failed
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        if self.flush_failed {
            write!(f, " (not saved)")?;
        }
        Ok(())
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Run `f` with writes staged, then flush once and restore the previous mode.
/// A failed flush is logged and reported through `flush_failed`.
fn batched<B>(
    store: &mut AnnotationStore<B>,
    f: impl FnOnce(&mut AnnotationStore<B>) -> BulkSummary,
) -> BulkSummary
where
    B: StorageBackend,
{
    let previous = store.write_mode();
    if let Err(e) = store.set_write_mode(WriteMode::Deferred) {
        log::error!("Could not stage batch, writing entries one by one: {}", e);
    }
    let mut summary = f(store);
    let flushed = store.flush();
    let restored = store.set_write_mode(previous);
    if let Err(e) = flushed.and(restored) {
        log::error!(
            "Could not save annotations to {}: {}",
            store.backend().location().display(),
            e
        );
        summary.flush_failed = true;
    }
    summary
}

/// Create every missing directory along `path`, in order. Returns how many were created.
fn ensure_path<R: Resolver + ?Sized>(resolver: &R, path: &str) -> Result<usize> {
    let mut created = 0;
    let mut current = String::new();
    for segment in segments(path) {
        let next = join(&current, segment);
        if !resolver.exists(&next) {
            resolver.create_directory(&current, segment)?;
            log::debug!("Created directory {}", next);
            created += 1;
        }
        current = next;
    }
    Ok(created)
}

/// Create the manifest root and every directory named by its entries.
/// Existing directories are skipped, so each one is created at most once.
pub fn create_all<R: Resolver + ?Sized>(
    resolver: &R,
    manifest: &Manifest,
    cancel: Option<&AtomicBool>,
) -> BulkSummary {
    let mut summary = BulkSummary::default();

    match ensure_path(resolver, &manifest.root) {
        Ok(n) => summary.created += n,
        Err(e) => {
            log::warn!("Could not create root {}: {}", manifest.root, e);
            summary.failed += 1;
        }
    }

    for entry in &manifest.entries {
        if is_cancelled(cancel) {
            summary.cancelled = true;
            break;
        }
        let path = manifest.path_of(entry);
        match ensure_path(resolver, &path) {
            Ok(n) => summary.created += n,
            Err(e) => {
                log::warn!("Could not create {}: {}", path, e);
                summary.failed += 1;
            }
        }
    }

    log::info!("Created directories under {}: {}", manifest.root, summary);
    summary
}

/// Set every entry's annotation. Entries whose directory is missing count as failed.
pub fn annotate_all<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    manifest: &Manifest,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let summary = batched(store, |store| {
        let mut summary = BulkSummary::default();
        for entry in &manifest.entries {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }
            let path = manifest.path_of(entry);
            let Some(id) = resolver.path_to_id(&path) else {
                log::warn!("Directory does not exist: {}", path);
                summary.failed += 1;
                continue;
            };
            match store.set(&id, entry.title.as_str(), entry.comment.as_str(), entry.color) {
                Ok(()) => summary.annotated += 1,
                Err(e) => {
                    log::warn!("Could not annotate {}: {}", path, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    });
    log::info!("Annotated {}: {}", manifest.root, summary);
    summary
}

/// Create missing directories, then annotate every entry.
pub fn apply_all<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    manifest: &Manifest,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let mut summary = create_all(resolver, manifest, cancel);
    if summary.cancelled {
        return summary;
    }
    summary.absorb(annotate_all(store, resolver, manifest, cancel));
    summary
}

/// Remove every entry's annotation. Missing directories are skipped.
pub fn clear_all<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    manifest: &Manifest,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let summary = batched(store, |store| {
        let mut summary = BulkSummary::default();
        for entry in &manifest.entries {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }
            let path = manifest.path_of(entry);
            let Some(id) = resolver.path_to_id(&path) else {
                continue;
            };
            match store.remove(&id) {
                Ok(true) => summary.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Could not clear {}: {}", path, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    });
    log::info!("Cleared {}: {}", manifest.root, summary);
    summary
}

/// Clear every entry's annotation and the root's own, then delete the root directory.
/// A missing root counts as one failure.
pub fn delete_all<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    manifest: &Manifest,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let mut summary = clear_all(store, resolver, manifest, cancel);
    if summary.cancelled {
        return summary;
    }

    if !resolver.exists(&manifest.root) {
        log::warn!("Root directory does not exist: {}", manifest.root);
        summary.failed += 1;
        return summary;
    }

    summary.absorb(strip_annotation(store, resolver, &manifest.root));
    if resolver.delete_directory(&manifest.root) {
        log::info!("Deleted {}", manifest.root);
    } else {
        log::warn!("Failed to delete {}", manifest.root);
        summary.failed += 1;
    }
    summary
}

/// Remove the annotation on `path` itself, if it has one.
fn strip_annotation<B, R>(store: &mut AnnotationStore<B>, resolver: &R, path: &str) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let mut summary = BulkSummary::default();
    let Some(id) = resolver.path_to_id(path) else {
        return summary;
    };
    match store.remove(&id) {
        Ok(true) => summary.removed += 1,
        Ok(false) => {}
        Err(e) => {
            // The id is resolved, so the only way to fail is the write.
            log::error!("Could not save removal for {}: {}", path, e);
            summary.removed += 1;
            summary.flush_failed = true;
        }
    }
    summary
}

/// Where the empty-comment fixture lives under `parent`.
pub fn bare_folder_path(parent: &str) -> String {
    join(parent, BARE_FOLDER_NAME)
}

/// Create `path` (and any missing ancestors) and make sure it has no annotation,
/// so a host can check how an unannotated directory looks.
pub fn create_bare<B, R>(store: &mut AnnotationStore<B>, resolver: &R, path: &str) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let mut summary = BulkSummary::default();
    match ensure_path(resolver, path) {
        Ok(n) => summary.created += n,
        Err(e) => {
            log::warn!("Could not create {}: {}", path, e);
            summary.failed += 1;
            return summary;
        }
    }
    summary.absorb(strip_annotation(store, resolver, path));
    log::info!("Prepared bare folder {}: {}", path, summary);
    summary
}

/// Annotate every direct child of `root` with the content `annotation_for` returns
/// for its position and name. A missing root counts as one failure.
pub fn annotate_subdirectories<B, R, F>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    root: &str,
    mut annotation_for: F,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
    F: FnMut(usize, &str) -> Annotation,
{
    if !resolver.exists(root) {
        log::warn!("Root directory does not exist: {}", root);
        return BulkSummary {
            failed: 1,
            ..Default::default()
        };
    }
    let children = resolver.list_subdirectories(root);

    batched(store, |store| {
        let mut summary = BulkSummary::default();
        for (i, path) in children.iter().enumerate() {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }
            let name = path.rsplit('/').next().unwrap_or(path);
            let annotation = annotation_for(i, name);
            let result = match resolver.path_to_id(path) {
                Some(id) => store.set(
                    &id,
                    annotation.title,
                    annotation.comment,
                    annotation.title_color,
                ),
                None => Err(DirnotesError::UnresolvedPath(path.clone())),
            };
            match result {
                Ok(()) => summary.annotated += 1,
                Err(e) => {
                    log::warn!("Could not annotate {}: {}", path, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    })
}

/// Remove the annotation of every direct child of `root`.
pub fn clear_subdirectories<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    root: &str,
    cancel: Option<&AtomicBool>,
) -> BulkSummary
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    if !resolver.exists(root) {
        log::warn!("Root directory does not exist: {}", root);
        return BulkSummary {
            failed: 1,
            ..Default::default()
        };
    }
    let children = resolver.list_subdirectories(root);

    batched(store, |store| {
        let mut summary = BulkSummary::default();
        for path in &children {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }
            let Some(id) = resolver.path_to_id(path) else {
                continue;
            };
            match store.remove(&id) {
                Ok(true) => summary.removed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Could not clear {}: {}", path, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    })
}

/// Timings of one benchmark cycle.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub started_at: DateTime<Utc>,
    pub folder_count: usize,
    pub create: Duration,
    pub annotate: Duration,
    pub clear: Duration,
    pub delete: Duration,
    pub summary: BulkSummary,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Directory annotation performance report")?;
        writeln!(f, "=======================================")?;
        writeln!(f, "Run at: {}", format_timestamp(&self.started_at))?;
        writeln!(f, "Folders: {}", self.folder_count)?;
        writeln!(f)?;
        writeln!(f, "Create folders: {} ms", self.create.as_millis())?;
        writeln!(f, "Add annotations: {} ms", self.annotate.as_millis())?;
        writeln!(f, "Clear annotations: {} ms", self.clear.as_millis())?;
        writeln!(f, "Delete folders: {} ms", self.delete.as_millis())?;
        write!(f, "Totals: {}", self.summary)
    }
}

/// Create `count` folders under `root`, annotate, clear and delete them, timing each phase.
pub fn run_benchmark<B, R>(
    store: &mut AnnotationStore<B>,
    resolver: &R,
    root: &str,
    count: usize,
) -> BenchReport
where
    B: StorageBackend,
    R: Resolver + ?Sized,
{
    let started_at = Utc::now();
    let manifest = Manifest::performance(root, count);
    let mut summary = BulkSummary::default();

    let t = Instant::now();
    summary.absorb(create_all(resolver, &manifest, None));
    let create = t.elapsed();

    let t = Instant::now();
    summary.absorb(annotate_subdirectories(
        store,
        resolver,
        root,
        |i, name| performance_annotation(i, name),
        None,
    ));
    let annotate = t.elapsed();

    let t = Instant::now();
    summary.absorb(clear_subdirectories(store, resolver, root, None));
    let clear = t.elapsed();

    let t = Instant::now();
    summary.absorb(delete_all(store, resolver, &manifest, None));
    let delete = t.elapsed();

    let report = BenchReport {
        started_at,
        folder_count: count,
        create,
        annotate,
        clear,
        delete,
        summary,
    };
    log::info!("{}", report);
    report
}
