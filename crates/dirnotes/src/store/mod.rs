//! # Storage Layer
//!
//! The store maps *stable directory identifiers* to [`Annotation`] records and keeps that
//! mapping persisted. It is split the same way as the rest of the crate's I/O:
//!
//! - [`backend::StorageBackend`]: the "how" of persistence (a JSON file, or memory).
//! - [`annotation_store::AnnotationStore`]: the "what" (validation, replace semantics,
//!   write batching, corruption recovery, path indirection).
//!
//! ## Lifecycle
//!
//! A store is opened once per session with [`AnnotationStore::open`]. Opening reads the
//! backing form exactly once; there is no unopened state and no hidden global instance.
//! [`AnnotationStore::reload`] re-reads explicitly (e.g. after an external edit).
//!
//! ## Write Modes
//!
//! - [`WriteMode::Immediate`] (default): every mutation is persisted before it returns.
//! - [`WriteMode::Deferred`]: mutations are staged in memory; [`AnnotationStore::flush`]
//!   writes them in one go. Bulk operations use this to avoid one write per entry.
//!
//! Either way, after a successful `flush` every change is durable.
//!
//! ## Corruption Recovery
//!
//! An unreadable backing form never blocks the host. Loading follows a fixed policy:
//!
//! 1. **Missing / empty**: start empty ([`LoadStatus::Missing`]).
//! 2. **Parsed**: use it ([`LoadStatus::Loaded`]); entries with blank ids are dropped.
//! 3. **Corrupt** (unparseable, or not UTF-8): log, quarantine the bad data via the
//!    backend, start empty ([`LoadStatus::Recovered`]).
//! 4. **Other read errors**: same as corrupt. The quarantine is attempted either way so
//!    the next save never overwrites data that was not loaded.
//!
//! Losing annotations is preferred over failing to open.
//!
//! ## Concurrency
//!
//! Single writer. Two processes writing the same file is unsupported: the last write
//! wins and nothing detects the conflict.
//!
//! ## Storage Layout
//!
//! ```text
//! <project>/.dirnotes/
//! ├── dirnotes.toml                  # Project settings (optional)
//! ├── annotations.json               # id -> record mapping
//! └── annotations.json.corrupt-*     # Quarantined unreadable files
//! ```

use crate::model::Annotation;
use std::collections::BTreeMap;

pub mod annotation_store;
pub mod backend;
pub mod fs_backend;
pub mod mem_backend;

pub use annotation_store::AnnotationStore;

/// The persisted mapping, kept sorted so the file diffs cleanly.
pub type AnnotationIndex = BTreeMap<String, Annotation>;

/// When mutations reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Immediate,
    Deferred,
}

/// How the last load went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing persisted yet.
    Missing,
    /// Loaded this many records.
    Loaded(usize),
    /// The backing form could not be read; the store started empty.
    Recovered(String),
}
