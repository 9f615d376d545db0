//! # Dirnotes Architecture
//!
//! Dirnotes attaches a short annotation (a title, a free-form comment and a title color) to
//! directories of a project. It is a **UI-agnostic library**: a host (an editor panel, a file
//! browser, a tool) resolves directories and draws labels, dirnotes remembers what was said
//! about them.
//!
//! ## Stable Identity
//!
//! Annotations are keyed by an opaque identifier the host assigns to each directory, never by
//! path. A rename or move keeps the identifier, so the annotation follows the directory. The
//! [`resolver::Resolver`] trait is the only place that knows how paths and identifiers relate.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs, wired by init.rs)                       │
//! │  - One session: store + resolver + settings                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bulk Layer (bulk.rs)                                       │
//! │  - Manifest-driven create / annotate / clear / delete       │
//! │  - Batched writes, per-item failure accounting              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Store Layer (store/)                                       │
//! │  - AnnotationStore: replace semantics, write modes          │
//! │  - StorageBackend: FsBackend (production), MemBackend (test)│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! Nothing in this crate writes to stdout/stderr or calls `std::process::exit`. Diagnostics go
//! through the [`log`] facade; the host picks the logger.
//!
//! ## Module Overview
//!
//! - [`api`]: The session facade
//! - [`bulk`]: Test-fixture and benchmark bulk operations
//! - [`store`]: Annotation store and storage backends
//! - [`resolver`]: Path/identifier resolution (filesystem and in-memory)
//! - [`model`]: Core data types (`Annotation`, `Color`)
//! - [`config`]: Settings
//! - [`init`]: Session setup for a project directory
//! - [`error`]: Error types

pub mod api;
pub mod bulk;
pub mod config;
pub mod error;
pub mod init;
pub mod model;
pub mod resolver;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
