//! # Configuration
//!
//! Dirnotes settings are managed by [`clapfig`], which handles layered loading
//! from TOML files, environment variables, and programmatic overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `DIRNOTES__LIST_VIEW_FONT_SIZE`, `DIRNOTES__DEFERRED_WRITES`, etc.
//! 2. **Project Config**: `<project>/.dirnotes/dirnotes.toml`.
//! 3. **Global Config**: OS-appropriate data directory (via `directories` crate).
//! 4. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `enabled` | `true` | Show annotations in the host UI |
//! | `list_view_font_size` | `11` | Label size in list view |
//! | `icon_view_font_size` | `11` | Label size in icon view |
//! | `use_bold_font` | `true` | Bold titles |
//! | `data_file` | `annotations.json` | File name of the persisted mapping |
//! | `deferred_writes` | `false` | Stage writes until an explicit flush |
//!
//! Presentation settings are read by UI collaborators only; none of them changes how
//! the store behaves.

use crate::store::WriteMode;
use confique::Config;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_FILE: &str = "annotations.json";

/// Settings, stored in `dirnotes.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Show annotations in the host UI.
    #[config(default = true)]
    pub enabled: bool,

    /// Label font size in list view.
    #[config(default = 11)]
    pub list_view_font_size: u32,

    /// Label font size in icon view.
    #[config(default = 11)]
    pub icon_view_font_size: u32,

    /// Render titles in bold.
    #[config(default = true)]
    pub use_bold_font: bool,

    /// File name of the persisted mapping inside the data directory.
    #[config(default = "annotations.json")]
    pub data_file: String,

    /// Stage writes in memory until an explicit flush.
    #[config(default = false)]
    pub deferred_writes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            list_view_font_size: 11,
            icon_view_font_size: 11,
            use_bold_font: true,
            data_file: DEFAULT_DATA_FILE.to_string(),
            deferred_writes: false,
        }
    }
}

impl Settings {
    /// Data file name, falling back to the default when blank.
    pub fn data_file(&self) -> &str {
        let name = self.data_file.trim();
        if name.is_empty() {
            DEFAULT_DATA_FILE
        } else {
            name
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        if self.deferred_writes {
            WriteMode::Deferred
        } else {
            WriteMode::Immediate
        }
    }
}
