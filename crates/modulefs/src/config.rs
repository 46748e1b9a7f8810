//! Provider configuration.
//!
//! Loaded from RON, e.g.:
//!
//! ```ron
//! (
//!     fetch_policy: Strict,
//!     archive_suffixes: [".jar"],
//!     image_root: Some("/opt/runtime/image"),
//!     boot_layer: (
//!         modules: [
//!             (name: "com.example.app", location: Some("file:///opt/app/app.jar")),
//!         ],
//!     ),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ModuleFsResult;
use crate::layer::ModuleLayer;

/// Miss handling when fetching an existing filesystem by address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPolicy {
    /// Fail with not-found when no open filesystem is registered.
    #[default]
    Strict,
    /// Construct and register the filesystem on a miss.
    CreateOnMiss,
}

/// Configuration for a [`ModuleFsProvider`](crate::ModuleFsProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleFsConfig {
    /// How `get_file_system` treats a registry miss.
    pub fetch_policy: FetchPolicy,
    /// Location path suffixes claimed by the archive backend.
    pub archive_suffixes: Vec<String>,
    /// Location scheme claimed by the module image backend.
    pub image_scheme: String,
    /// Location scheme of plain file paths.
    pub directory_scheme: String,
    /// Directory holding `modules/<name>/…`, opened as the module image
    /// when no image backend is injected.
    pub image_root: Option<PathBuf>,
    /// Module graph used when a request supplies neither a layer nor a
    /// location.
    pub boot_layer: ModuleLayer,
}

impl Default for ModuleFsConfig {
    fn default() -> Self {
        Self {
            fetch_policy: FetchPolicy::Strict,
            archive_suffixes: vec![".jar".to_string(), ".zip".to_string()],
            image_scheme: "jrt".to_string(),
            directory_scheme: "file".to_string(),
            image_root: None,
            boot_layer: ModuleLayer::default(),
        }
    }
}

impl ModuleFsConfig {
    /// Parse RON text. Missing fields take their defaults.
    pub fn from_ron(text: &str) -> ModuleFsResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Load a RON file.
    pub fn load(path: impl AsRef<Path>) -> ModuleFsResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&text)
    }

    /// Returns true if `path` ends with one of the archive suffixes.
    pub fn is_archive_path(&self, path: &str) -> bool {
        self.archive_suffixes
            .iter()
            .any(|suffix| path.len() > suffix.len() && path.ends_with(suffix.as_str()))
    }
}
