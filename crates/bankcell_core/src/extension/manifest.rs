//! Plugin manifest declaration and loading.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

/// Manifest file expected in every plugin directory.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Declarative plugin manifest (`plugins/<dir>/plugin.json`).
///
/// Entry points are paths relative to the plugin directory. Missing keys
/// load as empty strings; an empty `name` excludes the plugin from discovery
/// and an empty entry fails at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: String,
    /// Windows entry, e.g. `run.bat`.
    #[serde(default)]
    pub entry_win: String,
    /// Linux/Unix entry, e.g. `run.sh`.
    #[serde(default)]
    pub entry_lin: String,
    /// Directory the manifest was loaded from.
    #[serde(skip)]
    pub dir: PathBuf,
}

impl PluginManifest {
    /// Reads `<dir>/plugin.json`.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE_NAME);
        if !path.is_file() {
            return Err(ManifestError::Missing(path));
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let mut manifest: Self =
            serde_json::from_str(&text).map_err(|source| ManifestError::Json { path, source })?;
        manifest.dir = dir.to_path_buf();
        Ok(manifest)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyName(self.dir.clone()));
        }
        Ok(())
    }

    /// Entry declared for the platform this binary was built for.
    pub fn entry_for_current_platform(&self) -> &str {
        if cfg!(windows) {
            &self.entry_win
        } else {
            &self.entry_lin
        }
    }

    /// Entry path joined onto the plugin directory; `None` when undeclared.
    pub fn entry_path(&self) -> Option<PathBuf> {
        let entry = self.entry_for_current_platform().trim();
        if entry.is_empty() {
            return None;
        }
        Some(self.dir.join(entry))
    }
}

/// Manifest load and validation errors.
#[derive(Debug)]
pub enum ManifestError {
    Missing(PathBuf),
    Io { path: PathBuf, source: io::Error },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    EmptyName(PathBuf),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "plugin manifest not found: {}", path.display()),
            Self::Io { path, source } => {
                write!(f, "cannot read plugin manifest {}: {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "invalid plugin manifest {}: {source}", path.display())
            }
            Self::EmptyName(dir) => {
                write!(f, "plugin manifest name must not be empty: {}", dir.display())
            }
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Missing(_) | Self::EmptyName(_) => None,
        }
    }
}
