//! Encoding configuration and on-disk layout.
//!
//! # Responsibility
//! - Carry prefix, numeric base and zero-pad widths as plain parameters.
//! - Load and save `config.json` and bootstrap the data directories.
//!
//! # Invariants
//! - A validated config has a base in `2..=36` and an ASCII letter prefix.
//! - No encoding parameter is read from global state.

use crate::model::ids::{
    is_supported_base, parse_integer, render_integer, AddressId, BankId, IdError, RegisterId,
    MAX_BASE, MIN_BASE,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";

/// Encoding parameters threaded into every identifier encode/decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub prefix: char,
    pub base: u32,
    pub width_bank: usize,
    pub width_reg: usize,
    pub width_addr: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: 'x',
            base: 10,
            width_bank: 5,
            width_reg: 2,
            width_addr: 4,
        }
    }
}

impl Config {
    /// Validates encoding parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_supported_base(self.base) {
            return Err(ConfigError::Invalid(format!(
                "base {} is outside {MIN_BASE}..={MAX_BASE}",
                self.base
            )));
        }
        if !self.prefix.is_ascii_alphabetic() {
            return Err(ConfigError::Invalid(format!(
                "prefix `{}` must be an ASCII letter",
                self.prefix
            )));
        }
        Ok(())
    }

    pub fn parse_id(&self, token: &str) -> Result<u64, IdError> {
        parse_integer(token, self.base)
    }

    /// Renders `<prefix><padded bank id>`, e.g. `x00001`.
    pub fn render_bank(&self, id: BankId) -> String {
        format!(
            "{}{}",
            self.prefix,
            render_integer(id, self.base, self.width_bank)
        )
    }

    pub fn render_register(&self, id: RegisterId) -> String {
        render_integer(id, self.base, self.width_reg)
    }

    pub fn render_address(&self, id: AddressId) -> String {
        render_integer(id, self.base, self.width_addr)
    }

    /// Parses a bank name such as `x00001`, `x00001.txt` or `00001`.
    pub fn parse_bank_token(&self, name: &str) -> Result<BankId, IdError> {
        let stem = name.trim();
        let stem = stem.strip_suffix(".txt").unwrap_or(stem);
        let token = stem.strip_prefix(self.prefix).unwrap_or(stem);
        self.parse_id(token)
    }

    /// Loads `path`, writing the defaults there when the file is absent.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(
                "event=config_load module=config status=ok source=default path={}",
                path.display()
            );
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|err| ConfigError::Json {
            path: path.to_path_buf(),
            source: err,
        })?;
        if let Err(err) = config.validate() {
            warn!(
                "event=config_load module=config status=error path={} error={}",
                path.display(),
                err
            );
            return Err(err);
        }
        info!(
            "event=config_load module=config status=ok source=file path={}",
            path.display()
        );
        Ok(config)
    }

    /// Saves pretty-printed JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(|err| ConfigError::Json {
            path: path.to_path_buf(),
            source: err,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ConfigError::Io {
                path: parent.to_path_buf(),
                source: err,
            })?;
        }
        std::fs::write(path, format!("{text}\n")).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })
    }
}

/// Directory layout for banks, exports, plugins and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Bank files and `@file(...)` inclusion root.
    pub root: PathBuf,
    /// Resolved/JSON exports and plugin run directories.
    pub out_dir: PathBuf,
    /// Plugin discovery root.
    pub plugins_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::from_roots(PathBuf::from("files"), PathBuf::from("plugins"))
    }
}

impl Paths {
    /// Anchors `files/` and `plugins/` under `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self::from_roots(base.join("files"), base.join("plugins"))
    }

    pub fn from_roots(root: PathBuf, plugins_dir: PathBuf) -> Self {
        Self {
            out_dir: root.join("out"),
            config_file: root.join(CONFIG_FILE_NAME),
            log_dir: root.join("logs"),
            root,
            plugins_dir,
        }
    }

    /// Creates the bank root and the export directory.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.out_dir)
    }

    /// Canonical bank file, `<root>/<prefix><padded id>.txt`.
    pub fn bank_file(&self, config: &Config, id: BankId) -> PathBuf {
        self.root.join(format!("{}.txt", config.render_bank(id)))
    }

    pub fn resolved_export_file(&self, config: &Config, id: BankId) -> PathBuf {
        self.out_dir
            .join(format!("{}.resolved.txt", config.render_bank(id)))
    }

    pub fn json_export_file(&self, config: &Config, id: BankId) -> PathBuf {
        self.out_dir.join(format!("{}.json", config.render_bank(id)))
    }
}

/// Configuration load/save errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "config io error at `{}`: {source}", path.display()),
            Self::Json { path, source } => {
                write!(f, "config json error at `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}
