//! Workspace use-case service.
//!
//! # Responsibility
//! - Own configuration, repository and loaded banks for one data root.
//! - Orchestrate lazy bank loading around the read-only resolver.
//! - Provide open/edit/save/export entry points for callers.
//!
//! # Invariants
//! - A bank is loaded at most once per id; its file header must match the id
//!   it was requested under.
//! - Resolution always yields text: banks that fail to load resolve as
//!   missing.
//! - Edits stay in memory until `save_bank`.

use crate::config::{Config, Paths};
use crate::extension::kernel::CellSource;
use crate::format::write_bank_text;
use crate::model::bank::{Bank, CellKey};
use crate::model::ids::{AddressId, BankId, IdError, RegisterId};
use crate::repo::bank_repo::{BankRepository, FileBankRepository, RepoError};
use crate::resolve::{NeedsBank, Resolver};
use crate::service::export::BankExport;
use crate::workspace::Workspace;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Errors from workspace service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Bank name or id token does not parse.
    InvalidId { token: String, source: IdError },
    /// Operation needs a bank that is not in memory.
    BankNotLoaded(BankId),
    /// Canonical file holds a different bank id than requested.
    IdMismatch { expected: BankId, found: BankId },
    Repo(RepoError),
    Io { path: PathBuf, source: io::Error },
    Json(serde_json::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId { token, source } => write!(f, "bad context id `{token}`: {source}"),
            Self::BankNotLoaded(id) => write!(f, "bank {id} is not loaded"),
            Self::IdMismatch { expected, found } => write!(
                f,
                "bank file for id {expected} declares id {found} in its header"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json(err) => write!(f, "json export failed: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidId { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::BankNotLoaded(_) | Self::IdMismatch { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Result of opening a bank by name.
#[derive(Debug)]
pub enum OpenOutcome {
    /// Existing file parsed into the workspace.
    Opened { id: BankId, path: PathBuf },
    /// New empty bank created and written.
    Created { id: BankId, path: PathBuf },
    /// New bank kept in memory only; the initial save failed.
    CreatedUnsaved {
        id: BankId,
        path: PathBuf,
        error: RepoError,
    },
}

impl OpenOutcome {
    pub fn id(&self) -> BankId {
        match self {
            Self::Opened { id, .. } | Self::Created { id, .. } | Self::CreatedUnsaved { id, .. } => {
                *id
            }
        }
    }
}

impl Display for OpenOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened { path, .. } => write!(f, "Opened {}", path.display()),
            Self::Created { path, .. } => write!(f, "Created new context: {}", path.display()),
            Self::CreatedUnsaved { path, error, .. } => write!(
                f,
                "Created new context (not written): {} ({error})",
                path.display()
            ),
        }
    }
}

/// Workspace facade over one repository.
pub struct WorkspaceService<R: BankRepository> {
    config: Config,
    paths: Paths,
    repo: R,
    workspace: Workspace,
}

impl WorkspaceService<FileBankRepository> {
    /// Creates a service backed by canonical bank files under `paths.root`.
    pub fn with_files(config: Config, paths: Paths) -> Self {
        let repo = FileBankRepository::new(config.clone(), paths.clone());
        Self::new(config, paths, repo)
    }
}

impl<R: BankRepository> WorkspaceService<R> {
    pub fn new(config: Config, paths: Paths, repo: R) -> Self {
        Self {
            config,
            paths,
            repo,
            workspace: Workspace::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Parses a bank name such as `x00001` or `x00001.txt`.
    pub fn parse_bank_name(&self, name: &str) -> Result<BankId, ServiceError> {
        self.config
            .parse_bank_token(name)
            .map_err(|source| ServiceError::InvalidId {
                token: name.to_string(),
                source,
            })
    }

    /// Loads a bank from its canonical file, or creates a new titled bank.
    ///
    /// An existing file is re-read even when the bank is already loaded. A
    /// new bank whose first save fails stays available in memory.
    pub fn open_bank(&mut self, name: &str) -> Result<OpenOutcome, ServiceError> {
        let id = self.parse_bank_name(name)?;
        let stem = name.trim();
        let stem = stem.strip_suffix(".txt").unwrap_or(stem).to_string();
        let path = self.repo.canonical_path(id);

        if self.repo.bank_exists(id) {
            let mut bank = self.load_checked(id)?;
            if bank.title.is_empty() {
                bank.title = stem;
            }
            self.workspace.insert_bank(bank, Some(path.clone()));
            info!(
                "event=bank_open module=service status=ok mode=file bank={}",
                self.config.render_bank(id)
            );
            return Ok(OpenOutcome::Opened { id, path });
        }

        let bank = Bank::new(id, stem);
        let outcome = match self.repo.save_bank(&bank) {
            Ok(path) => {
                self.workspace.insert_bank(bank, Some(path.clone()));
                OpenOutcome::Created { id, path }
            }
            Err(error) => {
                warn!(
                    "event=bank_open module=service status=degraded bank={} error={}",
                    self.config.render_bank(id),
                    error
                );
                self.workspace.insert_bank(bank, None);
                OpenOutcome::CreatedUnsaved { id, path, error }
            }
        };
        info!(
            "event=bank_open module=service status=ok mode=create bank={}",
            self.config.render_bank(id)
        );
        Ok(outcome)
    }

    /// Loads `id` from its canonical file unless it is already in memory.
    pub fn ensure_loaded(&mut self, id: BankId) -> Result<(), ServiceError> {
        if self.workspace.contains(id) {
            return Ok(());
        }
        let bank = self.load_checked(id)?;
        let path = self.repo.canonical_path(id);
        self.workspace.insert_bank(bank, Some(path));
        Ok(())
    }

    /// Loads every canonical bank file under the root. Returns the number of
    /// banks in memory afterwards; unreadable files are logged and skipped.
    pub fn preload_all(&mut self) -> Result<usize, ServiceError> {
        for id in self.repo.list_bank_ids()? {
            if let Err(err) = self.ensure_loaded(id) {
                warn!(
                    "event=bank_preload module=service status=skipped bank={} error={}",
                    self.config.render_bank(id),
                    err
                );
            }
        }
        Ok(self.workspace.len())
    }

    /// Inserts or overwrites one value in a loaded bank.
    pub fn insert_value(
        &mut self,
        bank: BankId,
        register: RegisterId,
        address: AddressId,
        value: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let target = self
            .workspace
            .bank_mut(bank)
            .ok_or(ServiceError::BankNotLoaded(bank))?;
        target.insert(register, address, value);
        Ok(())
    }

    /// Deletes one value from a loaded bank; `None` when it did not exist.
    pub fn delete_value(
        &mut self,
        bank: BankId,
        register: RegisterId,
        address: AddressId,
    ) -> Result<Option<String>, ServiceError> {
        let target = self
            .workspace
            .bank_mut(bank)
            .ok_or(ServiceError::BankNotLoaded(bank))?;
        Ok(target.remove(register, address))
    }

    /// Persists a loaded bank at its canonical path.
    pub fn save_bank(&mut self, id: BankId) -> Result<PathBuf, ServiceError> {
        let bank = self
            .workspace
            .bank(id)
            .ok_or(ServiceError::BankNotLoaded(id))?;
        let path = self.repo.save_bank(bank)?;
        self.workspace.set_origin(id, path.clone());
        Ok(path)
    }

    /// Merges every cell of the bank file at `path` into loaded bank `id`.
    /// Returns the number of merged cells.
    pub fn merge_file(&mut self, id: BankId, path: &Path) -> Result<usize, ServiceError> {
        let incoming = self.repo.load_file(path)?;
        let target = self
            .workspace
            .bank_mut(id)
            .ok_or(ServiceError::BankNotLoaded(id))?;
        target.merge_from(&incoming);
        Ok(incoming.cell_count())
    }

    /// Serialized text of a loaded bank, unresolved.
    pub fn bank_text(&self, id: BankId) -> Option<String> {
        self.workspace
            .bank(id)
            .map(|bank| write_bank_text(bank, &self.config))
    }

    /// Resolves `input` as if it lived in `bank`.
    ///
    /// Each referenced bank that is not in memory gets one load attempt; a
    /// failed load makes its cells resolve as missing.
    pub fn resolve_text(&mut self, input: &str, bank: BankId) -> String {
        let started_at = Instant::now();
        let mut unavailable = BTreeSet::new();
        loop {
            let attempt = Resolver::new(&self.workspace, &self.config, &self.paths.root)
                .with_unavailable(&unavailable)
                .resolve(input, bank);
            match attempt {
                Ok(resolved) => {
                    debug!(
                        "event=resolve module=service status=ok bank={} unavailable={} duration_ms={}",
                        self.config.render_bank(bank),
                        unavailable.len(),
                        started_at.elapsed().as_millis()
                    );
                    return resolved;
                }
                Err(NeedsBank(id)) => {
                    if let Err(err) = self.ensure_loaded(id) {
                        debug!(
                            "event=resolve module=service status=bank_unavailable bank={} error={}",
                            self.config.render_bank(id),
                            err
                        );
                        unavailable.insert(id);
                    }
                }
            }
        }
    }

    /// Resolved value of one cell, loading its bank if needed.
    pub fn resolve_cell(&mut self, key: CellKey) -> Option<String> {
        let _ = self.ensure_loaded(key.bank);
        let raw = self
            .workspace
            .bank(key.bank)?
            .get(key.register, key.address)?
            .to_string();
        Some(self.resolve_text(&raw, key.bank))
    }

    /// Title of a bank, loading it if needed.
    pub fn bank_title(&mut self, id: BankId) -> Option<String> {
        let _ = self.ensure_loaded(id);
        self.workspace.bank(id).map(|bank| bank.title.clone())
    }

    /// Copy of bank `id` with every value fully resolved.
    pub fn resolved_bank(&mut self, id: BankId) -> Result<Bank, ServiceError> {
        self.ensure_loaded(id)?;
        let source = self
            .workspace
            .bank(id)
            .ok_or(ServiceError::BankNotLoaded(id))?;
        let mut resolved = Bank::new(source.id, source.title.clone());
        let cells: Vec<(RegisterId, AddressId, String)> = source
            .cells()
            .map(|(register, address, value)| (register, address, value.to_string()))
            .collect();

        for (register, address, raw) in cells {
            let value = self.resolve_text(&raw, id);
            resolved.insert(register, address, value);
        }
        Ok(resolved)
    }

    /// Resolved export in the bank text format.
    pub fn resolved_bank_text(&mut self, id: BankId) -> Result<String, ServiceError> {
        let resolved = self.resolved_bank(id)?;
        Ok(write_bank_text(&resolved, &self.config))
    }

    /// Resolved export as pretty JSON.
    pub fn export_json(&mut self, id: BankId) -> Result<String, ServiceError> {
        let resolved = self.resolved_bank(id)?;
        let export = BankExport::from_resolved(&resolved, &self.config);
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Writes `<out>/<bank>.resolved.txt`.
    pub fn write_resolved_export(&mut self, id: BankId) -> Result<PathBuf, ServiceError> {
        let text = self.resolved_bank_text(id)?;
        let path = self.paths.resolved_export_file(&self.config, id);
        write_output(&path, &text)?;
        Ok(path)
    }

    /// Writes `<out>/<bank>.json`.
    pub fn write_json_export(&mut self, id: BankId) -> Result<PathBuf, ServiceError> {
        let mut text = self.export_json(id)?;
        text.push('\n');
        let path = self.paths.json_export_file(&self.config, id);
        write_output(&path, &text)?;
        Ok(path)
    }

    fn load_checked(&self, id: BankId) -> Result<Bank, ServiceError> {
        let bank = self.repo.load_bank(id)?;
        if bank.id != id {
            return Err(ServiceError::IdMismatch {
                expected: id,
                found: bank.id,
            });
        }
        Ok(bank)
    }
}

impl<R: BankRepository> CellSource for WorkspaceService<R> {
    fn config(&self) -> &Config {
        &self.config
    }

    fn out_dir(&self) -> &Path {
        &self.paths.out_dir
    }

    fn resolve_cell(&mut self, key: CellKey) -> Option<String> {
        WorkspaceService::resolve_cell(self, key)
    }

    fn bank_title(&mut self, bank: BankId) -> Option<String> {
        WorkspaceService::bank_title(self, bank)
    }
}

fn write_output(path: &Path, text: &str) -> Result<(), ServiceError> {
    let io_err = |path: &Path, source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| io_err(parent, err))?;
    }
    std::fs::write(path, text).map_err(|err| io_err(path, err))
}
