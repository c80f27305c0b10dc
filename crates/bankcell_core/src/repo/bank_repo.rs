//! Bank repository contracts and file-backed implementation.
//!
//! # Responsibility
//! - Map bank ids to canonical files and move banks between disk and memory.
//! - Keep the temporary-file replacement protocol inside one place.
//!
//! # Invariants
//! - Saves never leave a half-written target: content lands in `<target>.tmp`
//!   first and replaces the target by rename (copy + delete as fallback).
//! - Load failures carry the path and the underlying message.

use crate::config::{Config, Paths};
use crate::format::{parse_bank_text, write_bank_text, ParseError};
use crate::model::bank::Bank;
use crate::model::ids::BankId;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Bank persistence errors.
#[derive(Debug)]
pub enum RepoError {
    NotFound(PathBuf),
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: ParseError },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "parse failed for {}: {source}", path.display())
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Repository interface for bank persistence.
pub trait BankRepository {
    /// Canonical location of one bank.
    fn canonical_path(&self, id: BankId) -> PathBuf;
    fn bank_exists(&self, id: BankId) -> bool;
    fn load_bank(&self, id: BankId) -> RepoResult<Bank>;
    /// Reads and parses an arbitrary bank file.
    fn load_file(&self, path: &Path) -> RepoResult<Bank>;
    /// Persists `bank` at its canonical path and returns that path.
    fn save_bank(&self, bank: &Bank) -> RepoResult<PathBuf>;
    /// Ids of every canonical bank file found under the root, ascending.
    fn list_bank_ids(&self) -> RepoResult<Vec<BankId>>;
}

/// Bank files stored as `<root>/<prefix><padded id>.txt`.
#[derive(Debug, Clone)]
pub struct FileBankRepository {
    config: Config,
    paths: Paths,
}

impl FileBankRepository {
    pub fn new(config: Config, paths: Paths) -> Self {
        Self { config, paths }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl BankRepository for FileBankRepository {
    fn canonical_path(&self, id: BankId) -> PathBuf {
        self.paths.bank_file(&self.config, id)
    }

    fn bank_exists(&self, id: BankId) -> bool {
        self.canonical_path(id).is_file()
    }

    fn load_bank(&self, id: BankId) -> RepoResult<Bank> {
        self.load_file(&self.canonical_path(id))
    }

    fn load_file(&self, path: &Path) -> RepoResult<Bank> {
        let started_at = Instant::now();
        if !path.exists() {
            return Err(RepoError::NotFound(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|err| RepoError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        match parse_bank_text(&text, &self.config) {
            Ok(bank) => {
                info!(
                    "event=bank_load module=repo status=ok bank={} cells={} duration_ms={}",
                    self.config.render_bank(bank.id),
                    bank.cell_count(),
                    started_at.elapsed().as_millis()
                );
                Ok(bank)
            }
            Err(err) => {
                warn!(
                    "event=bank_load module=repo status=error path={} error={}",
                    path.display(),
                    err
                );
                Err(RepoError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    fn save_bank(&self, bank: &Bank) -> RepoResult<PathBuf> {
        let path = self.canonical_path(bank.id);
        let text = write_bank_text(bank, &self.config);
        match write_atomically(&path, &text) {
            Ok(()) => {
                info!(
                    "event=bank_save module=repo status=ok bank={} cells={}",
                    self.config.render_bank(bank.id),
                    bank.cell_count()
                );
                Ok(path)
            }
            Err(err) => {
                error!(
                    "event=bank_save module=repo status=error bank={} error={}",
                    self.config.render_bank(bank.id),
                    err
                );
                Err(err)
            }
        }
    }

    fn list_bank_ids(&self) -> RepoResult<Vec<BankId>> {
        let entries = match fs::read_dir(&self.paths.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(RepoError::Io {
                    path: self.paths.root.clone(),
                    source: err,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Some(token) = stem.strip_prefix(self.config.prefix) else {
                continue;
            };
            if let Ok(id) = self.config.parse_id(token) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

/// Writes `<path>.tmp`, then replaces `path` with it.
fn write_atomically(path: &Path, text: &str) -> RepoResult<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| RepoError::Io { path, source }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, text).map_err(io_err(&tmp))?;

    if let Err(rename_err) = fs::rename(&tmp, path) {
        warn!(
            "event=bank_save module=repo status=fallback path={} error={}",
            path.display(),
            rename_err
        );
        let copied = fs::copy(&tmp, path);
        let _ = fs::remove_file(&tmp);
        copied.map_err(io_err(path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_atomically, BankRepository, FileBankRepository, RepoError};
    use crate::config::{Config, Paths};
    use crate::model::bank::Bank;
    use std::fs;

    fn repo_in(dir: &std::path::Path) -> FileBankRepository {
        FileBankRepository::new(Config::default(), Paths::under(dir))
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo_in(dir.path());

        let mut bank = Bank::new(1, "demo");
        bank.insert(1, 1, "Hello");
        bank.insert(2, 3, "World");
        let path = repo.save_bank(&bank).expect("save bank");
        assert!(path.ends_with("files/x00001.txt"));
        assert!(repo.bank_exists(1));

        let loaded = repo.load_bank(1).expect("load bank");
        assert_eq!(loaded, bank);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("nested").join("x00001.txt");
        write_atomically(&target, "first").expect("first write");
        write_atomically(&target, "second").expect("replace");

        assert_eq!(fs::read_to_string(&target).expect("read"), "second");
        assert!(!dir.path().join("nested").join("x00001.txt.tmp").exists());
    }

    #[test]
    fn load_missing_bank_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = repo_in(dir.path()).load_bank(42).expect_err("missing bank");
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[test]
    fn load_malformed_bank_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo_in(dir.path());
        fs::create_dir_all(dir.path().join("files")).expect("root");
        fs::write(repo.canonical_path(3), "x00003 (t)\n").expect("write");

        let err = repo.load_bank(3).expect_err("malformed bank");
        assert!(matches!(err, RepoError::Parse { .. }));
        assert!(err.to_string().contains("missing '{'"));
    }

    #[test]
    fn lists_only_prefixed_bank_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo_in(dir.path());
        let root = dir.path().join("files");
        fs::create_dir_all(&root).expect("root");
        for name in ["x00002.txt", "x00001.txt", "y00003.txt", "x00004.json", "xzz.txt"] {
            fs::write(root.join(name), "").expect("write");
        }

        assert_eq!(repo.list_bank_ids().expect("list"), vec![1, 2]);
    }

    #[test]
    fn lists_nothing_when_root_is_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo_in(&dir.path().join("missing"));
        assert!(repo.list_bank_ids().expect("list").is_empty());
    }
}
