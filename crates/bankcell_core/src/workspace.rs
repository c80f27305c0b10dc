//! In-memory set of loaded banks.
//!
//! # Responsibility
//! - Own every loaded `Bank` keyed by id, plus where each one came from.
//! - Answer cell lookups without side effects.
//!
//! # Invariants
//! - At most one bank per id.
//! - `lookup` never loads or mutates; an unloaded bank is reported as such.

use crate::model::bank::{Bank, CellKey};
use crate::model::ids::BankId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of a single cell lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a str),
    /// The bank is not in memory yet; the caller decides whether to load it.
    NotLoaded(BankId),
    Missing,
}

#[derive(Debug, Default)]
pub struct Workspace {
    banks: BTreeMap<BankId, Bank>,
    origins: BTreeMap<BankId, PathBuf>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a bank, recording its origin when known.
    pub fn insert_bank(&mut self, bank: Bank, origin: Option<PathBuf>) {
        let id = bank.id;
        self.banks.insert(id, bank);
        match origin {
            Some(path) => {
                self.origins.insert(id, path);
            }
            None => {
                self.origins.remove(&id);
            }
        }
    }

    pub fn contains(&self, id: BankId) -> bool {
        self.banks.contains_key(&id)
    }

    pub fn bank(&self, id: BankId) -> Option<&Bank> {
        self.banks.get(&id)
    }

    pub fn bank_mut(&mut self, id: BankId) -> Option<&mut Bank> {
        self.banks.get_mut(&id)
    }

    pub fn banks(&self) -> impl Iterator<Item = &Bank> {
        self.banks.values()
    }

    pub fn ids(&self) -> Vec<BankId> {
        self.banks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// File a bank was loaded from or saved to (diagnostics only).
    pub fn origin(&self, id: BankId) -> Option<&Path> {
        self.origins.get(&id).map(PathBuf::as_path)
    }

    pub fn set_origin(&mut self, id: BankId, path: PathBuf) {
        self.origins.insert(id, path);
    }

    pub fn lookup(&self, key: CellKey) -> Lookup<'_> {
        match self.banks.get(&key.bank) {
            None => Lookup::NotLoaded(key.bank),
            Some(bank) => bank
                .get(key.register, key.address)
                .map_or(Lookup::Missing, Lookup::Found),
        }
    }
}
