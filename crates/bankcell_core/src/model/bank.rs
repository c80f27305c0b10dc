//! Bank domain model.
//!
//! # Responsibility
//! - Hold one bank's title and its register -> address -> value mapping.
//! - Provide the canonical cell key used by resolution.
//!
//! # Invariants
//! - `(register, address)` identifies at most one value inside a bank.
//! - Register 1 is the default register for unmarked entries.
//! - Removing the last address of a register drops the register.

use crate::model::ids::{AddressId, BankId, RegisterId};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Register used for entries that appear before any register marker.
pub const DEFAULT_REGISTER: RegisterId = 1;

/// Address -> value mapping of one register.
pub type Register = BTreeMap<AddressId, String>;

/// Canonical identity of one cell across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub bank: BankId,
    pub register: RegisterId,
    pub address: AddressId,
}

impl CellKey {
    pub fn new(bank: BankId, register: RegisterId, address: AddressId) -> Self {
        Self {
            bank,
            register,
            address,
        }
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.bank, self.register, self.address)
    }
}

/// Titled container of registers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bank {
    pub id: BankId,
    pub title: String,
    pub registers: BTreeMap<RegisterId, Register>,
}

impl Bank {
    /// Creates an empty bank.
    pub fn new(id: BankId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            registers: BTreeMap::new(),
        }
    }

    /// Inserts or overwrites one value.
    pub fn insert(&mut self, register: RegisterId, address: AddressId, value: impl Into<String>) {
        self.registers
            .entry(register)
            .or_default()
            .insert(address, value.into());
    }

    /// Removes one value, dropping the register when it becomes empty.
    pub fn remove(&mut self, register: RegisterId, address: AddressId) -> Option<String> {
        let addresses = self.registers.get_mut(&register)?;
        let removed = addresses.remove(&address);
        if addresses.is_empty() {
            self.registers.remove(&register);
        }
        removed
    }

    pub fn get(&self, register: RegisterId, address: AddressId) -> Option<&str> {
        self.registers
            .get(&register)
            .and_then(|addresses| addresses.get(&address))
            .map(String::as_str)
    }

    /// A bank with no registers, or only empty ones, is empty.
    pub fn is_empty(&self) -> bool {
        self.registers.values().all(BTreeMap::is_empty)
    }

    pub fn cell_count(&self) -> usize {
        self.registers.values().map(BTreeMap::len).sum()
    }

    /// Iterates `(register, address, value)` in ascending key order.
    pub fn cells(&self) -> impl Iterator<Item = (RegisterId, AddressId, &str)> {
        self.registers.iter().flat_map(|(register, addresses)| {
            addresses
                .iter()
                .map(move |(address, value)| (*register, *address, value.as_str()))
        })
    }

    /// Copies every cell of `other` over this bank.
    ///
    /// The title of `other` is adopted only when this bank has none.
    pub fn merge_from(&mut self, other: &Bank) {
        for (register, address, value) in other.cells() {
            self.insert(register, address, value);
        }
        if self.title.is_empty() {
            self.title = other.title.clone();
        }
    }

    /// Compact serialization applies when only register 1 (or nothing) exists.
    pub fn is_single_default_register(&self) -> bool {
        match self.registers.len() {
            0 => true,
            1 => self.registers.contains_key(&DEFAULT_REGISTER),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Bank, CellKey};

    #[test]
    fn insert_overwrites_existing_value() {
        let mut bank = Bank::new(1, "demo");
        bank.insert(1, 1, "first");
        bank.insert(1, 1, "second");
        assert_eq!(bank.get(1, 1), Some("second"));
        assert_eq!(bank.cell_count(), 1);
    }

    #[test]
    fn remove_drops_empty_register() {
        let mut bank = Bank::new(1, "demo");
        bank.insert(2, 3, "value");
        assert_eq!(bank.remove(2, 3).as_deref(), Some("value"));
        assert!(bank.registers.is_empty());
        assert!(bank.remove(2, 3).is_none());
    }

    #[test]
    fn empty_registers_count_as_empty_bank() {
        let mut bank = Bank::new(1, "demo");
        assert!(bank.is_empty());
        bank.registers.insert(4, Default::default());
        assert!(bank.is_empty());
        bank.insert(4, 1, "v");
        assert!(!bank.is_empty());
    }

    #[test]
    fn merge_keeps_own_title_when_present() {
        let mut target = Bank::new(1, "");
        target.insert(1, 1, "old");
        let mut other = Bank::new(9, "other");
        other.insert(1, 1, "new");
        other.insert(2, 5, "extra");

        target.merge_from(&other);
        assert_eq!(target.title, "other");
        assert_eq!(target.get(1, 1), Some("new"));
        assert_eq!(target.get(2, 5), Some("extra"));

        let mut titled = Bank::new(2, "mine");
        titled.merge_from(&other);
        assert_eq!(titled.title, "mine");
    }

    #[test]
    fn cell_key_renders_decimal_triple() {
        assert_eq!(CellKey::new(1, 2, 3).to_string(), "1.2.3");
    }
}
