//! Export document shapes.
//!
//! # Responsibility
//! - Describe the JSON export of one resolved bank.
//!
//! # Invariants
//! - Ids are rendered with the configured prefix, base and widths.
//! - Registers and addresses appear in ascending id order.

use crate::config::Config;
use crate::model::bank::Bank;
use serde::Serialize;

/// `{bank, title, registers: [{id, addresses: [{id, value}]}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankExport {
    pub bank: String,
    pub title: String,
    pub registers: Vec<RegisterExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterExport {
    pub id: String,
    pub addresses: Vec<AddressExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressExport {
    pub id: String,
    pub value: String,
}

impl BankExport {
    /// Builds the export from a bank whose values are already resolved.
    pub fn from_resolved(bank: &Bank, config: &Config) -> Self {
        Self {
            bank: config.render_bank(bank.id),
            title: bank.title.clone(),
            registers: bank
                .registers
                .iter()
                .map(|(register, addresses)| RegisterExport {
                    id: config.render_register(*register),
                    addresses: addresses
                        .iter()
                        .map(|(address, value)| AddressExport {
                            id: config.render_address(*address),
                            value: value.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
