//! Domain model for banks, registers and addressed cells.
//!
//! # Responsibility
//! - Define identifier encoding shared by every other layer.
//! - Define the in-memory bank shape populated by the format parser.
//!
//! # Invariants
//! - Every cell is identified by a `(bank, register, address)` triple.
//! - Identifier text always goes through `ids` with explicit parameters.

pub mod bank;
pub mod ids;
