//! Repository layer for bank persistence.
//!
//! # Responsibility
//! - Define the persistence contract used by the workspace service.
//! - Isolate file layout and atomic replacement from orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Parse`) in addition
//!   to raw I/O errors.

pub mod bank_repo;
