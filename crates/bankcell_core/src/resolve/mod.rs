//! Reference resolution over loaded banks.
//!
//! # Responsibility
//! - Expand embedded references into the referenced cells' resolved text.
//! - Report unresolvable fragments inline instead of failing.
//!
//! # Invariants
//! - Resolution never mutates the workspace; an unloaded bank surfaces as
//!   `NeedsBank` so the caller can load it and retry.
//! - Cycle detection is per path: a cell already being expanded on the
//!   current branch yields `[Circular Ref: ...]`; sibling references to the
//!   same cell both expand.
//! - Syntaxes are applied as five whole-string passes in fixed order:
//!   `@file(...)`, `r<reg>.<addr>`, `<prefix><bank>.<reg>.<addr>`,
//!   `<prefix><bank>.<addr>`, `<d>.<d>.<d>`. Later passes see earlier output.
//!
//! # Markers
//! - `[Missing <token>]`, `[BadRef <token>]`, `[Circular Ref: <token>]`
//! - `[Missing file: <name>]`, `[Cannot open file: <name>]`

mod resolver;
mod scanner;

pub use resolver::{NeedsBank, Resolver};
