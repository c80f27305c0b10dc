//! Recursive reference expansion.

use crate::config::Config;
use crate::model::bank::{CellKey, DEFAULT_REGISTER};
use crate::model::ids::{parse_integer, BankId};
use crate::resolve::scanner::{Rule, Token};
use crate::workspace::{Lookup, Workspace};
use log::debug;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

/// Resolution paused because a referenced bank is not in memory.
///
/// The caller loads the bank (or marks it unavailable) and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedsBank(pub BankId);

impl Display for NeedsBank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "bank {} must be loaded before resolution", self.0)
    }
}

impl Error for NeedsBank {}

/// Read-only reference resolver over one workspace snapshot.
pub struct Resolver<'w> {
    workspace: &'w Workspace,
    config: &'w Config,
    include_root: &'w Path,
    unavailable: Option<&'w BTreeSet<BankId>>,
}

impl<'w> Resolver<'w> {
    /// `include_root` is where `@file(<name>)` looks for `<name>`.
    pub fn new(workspace: &'w Workspace, config: &'w Config, include_root: &'w Path) -> Self {
        Self {
            workspace,
            config,
            include_root,
            unavailable: None,
        }
    }

    /// Banks in `unavailable` resolve as missing instead of `NeedsBank`.
    pub fn with_unavailable(mut self, unavailable: &'w BTreeSet<BankId>) -> Self {
        self.unavailable = Some(unavailable);
        self
    }

    /// Expands every reference in `input`, which lives in `current_bank`.
    ///
    /// Unresolvable fragments become inline markers; the only early exit is
    /// a referenced bank that is not loaded.
    pub fn resolve(&self, input: &str, current_bank: BankId) -> Result<String, NeedsBank> {
        let mut path = Vec::new();
        self.resolve_on_path(input, current_bank, &mut path)
    }

    /// `path` holds the cells currently being expanded, innermost last.
    fn resolve_on_path(
        &self,
        input: &str,
        current_bank: BankId,
        path: &mut Vec<CellKey>,
    ) -> Result<String, NeedsBank> {
        let mut text = input.to_string();
        for rule in Rule::PASSES {
            text = self.apply_pass(rule, &text, current_bank, path)?;
        }
        Ok(text)
    }

    fn apply_pass(
        &self,
        rule: Rule,
        text: &str,
        current_bank: BankId,
        path: &mut Vec<CellKey>,
    ) -> Result<String, NeedsBank> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        while let Some(found) = rule.find(text, last, self.config.prefix) {
            out.push_str(&text[last..found.start]);
            let original = &text[found.start..found.end];
            let replacement = match found.token {
                Token::Verbatim => original.to_string(),
                Token::File { name } => self.include_file(name),
                Token::SameBank { register, address } => {
                    let key = self.parse_id(register).and_then(|register| {
                        let address = self.parse_id(address)?;
                        Some(CellKey::new(current_bank, register, address))
                    });
                    match key {
                        Some(key) => self.expand_cell(original, key, path)?,
                        None => bad_ref(original),
                    }
                }
                Token::Triad {
                    bank,
                    register,
                    address,
                } => match self.parse_triad(bank, register, address, self.config.base) {
                    Some(key) => self.expand_cell(original, key, path)?,
                    None => bad_ref(original),
                },
                Token::TwoPart {
                    letter,
                    bank,
                    address,
                } => {
                    if letter != self.config.prefix {
                        original.to_string()
                    } else {
                        let key = self.parse_id(bank).and_then(|bank| {
                            let address = self.parse_id(address)?;
                            Some(CellKey::new(bank, DEFAULT_REGISTER, address))
                        });
                        match key {
                            Some(key) => self.expand_cell(original, key, path)?,
                            None => bad_ref(original),
                        }
                    }
                }
                Token::Numeric {
                    bank,
                    register,
                    address,
                } => match self.parse_triad(bank, register, address, 10) {
                    Some(key) => self.expand_cell(original, key, path)?,
                    None => bad_ref(original),
                },
            };
            out.push_str(&replacement);
            last = found.end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn parse_id(&self, token: &str) -> Option<u64> {
        parse_integer(token, self.config.base).ok()
    }

    fn parse_triad(&self, bank: &str, register: &str, address: &str, base: u32) -> Option<CellKey> {
        Some(CellKey::new(
            parse_integer(bank, base).ok()?,
            parse_integer(register, base).ok()?,
            parse_integer(address, base).ok()?,
        ))
    }

    fn expand_cell(
        &self,
        original: &str,
        key: CellKey,
        path: &mut Vec<CellKey>,
    ) -> Result<String, NeedsBank> {
        if path.contains(&key) {
            return Ok(format!("[Circular Ref: {original}]"));
        }
        let raw = match self.lookup(key) {
            Lookup::Found(raw) => raw,
            Lookup::Missing => return Ok(format!("[Missing {original}]")),
            Lookup::NotLoaded(bank) => {
                debug!("event=resolve module=resolve status=needs_bank bank={bank}");
                return Err(NeedsBank(bank));
            }
        };

        path.push(key);
        let resolved = self.resolve_on_path(raw, key.bank, path);
        path.pop();
        resolved
    }

    fn lookup(&self, key: CellKey) -> Lookup<'w> {
        match self.workspace.lookup(key) {
            Lookup::NotLoaded(bank)
                if self
                    .unavailable
                    .is_some_and(|unavailable| unavailable.contains(&bank)) =>
            {
                Lookup::Missing
            }
            other => other,
        }
    }

    /// Inlines `<root>/<name>` verbatim. Only the passes after this one see
    /// the included text.
    fn include_file(&self, name: &str) -> String {
        let path = self.include_root.join(name);
        if !path.exists() {
            return format!("[Missing file: {name}]");
        }
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                debug!(
                    "event=resolve module=resolve status=include_failed file={} error={}",
                    path.display(),
                    err
                );
                format!("[Cannot open file: {name}]")
            }
        }
    }
}

fn bad_ref(original: &str) -> String {
    format!("[BadRef {original}]")
}
