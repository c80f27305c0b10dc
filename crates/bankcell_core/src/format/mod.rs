//! Line-oriented bank text format.
//!
//! # Responsibility
//! - Parse bank files into `Bank` values.
//! - Serialize banks back to text.
//!
//! # Invariants
//! - `parse(write(bank))` reproduces every `(register, address) -> value`.
//! - Parse errors abort only the file being parsed.
//!
//! # Format
//! ```text
//! x00001	(demo){
//! 	0001	Hello
//! 02
//! 	0003	World
//! }
//! ```

use crate::model::ids::IdError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod parser;
mod writer;

pub use parser::parse_bank_text;
pub use writer::write_bank_text;

/// Fatal bank-file parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    EmptyInput,
    MissingHeader,
    MissingBraceAfterHeader,
    MalformedHeader(String),
    InvalidBankId { token: String, source: IdError },
    InvalidRegisterLine { line: String, source: IdError },
    InvalidAddressId { token: String, source: IdError },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty file"),
            Self::MissingHeader => write!(f, "no header found"),
            Self::MissingBraceAfterHeader => write!(f, "missing '{{' after header"),
            Self::MalformedHeader(header) => {
                write!(f, "malformed header (parentheses): {header}")
            }
            Self::InvalidBankId { token, source } => {
                write!(f, "cannot parse bank id `{token}`: {source}")
            }
            Self::InvalidRegisterLine { line, source } => {
                write!(f, "invalid register line `{line}`: {source}")
            }
            Self::InvalidAddressId { token, source } => {
                write!(f, "invalid address id `{token}`: {source}")
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidBankId { source, .. }
            | Self::InvalidRegisterLine { source, .. }
            | Self::InvalidAddressId { source, .. } => Some(source),
            _ => None,
        }
    }
}
