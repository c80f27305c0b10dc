//! Identifier encoding in a configurable numeric base.
//!
//! # Responsibility
//! - Parse bank/register/address tokens into integers.
//! - Render integers back to zero-padded text.
//!
//! # Invariants
//! - Parsing is case-insensitive over `0-9A-Za-z`.
//! - Rendering uses the lowercase alphabet and never truncates.
//! - `parse_integer(render_integer(v, base, w), base) == v` for every base in
//!   `2..=36`.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Bank identifier.
pub type BankId = u64;
/// Register identifier within one bank.
pub type RegisterId = u64;
/// Address identifier within one register.
pub type AddressId = u64;

/// Smallest supported numeric base.
pub const MIN_BASE: u32 = 2;
/// Largest supported numeric base (`0-9` plus `a-z`).
pub const MAX_BASE: u32 = 36;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    EmptyToken,
    InvalidDigit { token: String, digit: char },
    Overflow(String),
    UnsupportedBase(u32),
}

impl Display for IdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyToken => write!(f, "identifier token must not be empty"),
            Self::InvalidDigit { token, digit } => {
                write!(f, "invalid digit `{digit}` in identifier `{token}`")
            }
            Self::Overflow(token) => write!(f, "identifier `{token}` is out of range"),
            Self::UnsupportedBase(base) => write!(
                f,
                "numeric base {base} is unsupported (expected {MIN_BASE}..={MAX_BASE})"
            ),
        }
    }
}

impl Error for IdError {}

/// Returns whether `base` can be used for encoding.
pub fn is_supported_base(base: u32) -> bool {
    (MIN_BASE..=MAX_BASE).contains(&base)
}

/// Parses `text` as a non-negative integer in `base`.
///
/// # Errors
/// - `EmptyToken` for an empty string.
/// - `InvalidDigit` when a character is not a digit of `base`.
/// - `Overflow` when the value does not fit in `u64`.
pub fn parse_integer(text: &str, base: u32) -> Result<u64, IdError> {
    if !is_supported_base(base) {
        return Err(IdError::UnsupportedBase(base));
    }
    if text.is_empty() {
        return Err(IdError::EmptyToken);
    }

    let mut value: u64 = 0;
    for ch in text.chars() {
        let digit = ch
            .to_digit(MAX_BASE)
            .filter(|digit| *digit < base)
            .ok_or_else(|| IdError::InvalidDigit {
                token: text.to_string(),
                digit: ch,
            })?;
        value = value
            .checked_mul(u64::from(base))
            .and_then(|shifted| shifted.checked_add(u64::from(digit)))
            .ok_or_else(|| IdError::Overflow(text.to_string()))?;
    }
    Ok(value)
}

/// Renders `value` in `base`, left-padded with `0` to `min_width`.
///
/// An unsupported base falls back to base 10; `Config::validate` keeps that
/// path unreachable for configured callers.
pub fn render_integer(value: u64, base: u32, min_width: usize) -> String {
    let base = if is_supported_base(base) { base } else { 10 };
    let radix = u64::from(base);

    let mut digits = Vec::new();
    let mut rest = value;
    loop {
        digits.push(DIGITS[(rest % radix) as usize]);
        rest /= radix;
        if rest == 0 {
            break;
        }
    }
    while digits.len() < min_width {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
