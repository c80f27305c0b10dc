//! Bank text parser.

use crate::config::Config;
use crate::format::ParseError;
use crate::model::bank::{Bank, DEFAULT_REGISTER};

const BOM: char = '\u{feff}';

/// Parses one bank file.
///
/// Header lines are accumulated until a `{` appears; the body ends at the
/// first line containing `}` (or at end of input).
///
/// # Errors
/// Returns the first structural problem found; nothing is partially returned.
pub fn parse_bank_text(text: &str, config: &Config) -> Result<Bank, ParseError> {
    let content = text.strip_prefix(BOM).unwrap_or(text);
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let header_line = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .ok_or(ParseError::MissingHeader)?;

    let mut header = lines[header_line].trim().to_string();
    let mut next = header_line + 1;
    while !header.contains('{') && next < lines.len() {
        header.push(' ');
        header.push_str(lines[next].trim());
        next += 1;
    }
    if !header.contains('{') {
        return Err(ParseError::MissingBraceAfterHeader);
    }

    let (bank_token, title) = split_header(&header)?;
    let bank_token = bank_token.strip_prefix(config.prefix).unwrap_or(bank_token);
    let id = config
        .parse_id(bank_token)
        .map_err(|source| ParseError::InvalidBankId {
            token: bank_token.to_string(),
            source,
        })?;
    let mut bank = Bank::new(id, title);

    // The brace line is known to exist: accumulation stopped on it.
    let body_start = lines[header_line..]
        .iter()
        .position(|line| line.contains('{'))
        .map(|offset| header_line + offset + 1)
        .ok_or(ParseError::MissingBraceAfterHeader)?;

    let mut current_register = DEFAULT_REGISTER;
    for line in &lines[body_start..] {
        if line.contains('}') {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(['\t', ' ']) {
            let token = line.trim();
            current_register = config
                .parse_id(token)
                .map_err(|source| ParseError::InvalidRegisterLine {
                    line: token.to_string(),
                    source,
                })?;
            continue;
        }

        let entry = line.trim_start_matches(['\t', ' ']);
        let (address_token, value) = split_entry(entry);
        let address = config
            .parse_id(address_token)
            .map_err(|source| ParseError::InvalidAddressId {
                token: address_token.to_string(),
                source,
            })?;
        bank.insert(current_register, address, value);
    }

    Ok(bank)
}

/// Splits `<bank>(<title>){` into the trimmed bank token and title.
fn split_header(header: &str) -> Result<(&str, &str), ParseError> {
    let open = header.find('(');
    let close = header.rfind(')');
    match (open, close) {
        (Some(open), Some(close)) if open < close => Ok((
            header[..open].trim(),
            header[open + 1..close].trim(),
        )),
        _ => Err(ParseError::MalformedHeader(header.to_string())),
    }
}

/// Splits an address entry at the first TAB, else at the first SPACE.
fn split_entry(entry: &str) -> (&str, &str) {
    let separator = entry.find('\t').or_else(|| entry.find(' '));
    match separator {
        Some(index) => (entry[..index].trim(), &entry[index + 1..]),
        None => (entry.trim(), ""),
    }
}
