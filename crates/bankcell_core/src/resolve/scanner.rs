//! Reference token recognition.
//!
//! Each rule is a direct character-class matcher over ASCII bytes. Token
//! components are maximal runs of `[0-9A-Za-z]` (decimal digits only for the
//! bare triad). A failed candidate reports where the next viable start is,
//! so a pass reads each byte a bounded number of times.

/// Reference syntaxes in the order the resolver applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rule {
    /// `@file(<name>)`
    FileInclude,
    /// `r<reg>.<addr>` in the current bank.
    SameBank,
    /// `<prefix><bank>.<reg>.<addr>`
    PrefixedTriad,
    /// `<letter><bank>.<addr>`, register 1, not followed by `.<token>`.
    TwoPart,
    /// `<digits>.<digits>.<digits>`
    NumericTriad,
}

impl Rule {
    pub(crate) const PASSES: [Rule; 5] = [
        Rule::FileInclude,
        Rule::SameBank,
        Rule::PrefixedTriad,
        Rule::TwoPart,
        Rule::NumericTriad,
    ];

    /// Finds the earliest match starting at or after byte offset `from`.
    pub(crate) fn find<'t>(self, text: &'t str, from: usize, prefix: char) -> Option<Match<'t>> {
        let mut start = from;
        while start < text.len() {
            match self.match_at(text, start, prefix) {
                Ok(found) => return Some(found),
                Err(resume) => start = resume.max(start + 1),
            }
        }
        None
    }

    /// `Err` carries the next offset that could start a match.
    fn match_at<'t>(self, text: &'t str, start: usize, prefix: char) -> Result<Match<'t>, usize> {
        let bytes = text.as_bytes();
        let skip = start + 1;
        match self {
            Rule::FileInclude => {
                const OPEN: &str = "@file(";
                if !bytes[start..].starts_with(OPEN.as_bytes()) {
                    return Err(skip);
                }
                let name_start = start + OPEN.len();
                // No `)` here means none after any later `@file(` either.
                let close = name_start + text[name_start..].find(')').ok_or(text.len())?;
                if close == name_start {
                    return Err(close + 1);
                }
                Ok(Match {
                    start,
                    end: close + 1,
                    token: Token::File {
                        name: text[name_start..close].trim(),
                    },
                })
            }
            Rule::SameBank => {
                if bytes[start] != b'r' {
                    return Err(skip);
                }
                let [register, address] = dotted_parts::<2>(text, skip, is_alnum)?;
                Ok(Match {
                    start,
                    end: address.1,
                    token: Token::SameBank {
                        register: &text[register.0..register.1],
                        address: &text[address.0..address.1],
                    },
                })
            }
            Rule::PrefixedTriad => {
                if !prefix.is_ascii() {
                    return Err(text.len());
                }
                if bytes[start] != prefix as u8 {
                    return Err(skip);
                }
                let [bank, register, address] = dotted_parts::<3>(text, skip, is_alnum)?;
                Ok(Match {
                    start,
                    end: address.1,
                    token: Token::Triad {
                        bank: &text[bank.0..bank.1],
                        register: &text[register.0..register.1],
                        address: &text[address.0..address.1],
                    },
                })
            }
            Rule::TwoPart => {
                if !bytes[start].is_ascii_alphabetic() {
                    return Err(skip);
                }
                let [bank, address] = dotted_parts::<2>(text, skip, is_alnum)?;
                // A third `.<token>` makes this part of a longer reference.
                if bytes.get(address.1) == Some(&b'.')
                    && bytes.get(address.1 + 1).is_some_and(|byte| is_alnum(*byte))
                {
                    return Err(bank.1);
                }
                Ok(Match {
                    start,
                    end: address.1,
                    token: Token::TwoPart {
                        letter: char::from(bytes[start]),
                        bank: &text[bank.0..bank.1],
                        address: &text[address.0..address.1],
                    },
                })
            }
            Rule::NumericTriad => {
                if !bytes[start].is_ascii_digit() {
                    return Err(skip);
                }
                let [bank, register, address] =
                    dotted_parts::<3>(text, start, |byte| byte.is_ascii_digit())?;
                let end = address.1;
                if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
                    return Ok(Match {
                        start,
                        end,
                        token: Token::Verbatim,
                    });
                }
                Ok(Match {
                    start,
                    end,
                    token: Token::Numeric {
                        bank: &text[bank.0..bank.1],
                        register: &text[register.0..register.1],
                        address: &text[address.0..address.1],
                    },
                })
            }
        }
    }
}

/// One recognized token and its byte span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Match<'t> {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) token: Token<'t>,
}

/// Raw components of a recognized token, not yet parsed as identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'t> {
    File {
        name: &'t str,
    },
    SameBank {
        register: &'t str,
        address: &'t str,
    },
    Triad {
        bank: &'t str,
        register: &'t str,
        address: &'t str,
    },
    TwoPart {
        letter: char,
        bank: &'t str,
        address: &'t str,
    },
    Numeric {
        bank: &'t str,
        register: &'t str,
        address: &'t str,
    },
    /// Consumed by the pass but copied through unchanged.
    Verbatim,
}

fn is_alnum(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Reads `N` non-empty runs of `class` separated by single dots.
///
/// Returns each run as a `(start, end)` byte span. On failure returns the end
/// of the first run: a start inside that run sees the same remainder and
/// fails the same way.
fn dotted_parts<const N: usize>(
    text: &str,
    start: usize,
    class: impl Fn(u8) -> bool,
) -> Result<[(usize, usize); N], usize> {
    let bytes = text.as_bytes();
    let mut spans = [(0, 0); N];
    let mut cursor = start;
    let mut first_end = start;
    for (index, span) in spans.iter_mut().enumerate() {
        if index > 0 {
            if bytes.get(cursor) != Some(&b'.') {
                return Err(first_end);
            }
            cursor += 1;
        }
        let run_start = cursor;
        while cursor < bytes.len() && class(bytes[cursor]) {
            cursor += 1;
        }
        if index == 0 {
            first_end = cursor;
        }
        if cursor == run_start {
            return Err(first_end);
        }
        *span = (run_start, cursor);
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::{Rule, Token};

    fn first<'t>(rule: Rule, text: &'t str) -> Option<(&'t str, Token<'t>)> {
        rule.find(text, 0, 'x')
            .map(|found| (&text[found.start..found.end], found.token))
    }

    #[test]
    fn file_include_trims_name_and_needs_close_paren() {
        let (span, token) = first(Rule::FileInclude, "a @file( notes.txt ) b").expect("match");
        assert_eq!(span, "@file( notes.txt )");
        assert_eq!(token, Token::File { name: "notes.txt" });
        assert!(first(Rule::FileInclude, "@file(open").is_none());
        assert!(first(Rule::FileInclude, "@file()").is_none());
    }

    #[test]
    fn same_bank_takes_maximal_runs() {
        let (span, token) = first(Rule::SameBank, "see r02.0003!").expect("match");
        assert_eq!(span, "r02.0003");
        assert_eq!(
            token,
            Token::SameBank {
                register: "02",
                address: "0003"
            }
        );
        assert!(first(Rule::SameBank, "r02.").is_none());
    }

    #[test]
    fn prefixed_triad_requires_configured_prefix() {
        let (span, _) = first(Rule::PrefixedTriad, "go x00001.02.0003 now").expect("match");
        assert_eq!(span, "x00001.02.0003");
        assert!(first(Rule::PrefixedTriad, "y00001.02.0003").is_none());
        assert!(first(Rule::PrefixedTriad, "x00001.02").is_none());
    }

    #[test]
    fn two_part_rejects_three_part_continuation() {
        let (span, token) = first(Rule::TwoPart, "x00001.0001").expect("match");
        assert_eq!(span, "x00001.0001");
        assert_eq!(
            token,
            Token::TwoPart {
                letter: 'x',
                bank: "00001",
                address: "0001"
            }
        );
        assert!(first(Rule::TwoPart, "x1.2.3").is_none());
        assert!(first(Rule::TwoPart, "x1.2.c").is_none());
    }

    #[test]
    fn two_part_allows_trailing_punctuation() {
        let (span, _) = first(Rule::TwoPart, "see x00002.0001.").expect("match");
        assert_eq!(span, "x00002.0001");
        let (span, _) = first(Rule::TwoPart, "x1.2.. next").expect("match");
        assert_eq!(span, "x1.2");
    }

    #[test]
    fn failed_candidate_skips_whole_run() {
        let letters = "rb".repeat(5_000);
        assert_eq!(Rule::SameBank.match_at(&letters, 0, 'x'), Err(letters.len()));
        assert_eq!(Rule::TwoPart.match_at(&letters, 0, 'x'), Err(letters.len()));

        let digits = "12".repeat(5_000);
        assert_eq!(Rule::NumericTriad.match_at(&digits, 0, 'x'), Err(digits.len()));

        let prefixed = format!("x{letters}.1 tail");
        assert_eq!(
            Rule::PrefixedTriad.match_at(&prefixed, 0, 'x'),
            Err(letters.len() + 1)
        );

        let unclosed = "@file(a @file(b";
        assert_eq!(
            Rule::FileInclude.match_at(unclosed, 0, 'x'),
            Err(unclosed.len())
        );
    }

    #[test]
    fn match_after_long_run_is_still_found() {
        let text = format!("{} r1.2", "ab".repeat(5_000));
        let (span, _) = first(Rule::SameBank, &text).expect("match");
        assert_eq!(span, "r1.2");
    }

    #[test]
    fn two_part_reports_leading_letter_of_run() {
        let (span, token) = first(Rule::TwoPart, "ax1.5").expect("match");
        assert_eq!(span, "ax1.5");
        assert!(matches!(token, Token::TwoPart { letter: 'a', .. }));
    }

    #[test]
    fn numeric_triad_is_verbatim_after_alphanumeric() {
        let (span, token) = first(Rule::NumericTriad, "v1.2.3").expect("match");
        assert_eq!(span, "1.2.3");
        assert_eq!(token, Token::Verbatim);

        let (span, token) = first(Rule::NumericTriad, "(10.2.3)").expect("match");
        assert_eq!(span, "10.2.3");
        assert!(matches!(token, Token::Numeric { bank: "10", .. }));
    }

    #[test]
    fn numeric_triad_ignores_hex_letters() {
        assert!(first(Rule::NumericTriad, "a.b.c").is_none());
        let (span, _) = first(Rule::NumericTriad, " 1.2.3a").expect("match");
        assert_eq!(span, "1.2.3");
    }

    #[test]
    fn scanning_skips_non_ascii_text() {
        let text = "héllo r1.2 ✓";
        let (span, _) = first(Rule::SameBank, text).expect("match");
        assert_eq!(span, "r1.2");
    }
}
