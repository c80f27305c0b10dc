//! Bank text serializer.

use crate::config::Config;
use crate::model::bank::Bank;
use std::fmt::Write;

/// Serializes `bank` in the canonical text format.
///
/// A bank holding only register 1 is written without a register marker.
pub fn write_bank_text(bank: &Bank, config: &Config) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}\t({}){{", config.render_bank(bank.id), bank.title);

    let compact = bank.is_single_default_register();
    for (register, addresses) in &bank.registers {
        if !compact {
            let _ = writeln!(out, "{}", config.render_register(*register));
        }
        for (address, value) in addresses {
            let _ = writeln!(out, "\t{}\t{}", config.render_address(*address), value);
        }
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::write_bank_text;
    use crate::config::Config;
    use crate::model::bank::Bank;

    #[test]
    fn writes_compact_form_for_default_register_only() {
        let mut bank = Bank::new(1, "demo");
        bank.insert(1, 2, "two");
        bank.insert(1, 1, "one");
        let text = write_bank_text(&bank, &Config::default());
        assert_eq!(text, "x00001\t(demo){\n\t0001\tone\n\t0002\ttwo\n}\n");
    }

    #[test]
    fn writes_register_markers_for_multiple_registers() {
        let mut bank = Bank::new(1, "demo");
        bank.insert(1, 1, "one");
        bank.insert(2, 3, "three");
        let text = write_bank_text(&bank, &Config::default());
        assert_eq!(
            text,
            "x00001\t(demo){\n01\n\t0001\tone\n02\n\t0003\tthree\n}\n"
        );
    }

    #[test]
    fn single_non_default_register_keeps_its_marker() {
        let mut bank = Bank::new(1, "demo");
        bank.insert(5, 1, "v");
        let text = write_bank_text(&bank, &Config::default());
        assert!(text.contains("\n05\n"));
    }

    #[test]
    fn empty_bank_writes_header_and_closing_brace() {
        let bank = Bank::new(7, "empty");
        assert_eq!(
            write_bank_text(&bank, &Config::default()),
            "x00007\t(empty){\n}\n"
        );
    }
}
