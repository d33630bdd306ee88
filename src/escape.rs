//! C-style byte escaping used both by the `id` operation's product
//! description printout and the `-l/--log` packets trace, matching the
//! source's `print_string` formatting exactly (`\a\b\f\n\r\t\v\"`, other
//! non-printables as `\xHH`, everything else verbatim).

use std::fmt::Write as _;

pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            0x0c => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x0b => out.push_str("\\v"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_standard_c_sequences() {
        assert_eq!(escape_bytes(b"a\nb\tc\"d"), "a\\nb\\tc\\\"d");
    }

    #[test]
    fn escapes_non_printable_as_hex() {
        assert_eq!(escape_bytes(&[0x01, 0x7f]), "\\x01\\x7f");
    }

    #[test]
    fn leaves_printable_ascii_verbatim() {
        assert_eq!(escape_bytes(b"GPS 12 XL"), "GPS 12 XL");
    }
}
