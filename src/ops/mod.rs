//! GY-040: Built-in operation catalogue.
//!
//! Ordinary (non flow-control) operations, grouped by module. Each submodule
//! exposes `register(&mut OperationRegistryBuilder)`.

pub mod bitwise;
pub mod compression;
pub mod data;
pub mod encoding;
pub mod hashing;
pub mod text;

use crate::core::operation::OperationRegistryBuilder;
use crate::core::types::ArgValue;
use std::ops::Range;

/// Register every built-in ordinary operation.
pub fn register_builtins(builder: &mut OperationRegistryBuilder) {
    encoding::register(builder);
    text::register(builder);
    hashing::register(builder);
    compression::register(builder);
    bitwise::register(builder);
    data::register(builder);
}

/// Expand backslash escapes: `\n \r \t \b \f \0 \\ \' \" \xHH \u{H..} \uHHHH`.
///
/// Unknown escapes are kept verbatim, backslash included.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' => {
                let digits: String = take_hex(&mut chars, 2);
                match u8::from_str_radix(&digits, 16) {
                    Ok(b) if digits.len() == 2 => out.push(char::from(b)),
                    _ => {
                        out.push_str("\\x");
                        out.push_str(&digits);
                    }
                }
            }
            'u' => {
                let braced = chars.peek() == Some(&'{');
                if braced {
                    chars.next();
                }
                let digits = take_hex(&mut chars, if braced { 6 } else { 4 });
                let closed = !braced || chars.next_if_eq(&'}').is_some();
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .filter(|_| closed && (braced || digits.len() == 4));
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str(if braced { "\\u{" } else { "\\u" });
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, max: usize) -> String {
    let mut digits = String::new();
    while digits.len() < max {
        match chars.next_if(|c| c.is_ascii_hexdigit()) {
            Some(c) => digits.push(c),
            None => break,
        }
    }
    digits
}

// ============================================================================
// Shared argument helpers
// ============================================================================

pub(crate) fn arg_str(args: &[ArgValue], i: usize) -> String {
    args.get(i).map(ArgValue::as_str).unwrap_or_default()
}

pub(crate) fn arg_bool(args: &[ArgValue], i: usize) -> bool {
    args.get(i).is_some_and(ArgValue::as_bool)
}

pub(crate) fn arg_usize(args: &[ArgValue], i: usize) -> Option<usize> {
    args.get(i).and_then(ArgValue::as_usize)
}

/// String and selected option of a toggle-string argument.
pub(crate) fn arg_toggle(args: &[ArgValue], i: usize) -> (String, String) {
    match args.get(i) {
        Some(ArgValue::Toggle { string, option }) => (string.clone(), option.clone()),
        Some(other) => (other.as_str(), String::new()),
        None => (String::new(), String::new()),
    }
}

/// Highlight mapping for operations that keep every offset in place.
pub(crate) fn identity(pos: &[Range<usize>]) -> Option<Vec<Range<usize>>> {
    Some(pos.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gy040_unescape_common() {
        assert_eq!(unescape("a\\nb\\tc"), "a\nb\tc");
        assert_eq!(unescape("\\\\n"), "\\n");
        assert_eq!(unescape("\\r\\n"), "\r\n");
    }

    #[test]
    fn test_gy040_unescape_hex_and_unicode() {
        assert_eq!(unescape("\\x41\\x42"), "AB");
        assert_eq!(unescape("\\u00e9"), "é");
        assert_eq!(unescape("\\u{1F600}"), "\u{1F600}");
    }

    #[test]
    fn test_gy040_unescape_keeps_unknown() {
        assert_eq!(unescape("\\q"), "\\q");
        assert_eq!(unescape("\\xZZ"), "\\xZZ");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_gy040_arg_toggle_plain_string() {
        let args = vec![ArgValue::from("abc")];
        assert_eq!(arg_toggle(&args, 0), ("abc".to_string(), String::new()));
        assert_eq!(arg_toggle(&args, 3), (String::new(), String::new()));
    }
}
