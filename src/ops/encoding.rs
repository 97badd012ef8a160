//! GY-041: Base64 and hexadecimal codecs.

use super::{arg_bool, arg_str, arg_usize};
use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, MagicCheck, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use base64::alphabet::Alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use std::ops::Range;

pub const STANDARD_ALPHABET: &str = "A-Za-z0-9+/=";
pub const URL_SAFE_ALPHABET: &str = "A-Za-z0-9-_";

const TO_HEX_DELIMITERS: &[&str] = &[
    "Space",
    "Percent",
    "Comma",
    "Semi-colon",
    "Colon",
    "Line feed",
    "CRLF",
    "0x",
    "\\x",
    "None",
];

const FROM_HEX_DELIMITERS: &[&str] = &[
    "Auto",
    "Space",
    "Percent",
    "Comma",
    "Semi-colon",
    "Colon",
    "Line feed",
    "CRLF",
    "0x",
    "\\x",
    "None",
];

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder
        .register(FromBase64)
        .register(ToBase64)
        .register(FromHex)
        .register(ToHex);
}

fn map_ranges(
    pos: &[Range<usize>],
    f: impl Fn(usize, usize) -> (usize, usize),
) -> Option<Vec<Range<usize>>> {
    Some(
        pos.iter()
            .map(|r| {
                let (start, end) = f(r.start, r.end);
                start..end.max(start)
            })
            .collect(),
    )
}

// ============================================================================
// Base64
// ============================================================================

/// Expand `a-z` style ranges in an alphabet description.
pub fn expand_alphabet(desc: &str) -> Vec<char> {
    let chars: Vec<char> = desc.chars().collect();
    let mut out = Vec::with_capacity(65);
    let mut i = 0;
    while i < chars.len() {
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i] <= chars[i + 2] {
            out.extend(chars[i]..=chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// A configured engine plus the alphabet's padding character, if any.
struct Codec {
    engine: GeneralPurpose,
    symbols: Vec<char>,
    pad: Option<char>,
}

impl Codec {
    fn new(desc: &str) -> Result<Self, OpError> {
        let mut symbols = expand_alphabet(desc);
        let pad = match symbols.len() {
            65 => symbols.pop(),
            64 => None,
            n => {
                return Err(OpError::operation(format!(
                    "Invalid Base64 alphabet length ({}): {}",
                    n, desc
                )))
            }
        };
        let table: String = symbols.iter().collect();
        let alphabet = Alphabet::new(&table)
            .map_err(|e| OpError::operation(format!("Invalid Base64 alphabet: {}", e)))?;
        let config = GeneralPurposeConfig::new()
            .with_encode_padding(pad.is_some())
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true);
        Ok(Self {
            engine: GeneralPurpose::new(&alphabet, config),
            symbols,
            pad,
        })
    }

    fn decode(&self, input: &str, remove_non_alphabet: bool) -> Result<Vec<u8>, OpError> {
        let mut cleaned: String = if remove_non_alphabet {
            input
                .chars()
                .filter(|c| self.symbols.contains(c) || Some(*c) == self.pad)
                .collect()
        } else {
            input.trim().to_string()
        };
        if let Some(pad) = self.pad.filter(|p| *p != '=') {
            cleaned = cleaned.replace(pad, "=");
        }
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        self.engine
            .decode(cleaned.trim_end_matches('='))
            .map_err(|e| OpError::operation(format!("Invalid Base64 input: {}", e)))
    }

    fn encode(&self, input: &[u8]) -> String {
        let out = self.engine.encode(input);
        match self.pad {
            Some(pad) if pad != '=' => out.replace('=', &pad.to_string()),
            _ => out,
        }
    }
}

static FROM_BASE64: OpMeta = OpMeta {
    name: "From Base64",
    module: "Default",
    description: "Base64 is a notation for encoding arbitrary byte data using a restricted set of symbols. This operation decodes data from an ASCII Base64 string back into its raw format.",
    input_type: TypeTag::String,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Alphabet",
            kind: ArgKind::String,
            default: Literal::Str(STANDARD_ALPHABET),
        },
        ArgSpec {
            name: "Remove non-alphabet chars",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
    ],
    flow_control: false,
};

static FROM_BASE64_CHECKS: &[MagicCheck] = &[
    MagicCheck {
        pattern: r"^\s*(?:[A-Z\d+/]{4})+(?:[A-Z\d+/]{2}==|[A-Z\d+/]{3}=)?\s*$",
        case_insensitive: true,
        args: &[Literal::Str(STANDARD_ALPHABET), Literal::Bool(true)],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^\s*[A-Z\d\-_]{20,}\s*$",
        case_insensitive: true,
        args: &[Literal::Str(URL_SAFE_ALPHABET), Literal::Bool(true)],
        useful: false,
        entropy_range: None,
    },
];

pub struct FromBase64;

impl Operation for FromBase64 {
    fn meta(&self) -> &'static OpMeta {
        &FROM_BASE64
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let codec = Codec::new(&arg_str(args, 0))?;
        let text = input.into_text()?;
        Ok(DishValue::ArrayBuffer(codec.decode(&text, arg_bool(args, 1))?))
    }

    fn can_highlight(&self) -> bool {
        true
    }

    fn highlight(&self, pos: &[Range<usize>], _args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        map_ranges(pos, |s, e| ((s * 3).div_ceil(4), e * 3 / 4))
    }

    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        _args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        map_ranges(pos, |s, e| (s * 4 / 3, (e * 4).div_ceil(3)))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        FROM_BASE64_CHECKS
    }
}

static TO_BASE64: OpMeta = OpMeta {
    name: "To Base64",
    module: "Default",
    description: "Base64 is a notation for encoding arbitrary byte data using a restricted set of symbols. This operation encodes raw data into an ASCII Base64 string.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Alphabet",
        kind: ArgKind::String,
        default: Literal::Str(STANDARD_ALPHABET),
    }],
    flow_control: false,
};

pub struct ToBase64;

impl Operation for ToBase64 {
    fn meta(&self) -> &'static OpMeta {
        &TO_BASE64
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let codec = Codec::new(&arg_str(args, 0))?;
        let bytes = input.into_bytes()?;
        Ok(DishValue::String(codec.encode(&bytes)))
    }

    fn can_highlight(&self) -> bool {
        true
    }

    fn highlight(&self, pos: &[Range<usize>], _args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        map_ranges(pos, |s, e| (s * 4 / 3, (e * 4).div_ceil(3)))
    }

    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        _args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        map_ranges(pos, |s, e| ((s * 3).div_ceil(4), e * 3 / 4))
    }
}

// ============================================================================
// Hex
// ============================================================================

/// Literal text for a named delimiter option.
pub fn delimiter(name: &str) -> &'static str {
    match name {
        "Space" => " ",
        "Percent" => "%",
        "Comma" => ",",
        "Semi-colon" => ";",
        "Colon" => ":",
        "Line feed" => "\n",
        "CRLF" => "\r\n",
        "0x" => "0x",
        "\\x" => "\\x",
        _ => "",
    }
}

/// Delimiters written before every byte rather than between bytes.
fn is_prefix(delim: &str) -> bool {
    matches!(delim, "0x" | "\\x" | "%")
}

/// Encode bytes as lowercase hex, `per_line` bytes to a line when non-zero.
pub fn to_hex(bytes: &[u8], delim: &str, per_line: usize) -> String {
    let cells: Vec<String> = bytes
        .iter()
        .map(|b| {
            if is_prefix(delim) {
                format!("{}{:02x}", delim, b)
            } else {
                format!("{:02x}", b)
            }
        })
        .collect();
    let sep = if is_prefix(delim) { "" } else { delim };
    if per_line == 0 {
        return cells.join(sep);
    }
    cells
        .chunks(per_line)
        .map(|line| line.join(sep))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode hex text. `Auto` drops prefixes and every non-hex character.
pub fn from_hex(text: &str, delim_name: &str) -> Result<Vec<u8>, OpError> {
    let digits: String = if delim_name == "Auto" {
        text.replace("0x", "")
            .replace("0X", "")
            .replace("\\x", "")
            .chars()
            .filter(char::is_ascii_hexdigit)
            .collect()
    } else {
        let delim = delimiter(delim_name);
        let chunks: Vec<&str> = if delim.is_empty() {
            vec![text]
        } else {
            text.split(delim).collect()
        };
        let mut digits = String::with_capacity(text.len());
        for chunk in chunks {
            let chunk: String = chunk.chars().filter(|c| !c.is_whitespace()).collect();
            if let Some(bad) = chunk.chars().find(|c| !c.is_ascii_hexdigit()) {
                return Err(OpError::operation(format!(
                    "Invalid hex character '{}' for delimiter {}",
                    bad, delim_name
                )));
            }
            digits.push_str(&chunk);
        }
        digits
    };

    let even = digits.len() - digits.len() % 2;
    let mut out = hex::decode(&digits[..even])
        .map_err(|e| OpError::operation(format!("Invalid hex input: {}", e)))?;
    if even < digits.len() {
        // A trailing lone digit is read as its own nibble
        let last = u8::from_str_radix(&digits[even..], 16)
            .map_err(|e| OpError::operation(format!("Invalid hex input: {}", e)))?;
        out.push(last);
    }
    Ok(out)
}

/// Width in characters of one encoded byte, including its delimiter.
fn hex_width(delim: &str) -> usize {
    let len = if delim == "\r\n" { 1 } else { delim.len() };
    len + 2
}

fn hex_forward(pos: &[Range<usize>], delim: &str) -> Option<Vec<Range<usize>>> {
    let width = hex_width(delim);
    let trail = if is_prefix(delim) { 0 } else { width - 2 };
    map_ranges(pos, |s, e| (s * width, (e * width).saturating_sub(trail)))
}

fn hex_backward(pos: &[Range<usize>], delim: &str) -> Option<Vec<Range<usize>>> {
    let width = hex_width(delim) as f64;
    map_ranges(pos, |s, e| {
        let start = (s as f64 / width).round() as usize;
        let end = (e as f64 / width).ceil() as usize;
        (start, end)
    })
}

static TO_HEX: OpMeta = OpMeta {
    name: "To Hex",
    module: "Default",
    description: "Converts the input string to hexadecimal bytes separated by the specified delimiter.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Delimiter",
            kind: ArgKind::Option(TO_HEX_DELIMITERS),
            default: Literal::Str("Space"),
        },
        ArgSpec {
            name: "Bytes per line",
            kind: ArgKind::Number,
            default: Literal::Num(0.0),
        },
    ],
    flow_control: false,
};

pub struct ToHex;

impl Operation for ToHex {
    fn meta(&self) -> &'static OpMeta {
        &TO_HEX
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let delim = delimiter(&arg_str(args, 0));
        Ok(DishValue::String(to_hex(
            &bytes,
            delim,
            arg_usize(args, 1).unwrap_or(0),
        )))
    }

    fn can_highlight(&self) -> bool {
        true
    }

    fn highlight(&self, pos: &[Range<usize>], args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        if arg_usize(args, 1).unwrap_or(0) != 0 {
            return None;
        }
        hex_forward(pos, delimiter(&arg_str(args, 0)))
    }

    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        if arg_usize(args, 1).unwrap_or(0) != 0 {
            return None;
        }
        hex_backward(pos, delimiter(&arg_str(args, 0)))
    }
}

static FROM_HEX: OpMeta = OpMeta {
    name: "From Hex",
    module: "Default",
    description: "Converts a hexadecimal byte string back into its raw value.",
    input_type: TypeTag::String,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Delimiter",
        kind: ArgKind::Option(FROM_HEX_DELIMITERS),
        default: Literal::Str("Auto"),
    }],
    flow_control: false,
};

static FROM_HEX_CHECKS: &[MagicCheck] = &[
    MagicCheck {
        pattern: r"^(?:[\dA-F]{2})+$",
        case_insensitive: true,
        args: &[Literal::Str("None")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^[\dA-F]{2}(?: [\dA-F]{2})*$",
        case_insensitive: true,
        args: &[Literal::Str("Space")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^[\dA-F]{2}(?:,[\dA-F]{2})*$",
        case_insensitive: true,
        args: &[Literal::Str("Comma")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^[\dA-F]{2}(?::[\dA-F]{2})*$",
        case_insensitive: true,
        args: &[Literal::Str("Colon")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^[\dA-F]{2}(?:\r?\n[\dA-F]{2})*$",
        case_insensitive: true,
        args: &[Literal::Str("Line feed")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^(?:0x[\dA-F]{2})+$",
        case_insensitive: true,
        args: &[Literal::Str("0x")],
        useful: false,
        entropy_range: None,
    },
    MagicCheck {
        pattern: r"^(?:\\x[\dA-F]{2})+$",
        case_insensitive: true,
        args: &[Literal::Str("\\x")],
        useful: false,
        entropy_range: None,
    },
];

pub struct FromHex;

impl Operation for FromHex {
    fn meta(&self) -> &'static OpMeta {
        &FROM_HEX
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let text = input.into_text()?;
        Ok(DishValue::ArrayBuffer(from_hex(&text, &arg_str(args, 0))?))
    }

    fn can_highlight(&self) -> bool {
        true
    }

    fn highlight(&self, pos: &[Range<usize>], args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        let name = arg_str(args, 0);
        if name == "Auto" {
            return None;
        }
        hex_backward(pos, delimiter(&name))
    }

    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        let name = arg_str(args, 0);
        if name == "Auto" {
            return None;
        }
        hex_forward(pos, delimiter(&name))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        FROM_HEX_CHECKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{self, op};

    #[test]
    fn test_gy041_expand_alphabet() {
        let std = expand_alphabet(STANDARD_ALPHABET);
        assert_eq!(std.len(), 65);
        assert_eq!(std[0], 'A');
        assert_eq!(std[64], '=');
        let url = expand_alphabet(URL_SAFE_ALPHABET);
        assert_eq!(url.len(), 64);
        assert_eq!(&url[62..], &['-', '_']);
    }

    #[test]
    fn test_gy041_from_base64() {
        let out = testkit::run_to_string("aGVsbG8gd29ybGQ=", &[op("From Base64", vec![])]);
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_gy041_from_base64_unpadded_and_noisy() {
        let out = testkit::run_to_string("aGVs\nbG8*", &[op("From Base64", vec![])]);
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_gy041_url_safe_alphabet() {
        let out = testkit::run_to_string(
            "-_8",
            &[
                op("From Base64", vec![URL_SAFE_ALPHABET.into()]),
                op("To Hex", vec!["None".into()]),
            ],
        );
        assert_eq!(out, "fbff");
    }

    #[test]
    fn test_gy041_to_base64() {
        let out = testkit::run_to_string("hello", &[op("To Base64", vec![])]);
        assert_eq!(out, "aGVsbG8=");
    }

    #[test]
    fn test_gy041_bad_alphabet_is_recovered() {
        let (mut state, result) =
            testkit::run("abc", &[op("To Base64", vec!["abc".into()])]);
        assert_eq!(result.unwrap(), 0);
        assert!(state
            .dish
            .get_string()
            .unwrap()
            .starts_with("Invalid Base64 alphabet length"));
    }

    #[test]
    fn test_gy041_to_hex_delimiters() {
        assert_eq!(to_hex(b"AB", " ", 0), "41 42");
        assert_eq!(to_hex(b"AB", "0x", 0), "0x410x42");
        assert_eq!(to_hex(b"AB", "", 0), "4142");
        assert_eq!(to_hex(b"ABC", ":", 2), "41:42\n43");
    }

    #[test]
    fn test_gy041_from_hex() {
        assert_eq!(from_hex("41 42", "Auto").unwrap(), b"AB");
        assert_eq!(from_hex("0x410x42", "Auto").unwrap(), b"AB");
        assert_eq!(from_hex("41:42", "Colon").unwrap(), b"AB");
        assert_eq!(from_hex("\\x41\\x42", "\\x").unwrap(), b"AB");
        assert_eq!(from_hex("414", "None").unwrap(), vec![0x41, 0x04]);
        assert!(from_hex("4g", "None").is_err());
    }

    #[test]
    fn test_gy041_hex_roundtrip_through_recipe() {
        let out = testkit::run_to_string(
            "galley",
            &[
                op("To Hex", vec!["Comma".into()]),
                op("From Hex", vec!["Comma".into()]),
            ],
        );
        assert_eq!(out, "galley");
    }

    #[test]
    fn test_gy041_hex_highlight() {
        let args = vec![ArgValue::from("Space"), ArgValue::Num(0.0)];
        assert_eq!(ToHex.highlight(&[1..3], &args), Some(vec![3..8]));
        assert_eq!(ToHex.highlight_reverse(&[3..8], &args), Some(vec![1..3]));
        assert_eq!(ToHex.highlight(&[0..0], &args), Some(vec![0..0]));
        assert_eq!(FromHex.highlight(&[0..2], &[ArgValue::from("Auto")]), None);
    }

    #[test]
    fn test_gy041_base64_highlight() {
        assert_eq!(ToBase64.highlight(&[0..3], &[]), Some(vec![0..4]));
        assert_eq!(ToBase64.highlight_reverse(&[0..4], &[]), Some(vec![0..3]));
        assert_eq!(FromBase64.highlight(&[4..8], &[]), Some(vec![3..6]));
    }
}
