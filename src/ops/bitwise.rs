//! GY-045: XOR with a multi-format key.

use super::{arg_bool, arg_str, arg_toggle, identity};
use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::ops::Range;

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder.register(Xor);
}

pub const KEY_FORMATS: &[&str] = &["Hex", "Decimal", "Binary", "Base64", "UTF8", "Latin1"];
const SCHEMES: &[&str] = &["Standard", "Input differential", "Output differential", "Cascade"];

/// How successive key bytes are combined with the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Standard,
    InputDifferential,
    OutputDifferential,
    Cascade,
}

impl Scheme {
    fn parse(name: &str) -> Self {
        match name {
            "Input differential" => Self::InputDifferential,
            "Output differential" => Self::OutputDifferential,
            "Cascade" => Self::Cascade,
            _ => Self::Standard,
        }
    }
}

/// Decode a key string in one of [`KEY_FORMATS`].
pub fn parse_key(key: &str, format: &str) -> Result<Vec<u8>, OpError> {
    let bad = |what: &str| OpError::operation(format!("Invalid {} key: {}", what, key));
    match format {
        "Hex" => {
            let digits: String = key
                .replace("0x", "")
                .chars()
                .filter(char::is_ascii_hexdigit)
                .collect();
            if digits.len() % 2 == 1 {
                return Err(bad("Hex"));
            }
            hex::decode(digits).map_err(|_| bad("Hex"))
        }
        "Decimal" => key
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u8>().map_err(|_| bad("Decimal")))
            .collect(),
        "Binary" => {
            let bits: String = key.chars().filter(|c| *c == '0' || *c == '1').collect();
            bits.as_bytes()
                .chunks(8)
                .map(|chunk| {
                    std::str::from_utf8(chunk)
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 2).ok())
                        .ok_or_else(|| bad("Binary"))
                })
                .collect()
        }
        "Base64" => STANDARD.decode(key.trim()).map_err(|_| bad("Base64")),
        "Latin1" => Ok(key.chars().map(|c| (u32::from(c) & 0xff) as u8).collect()),
        _ => Ok(key.as_bytes().to_vec()),
    }
}

/// XOR `data` with a repeating `key`.
///
/// With `null_preserving`, input bytes that are zero or equal to the key byte
/// are passed through unchanged and leave a differential key untouched.
/// Cascade ignores the key and XORs each byte with the next input byte.
pub fn xor(data: &[u8], key: &[u8], scheme: Scheme, null_preserving: bool) -> Vec<u8> {
    if key.is_empty() && scheme != Scheme::Cascade {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut key = key.to_vec();
    for (i, &b) in data.iter().enumerate() {
        let slot = if key.is_empty() { 0 } else { i % key.len() };
        let key_byte = match scheme {
            Scheme::Cascade => data.get(i + 1).copied().unwrap_or(0),
            _ => key[slot],
        };
        let preserved = null_preserving && (b == 0 || b == key_byte);
        let x = if preserved { b } else { b ^ key_byte };
        out.push(x);
        if preserved {
            continue;
        }
        match scheme {
            Scheme::InputDifferential => key[slot] = b,
            Scheme::OutputDifferential => key[slot] = x,
            Scheme::Standard | Scheme::Cascade => {}
        }
    }
    out
}

static XOR: OpMeta = OpMeta {
    name: "XOR",
    module: "Default",
    description: "XOR the input with the given key. Differential schemes replace the key byte with the previous input or output byte; Cascade XORs each byte with the next input byte and ignores the key.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Key",
            kind: ArgKind::Toggle(KEY_FORMATS),
            default: Literal::Toggle("", "Hex"),
        },
        ArgSpec {
            name: "Scheme",
            kind: ArgKind::Option(SCHEMES),
            default: Literal::Str("Standard"),
        },
        ArgSpec {
            name: "Null preserving",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
    ],
    flow_control: false,
};

pub struct Xor;

impl Operation for Xor {
    fn meta(&self) -> &'static OpMeta {
        &XOR
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let (key, format) = arg_toggle(args, 0);
        let key = parse_key(&key, &format)?;
        let scheme = Scheme::parse(&arg_str(args, 1));
        Ok(DishValue::ArrayBuffer(xor(&bytes, &key, scheme, arg_bool(args, 2))))
    }

    fn can_highlight(&self) -> bool {
        true
    }

    fn highlight(&self, pos: &[Range<usize>], _args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        identity(pos)
    }

    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        _args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        identity(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{self, op};

    fn key(string: &str, option: &str) -> ArgValue {
        ArgValue::Toggle {
            string: string.into(),
            option: option.into(),
        }
    }

    #[test]
    fn test_gy045_parse_key_formats() {
        assert_eq!(parse_key("0x0a 0B", "Hex").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_key("10, 11", "Decimal").unwrap(), vec![10, 11]);
        assert_eq!(parse_key("00001010", "Binary").unwrap(), vec![10]);
        assert_eq!(parse_key("Cgs=", "Base64").unwrap(), vec![10, 11]);
        assert_eq!(parse_key("ab", "UTF8").unwrap(), b"ab".to_vec());
        assert!(parse_key("256", "Decimal").is_err());
        assert!(parse_key("abc", "Hex").is_err());
    }

    #[test]
    fn test_gy045_standard_is_involution() {
        let data = b"attack at dawn";
        let once = xor(data, b"key", Scheme::Standard, false);
        assert_ne!(once, data.to_vec());
        assert_eq!(xor(&once, b"key", Scheme::Standard, false), data.to_vec());
    }

    #[test]
    fn test_gy045_null_preserving() {
        assert_eq!(xor(&[0, 1, 5], &[5], Scheme::Standard, true), vec![0, 4, 5]);
    }

    #[test]
    fn test_gy045_differential_schemes() {
        assert_eq!(xor(&[1, 2, 3], &[0], Scheme::InputDifferential, false), vec![1, 3, 1]);
        assert_eq!(xor(&[1, 2, 3], &[0], Scheme::OutputDifferential, false), vec![1, 3, 0]);
    }

    #[test]
    fn test_gy045_null_preserved_byte_keeps_differential_key() {
        // The zero passes through, so the key byte stays 3 for the next byte
        assert_eq!(xor(&[0, 7, 4], &[3], Scheme::InputDifferential, true), vec![0, 4, 3]);
        assert_eq!(xor(&[0, 7, 4], &[3], Scheme::OutputDifferential, true), vec![0, 4, 4]);
    }

    #[test]
    fn test_gy045_cascade_uses_next_byte() {
        assert_eq!(xor(&[1, 2, 3], &[0xff], Scheme::Cascade, false), vec![3, 1, 3]);
        assert_eq!(xor(&[1, 2], &[], Scheme::Cascade, false), vec![3, 2]);
    }

    #[test]
    fn test_gy045_xor_recipe_with_utf8_key() {
        let out = testkit::run_to_string(
            "hello",
            &[
                op("XOR", vec![key("k", "UTF8")]),
                op("XOR", vec![key("6b", "Hex")]),
            ],
        );
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_gy045_empty_key_is_identity() {
        assert_eq!(testkit::run_to_string("abc", &[op("XOR", vec![])]), "abc");
    }
}
