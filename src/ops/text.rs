//! GY-042: Case, reversal, substitution and rotation.

use super::{arg_bool, arg_str, arg_toggle, arg_usize, identity, unescape};
use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use regex::{NoExpand, RegexBuilder};
use std::ops::Range;

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder
        .register(ToUpperCase)
        .register(ToLowerCase)
        .register(Reverse)
        .register(FindReplace)
        .register(Rot13);
}

// ============================================================================
// Case
// ============================================================================

const SCOPES: &[&str] = &["All", "Word", "Sentence", "Paragraph"];

static TO_UPPER: OpMeta = OpMeta {
    name: "To Upper case",
    module: "Default",
    description: "Converts the input string to upper case, optionally limiting scope to only the first character in each word, sentence or paragraph.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Scope",
        kind: ArgKind::Option(SCOPES),
        default: Literal::Str("All"),
    }],
    flow_control: false,
};

/// Upper-case the first letter following each position where `is_boundary` holds.
fn capitalise_after(text: &str, is_boundary: impl Fn(&str, usize) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = true;
    for (i, c) in text.char_indices() {
        if is_boundary(text, i) {
            pending = true;
        }
        if pending && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
            pending = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub struct ToUpperCase;

impl Operation for ToUpperCase {
    fn meta(&self) -> &'static OpMeta {
        &TO_UPPER
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let text = input.into_text()?;
        let out = match arg_str(args, 0).as_str() {
            "Word" => capitalise_after(&text, |t, i| {
                t[..i].chars().next_back().is_some_and(|p| !p.is_alphanumeric())
            }),
            "Sentence" => capitalise_after(&text, |t, i| {
                let before = t[..i].trim_end();
                before.len() < i && before.ends_with(['.', '!', '?'])
            }),
            "Paragraph" => capitalise_after(&text, |t, i| t[..i].ends_with('\n')),
            _ => text.to_uppercase(),
        };
        Ok(DishValue::String(out))
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

static TO_LOWER: OpMeta = OpMeta {
    name: "To Lower case",
    module: "Default",
    description: "Converts every character in the input to lower case.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

pub struct ToLowerCase;

impl Operation for ToLowerCase {
    fn meta(&self) -> &'static OpMeta {
        &TO_LOWER
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        Ok(DishValue::String(input.into_text()?.to_lowercase()))
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

// ============================================================================
// Reverse
// ============================================================================

const REVERSE_BY: &[&str] = &["Character", "Byte", "Line"];

static REVERSE: OpMeta = OpMeta {
    name: "Reverse",
    module: "Default",
    description: "Reverses the input string.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[ArgSpec {
        name: "By",
        kind: ArgKind::Option(REVERSE_BY),
        default: Literal::Str("Character"),
    }],
    flow_control: false,
};

pub struct Reverse;

impl Operation for Reverse {
    fn meta(&self) -> &'static OpMeta {
        &REVERSE
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let mut bytes = input.into_bytes()?;
        let out = match arg_str(args, 0).as_str() {
            "Byte" => {
                bytes.reverse();
                bytes
            }
            "Line" => {
                let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
                lines.reverse();
                lines.join(&b'\n')
            }
            _ => {
                let text = String::from_utf8_lossy(&bytes);
                text.chars().rev().collect::<String>().into_bytes()
            }
        };
        Ok(DishValue::ArrayBuffer(out))
    }
}

// ============================================================================
// Find / Replace
// ============================================================================

const FIND_MODES: &[&str] = &["Regex", "Extended (\\n, \\t, \\x...)", "Simple string"];

static FIND_REPLACE: OpMeta = OpMeta {
    name: "Find / Replace",
    module: "Regex",
    description: "Replaces all occurrences of the first string with the second. Includes support for regular expressions and escape sequences.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Find",
            kind: ArgKind::Toggle(FIND_MODES),
            default: Literal::Toggle("", "Regex"),
        },
        ArgSpec {
            name: "Replace",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
        ArgSpec {
            name: "Global match",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Case insensitive",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Multiline matching",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Dot matches all",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
    ],
    flow_control: false,
};

pub struct FindReplace;

impl Operation for FindReplace {
    fn meta(&self) -> &'static OpMeta {
        &FIND_REPLACE
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let text = input.into_text()?;
        let (find, mode) = arg_toggle(args, 0);
        if find.is_empty() {
            return Ok(DishValue::String(text));
        }
        let replace = arg_str(args, 1);
        let literal = mode != "Regex";
        let pattern = match mode.as_str() {
            "Regex" => find,
            "Simple string" => regex::escape(&find),
            _ => regex::escape(&unescape(&find)),
        };
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(arg_bool(args, 3))
            .multi_line(arg_bool(args, 4))
            .dot_matches_new_line(arg_bool(args, 5))
            .build()?;

        let global = arg_bool(args, 2);
        let out = match (literal, global) {
            (true, true) => re.replace_all(&text, NoExpand(&replace)),
            (true, false) => re.replace(&text, NoExpand(&replace)),
            (false, true) => re.replace_all(&text, replace.as_str()),
            (false, false) => re.replace(&text, replace.as_str()),
        };
        Ok(DishValue::String(out.into_owned()))
    }
}

// ============================================================================
// ROT13
// ============================================================================

static ROT13: OpMeta = OpMeta {
    name: "ROT13",
    module: "Default",
    description: "A simple caesar substitution cipher which rotates alphabet characters by the specified amount (default 13).",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Rotate lower case chars",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Rotate upper case chars",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Rotate numbers",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Amount",
            kind: ArgKind::Number,
            default: Literal::Num(13.0),
        },
    ],
    flow_control: false,
};

/// Rotate ASCII letters (and optionally digits) by `amount`.
pub fn rotate(bytes: &[u8], amount: usize, lower: bool, upper: bool, numbers: bool) -> Vec<u8> {
    let shift = |b: u8, base: u8, modulus: usize| base + ((usize::from(b - base) + amount) % modulus) as u8;
    bytes
        .iter()
        .map(|&b| match b {
            b'a'..=b'z' if lower => shift(b, b'a', 26),
            b'A'..=b'Z' if upper => shift(b, b'A', 26),
            b'0'..=b'9' if numbers => shift(b, b'0', 10),
            other => other,
        })
        .collect()
}

pub struct Rot13;

impl Operation for Rot13 {
    fn meta(&self) -> &'static OpMeta {
        &ROT13
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let amount = arg_usize(args, 3).unwrap_or(13);
        Ok(DishValue::ArrayBuffer(rotate(
            &bytes,
            amount,
            arg_bool(args, 0),
            arg_bool(args, 1),
            arg_bool(args, 2),
        )))
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
