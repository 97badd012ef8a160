//! GY-022: Register. Capture parts of the input into `$R<n>` registers.
//!
//! Capture groups are substituted into the string arguments of every later
//! enabled operation in the current op list. `\$R0` keeps the literal text.

use crate::core::error::OpError;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation};
use crate::core::state::RecipeState;
use crate::core::types::{ArgValue, TypeTag};
use regex::{Captures, Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::debug;

static REGISTER_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\*)\$R(\d{1,2})").expect("valid register reference pattern"));

static REGISTER: OpMeta = OpMeta {
    name: "Register",
    module: "Regex",
    description: "Extract data from the input and store it in registers which can then be passed into subsequent operations as arguments.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Extractor",
            kind: ArgKind::String,
            default: Literal::Str("([\\s\\S]*)"),
        },
        ArgSpec {
            name: "Case insensitive",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Multiline matching",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Dot matches all",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
    ],
    flow_control: true,
};

pub struct Register;

impl Operation for Register {
    fn meta(&self) -> &'static OpMeta {
        &REGISTER
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let extractor = RegexBuilder::new(&state.arg_str(0))
            .case_insensitive(state.arg_bool(1))
            .multi_line(state.arg_bool(2))
            .dot_matches_new_line(state.arg_bool(3))
            .build()?;
        let input = state.dish.get_string()?;
        let Some(caps) = extractor.captures(&input) else {
            debug!("Extractor did not match, registers unchanged");
            return Ok(());
        };

        let registers: Vec<String> = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        let base = state.num_registers;

        for op in state.op_list.iter_mut().skip(state.progress + 1) {
            if op.disabled {
                continue;
            }
            for arg in op.args.iter_mut() {
                match arg {
                    ArgValue::Str(s) => *s = substitute(s, base, &registers),
                    ArgValue::Toggle { string, .. } => *string = substitute(string, base, &registers),
                    ArgValue::Bool(_) | ArgValue::Num(_) => {}
                }
            }
        }

        state.num_registers += registers.len();
        debug!("Stored {} register(s), {} in total", registers.len(), state.num_registers);
        Ok(())
    }
}

/// Replace `$R<n>` references that name one of the new registers.
///
/// `base` is the number of registers that existed before this extraction;
/// references to other registers are left for the Register that owns them.
pub fn substitute(text: &str, base: usize, registers: &[String]) -> String {
    REGISTER_REF
        .replace_all(text, |caps: &Captures| {
            let whole = &caps[0];
            let slashes = &caps[1];
            let Ok(n) = caps[2].parse::<usize>() else {
                return whole.to_string();
            };
            if n < base || n >= base + registers.len() {
                return whole.to_string();
            }
            if slashes.len() % 2 == 1 {
                return whole[1..].to_string();
            }
            format!("{}{}", slashes, registers[n - base])
        })
        .into_owned()
}
