//! GY-021: Fork, Merge and Subsection. Run a sub-recipe per piece of the input.
//!
//! The sub-recipe is the slice of operations between the opening operation and
//! its matching Merge. Every branch runs on a fresh copy of that slice, so
//! argument rewrites made by a Register in one branch never reach the next.

use super::find_matching_merge;
use crate::core::dish::{Dish, DishValue};
use crate::core::error::{OpError, StepError};
use crate::core::executor;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation, OperationInstance};
use crate::core::state::RecipeState;
use crate::core::types::TypeTag;
use crate::ops::unescape;
use regex::RegexBuilder;
use std::ops::Range;
use tracing::debug;

pub const FORK_NAME: &str = "Fork";
pub const MERGE_NAME: &str = "Merge";
pub const SUBSECTION_NAME: &str = "Subsection";

static FORK: OpMeta = OpMeta {
    name: FORK_NAME,
    module: "Default",
    description: "Split the input data up based on the specified delimiter and run all subsequent operations on each branch separately.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Split delimiter",
            kind: ArgKind::String,
            default: Literal::Str("\\n"),
        },
        ArgSpec {
            name: "Merge delimiter",
            kind: ArgKind::String,
            default: Literal::Str("\\n"),
        },
        ArgSpec {
            name: "Ignore errors",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
    ],
    flow_control: true,
};

static MERGE: OpMeta = OpMeta {
    name: MERGE_NAME,
    module: "Default",
    description: "Consolidate all branches back into a single trunk. The opposite of Fork.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Merge all",
        kind: ArgKind::Boolean,
        default: Literal::Bool(true),
    }],
    flow_control: true,
};

static SUBSECTION: OpMeta = OpMeta {
    name: SUBSECTION_NAME,
    module: "Default",
    description: "Select a part of the input data using a regular expression and run all subsequent operations on each match separately.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Section (regex)",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
        ArgSpec {
            name: "Case sensitive matching",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Global matching",
            kind: ArgKind::Boolean,
            default: Literal::Bool(true),
        },
        ArgSpec {
            name: "Ignore errors",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
    ],
    flow_control: true,
};

// ============================================================================
// Branch execution
// ============================================================================

/// The operations between an opening op at `state.progress` and its Merge.
fn sub_recipe(state: &RecipeState) -> Vec<OperationInstance> {
    let end = find_matching_merge(&state.op_list, state.progress);
    state.op_list[state.progress + 1..end].to_vec()
}

/// Run one branch of `ops` over `input`.
///
/// Returns the branch output and the sub-recipe progress it reached. A fatal
/// branch error propagates unless `ignore_errors` is set, in which case the
/// partial output is kept and progress moves one past the failing step.
fn run_branch(
    parent: &RecipeState,
    ops: &[OperationInstance],
    input: String,
    ignore_errors: bool,
) -> Result<(String, usize), OpError> {
    let mut branch = RecipeState::new(Dish::from_string(input), ops.to_vec(), parent.ctx.clone());
    branch.fork_offset = parent.fork_offset + parent.progress + 1;
    branch.num_registers = parent.num_registers;

    let progress = match executor::execute(&mut branch) {
        Ok(p) => p,
        Err(StepError { progress, display_str }) if ignore_errors => {
            debug!("ignoring branch error: {}", display_str);
            progress - branch.fork_offset + 1
        }
        Err(e) => return Err(OpError::Step(e)),
    };
    Ok((branch.dish.get_string()?, progress))
}

/// Splits the input and runs the sub-recipe on every piece.
pub struct Fork;

impl Operation for Fork {
    fn meta(&self) -> &'static OpMeta {
        &FORK
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let split_delim = unescape(&state.arg_str(0));
        let merge_delim = unescape(&state.arg_str(1));
        let ignore_errors = state.arg_bool(2);

        let input = state.dish.get_string()?;
        let inputs: Vec<String> = if split_delim.is_empty() {
            input.chars().map(String::from).collect()
        } else {
            input.split(split_delim.as_str()).map(String::from).collect()
        };
        let ops = sub_recipe(state);
        debug!("Forking {} branches over {} operations", inputs.len(), ops.len());

        let mut outputs = Vec::with_capacity(inputs.len());
        let mut progress = 0;
        for branch_input in inputs {
            let (output, p) = run_branch(state, &ops, branch_input, ignore_errors)?;
            outputs.push(output);
            progress = p;
        }

        state
            .dish
            .set(DishValue::String(outputs.join(&merge_delim)), TypeTag::String)?;
        state.progress += progress;
        Ok(())
    }
}

/// Closes a Fork or Subsection. Does nothing when executed.
pub struct Merge;

impl Operation for Merge {
    fn meta(&self) -> &'static OpMeta {
        &MERGE
    }

    fn run_flow(&self, _state: &mut RecipeState) -> Result<(), OpError> {
        Ok(())
    }
}

/// Runs the sub-recipe on every regex-selected section of the input and
/// splices the results back into the surrounding text.
pub struct Subsection;

impl Operation for Subsection {
    fn meta(&self) -> &'static OpMeta {
        &SUBSECTION
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let pattern = state.arg_str(0);
        let case_sensitive = state.arg_bool(1);
        let global = state.arg_bool(2);
        let ignore_errors = state.arg_bool(3);

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(!case_sensitive)
            .build()?;
        let input = state.dish.get_string()?;
        let ops = sub_recipe(state);

        // Section = first capture group if the pattern has one, else the whole match.
        let mut sections: Vec<Range<usize>> = Vec::new();
        for caps in re.captures_iter(&input) {
            let section = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = section {
                sections.push(m.range());
            }
            if !global {
                break;
            }
        }

        if sections.is_empty() {
            debug!("No sections matched, skipping {} operations", ops.len());
            state.progress += ops.len();
            return Ok(());
        }

        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        let mut progress = 0;
        for range in sections {
            output.push_str(&input[last..range.start]);
            let (out, p) = run_branch(state, &ops, input[range.clone()].to_string(), ignore_errors)?;
            output.push_str(&out);
            progress = p;
            last = range.end;
        }
        output.push_str(&input[last..]);

        state.dish.set(DishValue::String(output), TypeTag::String)?;
        state.progress += progress;
        Ok(())
    }
}
