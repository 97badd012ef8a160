//! GY-020: Label, Jump and Conditional Jump.

use super::label_index;
use crate::core::error::OpError;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation};
use crate::core::state::RecipeState;
use crate::core::types::{ArgValue, TypeTag};
use regex::Regex;
use tracing::debug;

pub const LABEL_NAME: &str = "Label";

const fn flow_meta(
    name: &'static str,
    description: &'static str,
    args: &'static [ArgSpec],
) -> OpMeta {
    OpMeta {
        name,
        module: "Default",
        description,
        input_type: TypeTag::String,
        output_type: TypeTag::String,
        presentation_type: None,
        args,
        flow_control: true,
    }
}

static LABEL: OpMeta = flow_meta(
    LABEL_NAME,
    "Marks a location in a recipe for Jump operations to branch to.",
    &[ArgSpec {
        name: "Name",
        kind: ArgKind::String,
        default: Literal::Str(""),
    }],
);

static JUMP: OpMeta = flow_meta(
    "Jump",
    "Jump forwards or backwards to the specified Label.",
    &[
        ArgSpec {
            name: "Label name",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
        ArgSpec {
            name: "Maximum jumps (if jumping backwards)",
            kind: ArgKind::Number,
            default: Literal::Num(10.0),
        },
    ],
);

static CONDITIONAL_JUMP: OpMeta = flow_meta(
    "Conditional Jump",
    "Conditionally jump forwards or backwards to the specified Label based on whether the data matches the specified regular expression.",
    &[
        ArgSpec {
            name: "Match (regex)",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
        ArgSpec {
            name: "Invert match",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Label name",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
        ArgSpec {
            name: "Maximum jumps (if jumping backwards)",
            kind: ArgKind::Number,
            default: Literal::Num(10.0),
        },
    ],
);

/// No-op jump target.
pub struct Label;

impl Operation for Label {
    fn meta(&self) -> &'static OpMeta {
        &LABEL
    }

    fn run_flow(&self, _state: &mut RecipeState) -> Result<(), OpError> {
        Ok(())
    }
}

/// Resolve the jump target and check the jump budget.
///
/// `None` means the jump is a no-op: unknown label or budget spent.
fn jump_target(state: &RecipeState, label: &str, max_arg: Option<&ArgValue>) -> Option<usize> {
    let max_jumps = max_arg
        .and_then(ArgValue::as_usize)
        .unwrap_or(0)
        .min(state.ctx.limits.jump_ceiling);
    let Some(target) = label_index(&state.op_list, label) else {
        debug!("Label '{}' not found, not jumping", label);
        return None;
    };
    if state.num_jumps >= max_jumps {
        debug!("Reached maximum jumps ({}), not jumping", max_jumps);
        return None;
    }
    Some(target)
}

pub struct Jump;

impl Operation for Jump {
    fn meta(&self) -> &'static OpMeta {
        &JUMP
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let label = state.arg_str(0);
        if let Some(target) = jump_target(state, &label, state.arg(1)) {
            debug!("Jumping to label '{}' at {}", label, target);
            state.progress = target;
            state.num_jumps += 1;
        }
        Ok(())
    }
}

pub struct ConditionalJump;

impl Operation for ConditionalJump {
    fn meta(&self) -> &'static OpMeta {
        &CONDITIONAL_JUMP
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let pattern = state.arg_str(0);
        let invert = state.arg_bool(1);
        let label = state.arg_str(2);
        let Some(target) = jump_target(state, &label, state.arg(3)) else {
            return Ok(());
        };

        let matched = if pattern.is_empty() {
            false
        } else {
            let re = Regex::new(&pattern)?;
            let text = state.dish.get_string()?;
            re.is_match(&text) != invert
        };

        if matched {
            debug!("Condition met, jumping to label '{}' at {}", label, target);
            state.progress = target;
            state.num_jumps += 1;
        } else {
            state.num_jumps = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::dish::Dish;
    use crate::core::executor::execute;
    use crate::core::operation::OperationInstance;
    use crate::core::state::{BakeContext, RecipeState};
    use crate::core::testkit::{self, op, Counting};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_recipe(
        before: &[crate::core::types::OpConfig],
        after: &[crate::core::types::OpConfig],
        calls: &Arc<AtomicUsize>,
    ) -> RecipeState {
        let mut ops = testkit::hydrate(before);
        ops.push(OperationInstance::new(
            Arc::new(Counting {
                calls: calls.clone(),
            }),
            vec![],
        ));
        ops.extend(testkit::hydrate(after));
        RecipeState::new(
            Dish::from_string("x"),
            ops,
            BakeContext::new(testkit::registry()),
        )
    }

    #[test]
    fn test_gy020_jump_bounded_by_max_jumps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut state = counting_recipe(
            &[op("Label", vec!["loop".into()])],
            &[op("Jump", vec!["loop".into(), 3.0.into()])],
            &calls,
        );
        assert_eq!(execute(&mut state).unwrap(), 3);
        // One straight pass plus exactly three jumps
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(state.num_jumps, 3);
    }

    #[test]
    fn test_gy020_jump_forward_skips_ops() {
        let out = testkit::run_to_string(
            "abc",
            &[
                op("Jump", vec!["end".into(), 1.0.into()]),
                op("To Upper case", vec![]),
                op("Label", vec!["end".into()]),
                op("Reverse", vec![]),
            ],
        );
        assert_eq!(out, "cba");
    }

    #[test]
    fn test_gy020_jump_to_missing_label_is_noop() {
        let (mut state, result) = testkit::run(
            "abc",
            &[
                op("Jump", vec!["nowhere".into(), 5.0.into()]),
                op("To Upper case", vec![]),
            ],
        );
        assert_eq!(result.unwrap(), 2);
        assert_eq!(state.num_jumps, 0);
        assert_eq!(state.dish.get_string().unwrap(), "ABC");
    }

    #[test]
    fn test_gy020_jump_ceiling_caps_max_jumps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut state = counting_recipe(
            &[op("Label", vec!["loop".into()])],
            &[op("Jump", vec!["loop".into(), 50.0.into()])],
            &calls,
        );
        state.ctx.limits.jump_ceiling = 2;
        execute(&mut state).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gy020_conditional_jump_loops_while_matching() {
        // Append "a" until the text holds four of them.
        let out = testkit::run_to_string(
            "a",
            &[
                op("Label", vec!["top".into()]),
                op(
                    "Find / Replace",
                    vec![
                        crate::core::types::ArgValue::Toggle {
                            string: "$".into(),
                            option: "Regex".into(),
                        },
                        "a".into(),
                        false.into(),
                    ],
                ),
                op(
                    "Conditional Jump",
                    vec!["^a{4}$".into(), true.into(), "top".into(), 10.0.into()],
                ),
            ],
        );
        assert_eq!(out, "aaaa");
    }

    #[test]
    fn test_gy020_conditional_non_match_resets_counter() {
        let mut state = testkit::state(
            "abc",
            &[
                op("Label", vec!["x".into()]),
                op(
                    "Conditional Jump",
                    vec!["zzz".into(), false.into(), "x".into(), 10.0.into()],
                ),
            ],
        );
        state.num_jumps = 4;
        execute(&mut state).unwrap();
        assert_eq!(state.num_jumps, 0);
    }

    #[test]
    fn test_gy020_conditional_empty_pattern_never_matches() {
        for invert in [false, true] {
            let mut state = testkit::state(
                "abc",
                &[
                    op("Label", vec!["x".into()]),
                    op(
                        "Conditional Jump",
                        vec!["".into(), invert.into(), "x".into(), 10.0.into()],
                    ),
                ],
            );
            state.num_jumps = 2;
            assert_eq!(execute(&mut state).unwrap(), 2);
            assert_eq!(state.num_jumps, 0);
        }
    }

    #[test]
    fn test_gy020_conditional_budget_spent_is_noop() {
        let mut state = testkit::state(
            "abc",
            &[
                op("Label", vec!["x".into()]),
                op(
                    "Conditional Jump",
                    vec!["abc".into(), false.into(), "x".into(), 1.0.into()],
                ),
            ],
        );
        state.num_jumps = 1;
        assert_eq!(execute(&mut state).unwrap(), 2);
        // Counter untouched by the no-op
        assert_eq!(state.num_jumps, 1);
    }

    #[test]
    fn test_gy020_conditional_bad_regex_is_recovered() {
        let (state, result) = testkit::run(
            "abc",
            &[
                op("Label", vec!["x".into()]),
                op(
                    "Conditional Jump",
                    vec!["(".into(), false.into(), "x".into(), 1.0.into()],
                ),
            ],
        );
        assert_eq!(result.unwrap(), 1);
        assert!(state
            .dish
            .value()
            .as_text()
            .unwrap()
            .starts_with("Invalid regular expression"));
    }
}
