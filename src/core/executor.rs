//! GY-008: Recipe interpreter. The step loop over a [`RecipeState`].
//!
//! For each step: skip if disabled, halt on a breakpoint, hand the whole state
//! to flow-control operations, otherwise get input → run → set output.
//! Expected failures end the loop with the message as output; anything else
//! becomes a [`StepError`].

use super::dish::Dish;
use super::error::{OpError, RecipeError, StepError};
use super::operation::{OperationInstance, OperationRegistry};
use super::recipe;
use super::state::{BakeContext, RecipeState};
use super::types::{ArgValue, OpConfig, TypeTag};
use tracing::{debug, trace};

/// An ordered list of hydrated operations.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    op_list: Vec<OperationInstance>,
}

impl Recipe {
    pub fn new(op_list: Vec<OperationInstance>) -> Self {
        Self { op_list }
    }

    /// Hydrate a recipe configuration against `registry`.
    pub fn from_config(
        config: &[OpConfig],
        registry: &OperationRegistry,
    ) -> Result<Self, RecipeError> {
        Ok(Self::new(recipe::hydrate(config, registry)?))
    }

    pub fn ops(&self) -> &[OperationInstance] {
        &self.op_list
    }

    pub fn len(&self) -> usize {
        self.op_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.op_list.is_empty()
    }

    /// Set or unset a breakpoint. Out-of-range positions are ignored.
    pub fn set_breakpoint(&mut self, pos: usize, value: bool) {
        if let Some(op) = self.op_list.get_mut(pos) {
            op.breakpoint = value;
        }
    }

    /// Remove every breakpoint before `pos`.
    pub fn remove_breaks_until(&mut self, pos: usize) {
        for op in self.op_list.iter_mut().take(pos) {
            op.breakpoint = false;
        }
    }

    pub fn set_disabled(&mut self, pos: usize, value: bool) {
        if let Some(op) = self.op_list.get_mut(pos) {
            op.disabled = value;
        }
    }

    pub fn contains_flow_control(&self) -> bool {
        self.op_list.iter().any(OperationInstance::flow_control)
    }

    /// Operations to map highlights through, or `None` if highlighting is
    /// unavailable for this recipe.
    pub fn highlight_list(&self) -> Option<Vec<&OperationInstance>> {
        let mut list = Vec::new();
        for op in &self.op_list {
            if op.breakpoint {
                return None;
            }
            if op.disabled {
                continue;
            }
            if !op.op().can_highlight() {
                return None;
            }
            list.push(op);
        }
        Some(list)
    }

    /// Build the initial state for executing this recipe on `dish`.
    pub fn into_state(self, dish: Dish, ctx: BakeContext) -> RecipeState {
        RecipeState::new(dish, self.op_list, ctx)
    }
}

fn format_args(args: &[ArgValue]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run `state` from its current progress until completion, a breakpoint or an
/// error.
///
/// Returns the index execution stopped at: the op-list length when complete,
/// the breakpoint index, or the index of an operation whose expected failure
/// was written into the dish.
pub fn execute(state: &mut RecipeState) -> Result<usize, StepError> {
    while state.progress < state.op_list.len() {
        let i = state.progress;
        let op = state.op_list[i].clone();
        debug!("[{}] {} {}", state.fork_offset + i, op.name(), format_args(&op.args));

        if op.disabled {
            debug!("Operation is disabled, skipping");
            state.progress += 1;
            continue;
        }
        if op.breakpoint {
            debug!("Pausing at breakpoint");
            return Ok(i);
        }
        if let Some(reporter) = &state.ctx.reporter {
            reporter.progress(state.fork_offset + i + 1, state.fork_offset + state.op_list.len());
        }

        let result = if op.flow_control() {
            op.op().run_flow(state)
        } else {
            run_operation(&op, &mut state.dish)
        };

        match result {
            Ok(()) => {
                if !op.flow_control() || op.op().has_presenter() {
                    state.last_run = Some(i);
                }
                state.progress = (state.progress + 1).min(state.op_list.len());
            }
            Err(e) if e.is_recoverable() => {
                debug!("{} failed: {}", op.name(), e);
                state.dish = Dish::from_string(e.to_string());
                // The message is not that operation's output
                state.last_run = None;
                return Ok(i);
            }
            Err(OpError::Step(e)) => return Err(e),
            Err(e) => {
                return Err(StepError {
                    progress: state.fork_offset + i,
                    display_str: format!("{} - {}", op.name(), e),
                })
            }
        }
    }

    debug!("Recipe complete");
    Ok(state.op_list.len())
}

fn run_operation(op: &OperationInstance, dish: &mut Dish) -> Result<(), OpError> {
    let input = dish.get(op.input_type())?;
    let output = op.op().run(input, &op.args)?;
    dish.set(output, op.output_type())?;
    Ok(())
}

/// Apply the last executed operation's presenter to the dish.
///
/// Does nothing when no eligible operation ran or it has no presenter.
pub fn present(state: &mut RecipeState) -> Result<(), OpError> {
    let Some(op) = state.last_run.and_then(|i| state.op_list.get(i)) else {
        return Ok(());
    };
    if !op.op().has_presenter() {
        return Ok(());
    }
    trace!("presenting output of {}", op.name());
    let output = state.dish.get(op.output_type())?;
    let presented = op.op().present(output, &op.args)?;
    let tag: TypeTag = op.meta().presentation_type.unwrap_or(op.output_type());
    state.dish.set(presented, tag)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dish::DishValue;
    use crate::core::testkit::{self, op, Counting};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_gy008_plain_pipeline() {
        let out = testkit::run_to_string(
            "aGVsbG8=",
            &[op("From Base64", vec![]), op("To Upper case", vec![])],
        );
        assert_eq!(out, "HELLO");
    }

    #[test]
    fn test_gy008_disabled_op_never_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = OperationInstance::new(
            Arc::new(Counting {
                calls: calls.clone(),
            }),
            vec![],
        );
        let mut disabled = counting.clone();
        disabled.disabled = true;
        let mut ops = vec![disabled];
        ops.extend(testkit::hydrate(&[op("To Upper case", vec![])]));

        let mut state = RecipeState::new(Dish::from_string("x"), ops, BakeContext::default());
        assert_eq!(execute(&mut state).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.dish.get_string().unwrap(), "X");
    }

    #[test]
    fn test_gy008_disabled_flow_control_advances() {
        let config = [
            op("Label", vec!["top".into()]),
            op("Jump", vec!["top".into(), 10.0.into()]).disabled(),
            op("To Upper case", vec![]),
        ];
        let (mut state, result) = testkit::run("abc", &config);
        assert_eq!(result.unwrap(), 3);
        assert_eq!(state.num_jumps, 0);
        assert_eq!(state.dish.get_string().unwrap(), "ABC");
    }

    #[test]
    fn test_gy008_breakpoint_halts_before_op() {
        let config = [
            op("To Upper case", vec![]),
            op("Reverse", vec![]).with_breakpoint(),
            op("To Lower case", vec![]),
        ];
        let (mut state, result) = testkit::run("abc", &config);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(state.progress, 1);
        assert_eq!(state.dish.get_string().unwrap(), "ABC");
    }

    #[test]
    fn test_gy008_breakpoint_at_start_halts() {
        let config = [op("To Upper case", vec![]).with_breakpoint()];
        let (mut state, result) = testkit::run("abc", &config);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(state.dish.get_string().unwrap(), "abc");
    }

    #[test]
    fn test_gy008_operation_error_becomes_output() {
        let config = [
            op("To Upper case", vec![]),
            op("Fail", vec![]),
            op("Reverse", vec![]),
        ];
        let (state, result) = testkit::run("abc", &config);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            state.dish.value(),
            &DishValue::String("deliberate failure".into())
        );
    }

    #[test]
    fn test_gy008_dish_error_is_recovered() {
        let config = [op("JSON Beautify", vec![])];
        let (state, result) = testkit::run("{broken", &config);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(state.dish.type_tag(), TypeTag::String);
    }

    #[test]
    fn test_gy008_unexpected_error_is_decorated() {
        let config = [op("To Upper case", vec![]), op("Crash", vec![])];
        let mut state = testkit::state("abc", &config);
        state.fork_offset = 5;
        let err = execute(&mut state).unwrap_err();
        assert_eq!(err.progress, 6);
        assert_eq!(err.display_str, "Crash - boom");
        // Earlier output survives
        assert_eq!(state.dish.get_string().unwrap(), "ABC");
    }

    #[test]
    fn test_gy008_resume_from_progress() {
        let config = [op("To Upper case", vec![]), op("Reverse", vec![])];
        let mut state = testkit::state("abc", &config);
        state.progress = 1;
        assert_eq!(execute(&mut state).unwrap(), 2);
        assert_eq!(state.dish.get_string().unwrap(), "cba");
    }

    #[test]
    fn test_gy008_present_last_run_op() {
        let config = [op("Reverse", vec![]), op("Emphasise", vec![])];
        let (mut state, result) = testkit::run("ab", &config);
        result.unwrap();
        let raw = state.dish.clone();
        present(&mut state).unwrap();
        assert_eq!(state.dish.value(), &DishValue::Html("<b>ba</b>".into()));
        assert_eq!(raw.value(), &DishValue::String("ba".into()));
    }

    #[test]
    fn test_gy008_error_message_is_not_presented() {
        let config = [op("Emphasise", vec![]), op("Fail", vec![])];
        let (mut state, result) = testkit::run("ab", &config);
        assert_eq!(result.unwrap(), 1);
        present(&mut state).unwrap();
        assert_eq!(
            state.dish.value(),
            &DishValue::String("deliberate failure".into())
        );
    }

    #[test]
    fn test_gy008_present_skips_when_last_op_has_no_presenter() {
        let config = [op("Emphasise", vec![]), op("Reverse", vec![])];
        let (mut state, result) = testkit::run("ab", &config);
        result.unwrap();
        present(&mut state).unwrap();
        assert_ne!(state.dish.type_tag(), TypeTag::Html);
        assert_eq!(state.dish.get_string().unwrap(), "ba");
    }

    #[test]
    fn test_gy008_present_ignores_plain_flow_control() {
        let config = [op("Emphasise", vec![]), op("Comment", vec!["done".into()])];
        let (mut state, result) = testkit::run("ab", &config);
        result.unwrap();
        assert_eq!(state.last_run, Some(0));
        present(&mut state).unwrap();
        assert_eq!(state.dish.type_tag(), TypeTag::Html);
    }

    #[test]
    fn test_gy008_breakpoint_management() {
        let registry = testkit::registry();
        let config = [
            op("To Upper case", vec![]).with_breakpoint(),
            op("Reverse", vec![]).with_breakpoint(),
            op("To Lower case", vec![]),
        ];
        let mut recipe = Recipe::from_config(&config, &registry).unwrap();
        recipe.remove_breaks_until(1);
        assert!(!recipe.ops()[0].breakpoint);
        assert!(recipe.ops()[1].breakpoint);
        recipe.set_breakpoint(1, false);
        recipe.set_breakpoint(99, true);
        assert!(recipe.ops().iter().all(|o| !o.breakpoint));
        assert!(!recipe.contains_flow_control());
    }

    #[test]
    fn test_gy008_highlight_list() {
        let registry = testkit::registry();
        let ok = Recipe::from_config(
            &[op("To Upper case", vec![]), op("To Hex", vec![])],
            &registry,
        )
        .unwrap();
        assert_eq!(ok.highlight_list().unwrap().len(), 2);

        let unsupported =
            Recipe::from_config(&[op("To Upper case", vec![]), op("SHA2", vec![])], &registry)
                .unwrap();
        assert!(unsupported.highlight_list().is_none());

        let skipped = Recipe::from_config(
            &[op("To Upper case", vec![]), op("SHA2", vec![]).disabled()],
            &registry,
        )
        .unwrap();
        assert_eq!(skipped.highlight_list().unwrap().len(), 1);

        let paused = Recipe::from_config(&[op("To Upper case", vec![]).with_breakpoint()], &registry)
            .unwrap();
        assert!(paused.highlight_list().is_none());
    }

    struct Recorder(parking_lot::Mutex<Vec<(usize, usize)>>);

    impl crate::core::state::ProgressReporter for Recorder {
        fn progress(&self, step: usize, total: usize) {
            self.0.lock().push((step, total));
        }
    }

    #[test]
    fn test_gy008_progress_reporting() {
        let recorder = Arc::new(Recorder(parking_lot::Mutex::new(Vec::new())));
        let mut state = testkit::state(
            "abc",
            &[
                op("To Upper case", vec![]),
                op("Reverse", vec![]).disabled(),
                op("To Lower case", vec![]),
            ],
        );
        state.ctx.reporter = Some(recorder.clone());
        execute(&mut state).unwrap();
        assert_eq!(*recorder.0.lock(), vec![(1, 3), (3, 3)]);
    }
}
