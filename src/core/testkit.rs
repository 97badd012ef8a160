//! Shared fixtures for interpreter and flow-control tests.

use super::dish::{Dish, DishValue};
use super::error::{OpError, StepError};
use super::executor;
use super::operation::{OpMeta, Operation, OperationInstance, OperationRegistry};
use super::recipe;
use super::state::{BakeContext, RecipeState};
use super::types::{ArgValue, OpConfig, TypeTag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identity operation counting how often it ran.
pub struct Counting {
    pub calls: Arc<AtomicUsize>,
}

static COUNTING: OpMeta = OpMeta {
    name: "Count Calls",
    module: "Test",
    description: "",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

impl Operation for Counting {
    fn meta(&self) -> &'static OpMeta {
        &COUNTING
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(input)
    }
}

/// Always fails with an expected, user-facing error.
pub struct Failing;

static FAILING: OpMeta = OpMeta {
    name: "Fail",
    module: "Test",
    description: "",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

impl Operation for Failing {
    fn meta(&self) -> &'static OpMeta {
        &FAILING
    }

    fn run(&self, _input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        Err(OpError::operation("deliberate failure"))
    }
}

/// Always fails with an unexpected error.
pub struct Crashing;

static CRASHING: OpMeta = OpMeta {
    name: "Crash",
    module: "Test",
    description: "",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

impl Operation for Crashing {
    fn meta(&self) -> &'static OpMeta {
        &CRASHING
    }

    fn run(&self, _input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        Err(OpError::Unexpected("boom".into()))
    }
}

/// Wraps its input in bold tags when presented.
pub struct Emphasise;

static EMPHASISE: OpMeta = OpMeta {
    name: "Emphasise",
    module: "Test",
    description: "",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: Some(TypeTag::Html),
    args: &[],
    flow_control: false,
};

impl Operation for Emphasise {
    fn meta(&self) -> &'static OpMeta {
        &EMPHASISE
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        Ok(input)
    }

    fn has_presenter(&self) -> bool {
        true
    }

    fn present(&self, output: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        Ok(DishValue::Html(format!("<b>{}</b>", output.into_text()?)))
    }
}

/// Built-ins plus the failing test operations.
pub fn registry() -> OperationRegistry {
    let mut builder = OperationRegistry::builtin_builder();
    builder.register(Failing).register(Crashing).register(Emphasise);
    builder.build()
}

pub fn op(name: &str, args: Vec<ArgValue>) -> OpConfig {
    OpConfig::new(name, args)
}

pub fn hydrate(config: &[OpConfig]) -> Vec<OperationInstance> {
    recipe::hydrate(config, &registry()).expect("test recipe hydrates")
}

pub fn state(input: &str, config: &[OpConfig]) -> RecipeState {
    RecipeState::new(
        Dish::from_string(input),
        hydrate(config),
        BakeContext::new(registry()),
    )
}

/// Run `config` on `input`, returning the final state and execute's result.
pub fn run(input: &str, config: &[OpConfig]) -> (RecipeState, Result<usize, StepError>) {
    let mut st = state(input, config);
    let result = executor::execute(&mut st);
    (st, result)
}

/// Run and return the output as a string, panicking on fatal errors.
pub fn run_to_string(input: &str, config: &[OpConfig]) -> String {
    let (mut st, result) = run(input, config);
    result.expect("bake succeeds");
    st.dish.get_string().expect("output is text")
}
