//! GY-006: Operation capability contract and registry.
//!
//! Every transformation step implements [`Operation`]. Static metadata lives in
//! an [`OpMeta`] so that the registry, recipe hydration and Magic can inspect an
//! operation without running it.

use super::dish::DishValue;
use super::error::OpError;
use super::state::RecipeState;
use super::types::{ArgValue, TypeTag};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

// ============================================================================
// Argument schema
// ============================================================================

/// A compile-time argument value (defaults, Magic check arguments).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Str(&'static str),
    Num(f64),
    Bool(bool),
    Toggle(&'static str, &'static str),
}

impl Literal {
    pub fn to_arg(self) -> ArgValue {
        match self {
            Self::Str(s) => ArgValue::Str(s.to_string()),
            Self::Num(n) => ArgValue::Num(n),
            Self::Bool(b) => ArgValue::Bool(b),
            Self::Toggle(string, option) => ArgValue::Toggle {
                string: string.to_string(),
                option: option.to_string(),
            },
        }
    }
}

/// The kind of value an argument accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgKind {
    String,
    Number,
    Boolean,
    /// One of a fixed list of strings.
    Option(&'static [&'static str]),
    /// A string plus an interpretation chosen from a fixed list.
    Toggle(&'static [&'static str]),
}

/// One entry of an operation's argument schema.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub default: Literal,
}

/// Static description of an operation.
#[derive(Debug)]
pub struct OpMeta {
    pub name: &'static str,
    pub module: &'static str,
    pub description: &'static str,
    pub input_type: TypeTag,
    pub output_type: TypeTag,
    /// Type of the value produced by `present`, when it differs from the output type
    pub presentation_type: Option<TypeTag>,
    pub args: &'static [ArgSpec],
    pub flow_control: bool,
}

impl OpMeta {
    pub fn default_args(&self) -> Vec<ArgValue> {
        self.args.iter().map(|a| a.default.to_arg()).collect()
    }
}

/// A structural hint telling Magic when an operation plausibly applies.
#[derive(Debug, Clone, Copy)]
pub struct MagicCheck {
    /// Byte regex matched against the raw input
    pub pattern: &'static str,
    pub case_insensitive: bool,
    /// Arguments to run the operation with when the pattern matches
    pub args: &'static [Literal],
    /// Whether the output is worth reporting even when it scores badly
    pub useful: bool,
    /// Required Shannon entropy range of the input, if any
    pub entropy_range: Option<(f64, f64)>,
}

// ============================================================================
// The contract
// ============================================================================

/// A single named transformation step.
///
/// Ordinary operations implement [`run`](Operation::run). Flow-control
/// operations set `flow_control` in their metadata and implement
/// [`run_flow`](Operation::run_flow) instead, receiving the whole recipe state.
pub trait Operation: Send + Sync + 'static {
    fn meta(&self) -> &'static OpMeta;

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let _ = (input, args);
        Err(OpError::Unsupported(self.meta().name.to_string()))
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let _ = state;
        Err(OpError::Unsupported(self.meta().name.to_string()))
    }

    /// Whether [`present`](Operation::present) does anything.
    fn has_presenter(&self) -> bool {
        false
    }

    /// Post-process the final output for display.
    fn present(&self, output: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let _ = args;
        Ok(output)
    }

    /// Whether both highlight mappings are implemented.
    fn can_highlight(&self) -> bool {
        false
    }

    /// Map input selection offsets to output offsets.
    fn highlight(&self, pos: &[Range<usize>], args: &[ArgValue]) -> Option<Vec<Range<usize>>> {
        let _ = (pos, args);
        None
    }

    /// Map output selection offsets back to input offsets.
    fn highlight_reverse(
        &self,
        pos: &[Range<usize>],
        args: &[ArgValue],
    ) -> Option<Vec<Range<usize>>> {
        let _ = (pos, args);
        None
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        &[]
    }
}

// ============================================================================
// Instances
// ============================================================================

/// An operation bound to concrete argument values within one recipe.
///
/// Cloning shares the implementation and deep-copies the arguments.
#[derive(Clone)]
pub struct OperationInstance {
    op: Arc<dyn Operation>,
    pub args: Vec<ArgValue>,
    pub disabled: bool,
    pub breakpoint: bool,
}

impl OperationInstance {
    pub fn new(op: Arc<dyn Operation>, args: Vec<ArgValue>) -> Self {
        Self {
            op,
            args,
            disabled: false,
            breakpoint: false,
        }
    }

    pub fn op(&self) -> &Arc<dyn Operation> {
        &self.op
    }

    pub fn meta(&self) -> &'static OpMeta {
        self.op.meta()
    }

    pub fn name(&self) -> &'static str {
        self.op.meta().name
    }

    pub fn input_type(&self) -> TypeTag {
        self.op.meta().input_type
    }

    pub fn output_type(&self) -> TypeTag {
        self.op.meta().output_type
    }

    pub fn flow_control(&self) -> bool {
        self.op.meta().flow_control
    }

    pub fn arg(&self, index: usize) -> Option<&ArgValue> {
        self.args.get(index)
    }
}

impl fmt::Debug for OperationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationInstance")
            .field("name", &self.name())
            .field("args", &self.args)
            .field("disabled", &self.disabled)
            .field("breakpoint", &self.breakpoint)
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

type OpMap = IndexMap<String, Arc<dyn Operation>, FxBuildHasher>;

/// Builder used to register operations before baking.
pub struct OperationRegistryBuilder {
    operations: OpMap,
}

impl Default for OperationRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistryBuilder {
    pub fn new() -> Self {
        Self {
            operations: OpMap::default(),
        }
    }

    pub fn register<T: Operation>(&mut self, operation: T) -> &mut Self {
        let name = operation.meta().name;
        if self.operations.contains_key(name) {
            panic!("duplicate operation registered: {}", name);
        }
        self.operations.insert(name.to_string(), Arc::new(operation));
        self
    }

    pub fn build(self) -> OperationRegistry {
        OperationRegistry {
            inner: Arc::new(self.operations),
        }
    }
}

/// Immutable name → implementation map, cheap to clone.
#[derive(Clone)]
pub struct OperationRegistry {
    inner: Arc<OpMap>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        OperationRegistryBuilder::new().build()
    }

    pub fn builder() -> OperationRegistryBuilder {
        OperationRegistryBuilder::new()
    }

    /// Registry holding every built-in operation.
    pub fn with_builtins() -> Self {
        Self::builtin_builder().build()
    }

    /// A builder pre-loaded with the built-in operations, for callers that add their own.
    pub fn builtin_builder() -> OperationRegistryBuilder {
        let mut builder = Self::builder();
        crate::ops::register_builtins(&mut builder);
        crate::flow::register_flow_control(&mut builder);
        builder.register(crate::magic::MagicOperation);
        builder
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.inner.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Operations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Operation>> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.keys()).finish()
    }
}
