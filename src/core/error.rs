//! GY-005: Error taxonomy.
//!
//! Only [`OpError::Operation`] and [`OpError::Dish`] are recovered inside the
//! interpreter loop. Everything else becomes a [`StepError`] and ends the bake.

use super::types::TypeTag;
use thiserror::Error;

/// Maximum number of characters of an offending value quoted in an error.
const SAMPLE_LEN: usize = 32;

/// Errors raised by the dish when storing or converting a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DishError {
    #[error("Data is not a valid {expected}: {sample}")]
    InvalidValue { expected: TypeTag, sample: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedType(String),

    #[error("Error translating from {from} to {to}: {reason}")]
    Conversion {
        from: TypeTag,
        to: TypeTag,
        reason: String,
    },
}

impl DishError {
    /// Build an `InvalidValue` error quoting a truncated sample of the value.
    pub fn invalid(expected: TypeTag, value: &impl std::fmt::Debug) -> Self {
        let full = format!("{:?}", value);
        let mut sample: String = full.chars().take(SAMPLE_LEN).collect();
        if full.chars().count() > SAMPLE_LEN {
            sample.push_str("...");
        }
        Self::InvalidValue { expected, sample }
    }
}

/// Errors an operation may return from `run`.
#[derive(Error, Debug)]
pub enum OpError {
    /// Expected, user-facing failure. Shown as the bake output.
    #[error("{0}")]
    Operation(String),

    #[error(transparent)]
    Dish(#[from] DishError),

    /// The operation cannot run in this build or environment.
    #[error("{0} is not supported in this environment")]
    Unsupported(String),

    #[error("{0}")]
    Unexpected(String),

    /// A nested sub-recipe already failed fatally; passed through unchanged.
    #[error(transparent)]
    Step(#[from] StepError),
}

impl OpError {
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Whether the interpreter converts this error into string output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Operation(_) | Self::Dish(_))
    }
}

impl From<regex::Error> for OpError {
    fn from(e: regex::Error) -> Self {
        Self::Operation(format!("Invalid regular expression: {}", e))
    }
}

/// A fatal step failure, decorated with where it happened.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{display_str}")]
pub struct StepError {
    /// Absolute index of the failing operation (fork offset included)
    pub progress: usize,
    /// "<op name> - <message>"
    pub display_str: String,
}

/// Errors while loading or hydrating a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("cannot read recipe {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("recipe parse error: {0}")]
    Parse(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("operation '{op}' argument '{arg}': {reason}")]
    InvalidArgument {
        op: String,
        arg: String,
        reason: String,
    },

    #[error("operation '{op}' takes {expected} argument(s), got {got}")]
    TooManyArguments {
        op: String,
        expected: usize,
        got: usize,
    },
}

/// Errors while loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}
