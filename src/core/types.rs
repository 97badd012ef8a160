//! GY-001: Shared types for type tags, argument values, recipe configuration and bake results.
//!
//! Everything a recipe file or a caller hands to the engine is defined here.
//! Configuration types derive Serialize/Deserialize (YAML and JSON recipes) and
//! JsonSchema (for `galley schema`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::DishError;

// ============================================================================
// Type tags
// ============================================================================

/// The closed set of representations a dish value can take.
///
/// `ArrayBuffer` is the hub: every conversion goes through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TypeTag {
    ByteArray,
    String,
    Number,
    #[serde(rename = "HTML")]
    Html,
    ArrayBuffer,
    BigNumber,
    #[serde(rename = "JSON")]
    Json,
    File,
    #[serde(rename = "List<File>")]
    ListFile,
}

impl TypeTag {
    pub const ALL: [TypeTag; 9] = [
        Self::ByteArray,
        Self::String,
        Self::Number,
        Self::Html,
        Self::ArrayBuffer,
        Self::BigNumber,
        Self::Json,
        Self::File,
        Self::ListFile,
    ];

    /// Canonical display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ByteArray => "byteArray",
            Self::String => "string",
            Self::Number => "number",
            Self::Html => "html",
            Self::ArrayBuffer => "ArrayBuffer",
            Self::BigNumber => "BigNumber",
            Self::Json => "JSON",
            Self::File => "File",
            Self::ListFile => "List<File>",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TypeTag {
    type Err = DishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bytearray" | "byte array" => Ok(Self::ByteArray),
            "string" | "str" | "text" => Ok(Self::String),
            "number" | "num" => Ok(Self::Number),
            "html" => Ok(Self::Html),
            "arraybuffer" | "buffer" | "binary" | "bytes" => Ok(Self::ArrayBuffer),
            "bignumber" | "decimal" => Ok(Self::BigNumber),
            "json" => Ok(Self::Json),
            "file" => Ok(Self::File),
            "list<file>" | "listfile" | "files" => Ok(Self::ListFile),
            _ => Err(DishError::UnsupportedType(s.to_string())),
        }
    }
}

// ============================================================================
// Argument values
// ============================================================================

/// A runtime argument ("ingredient") value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Num(f64),
    Str(String),
    /// A string paired with an interpretation, e.g. a key given as Hex.
    Toggle { string: String, option: String },
}

impl ArgValue {
    /// The string form of the value (toggle strings yield their string part).
    pub fn as_str(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Num(n) => format_number(*n),
            Self::Str(s) => s.clone(),
            Self::Toggle { string, .. } => string.clone(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty() && s != "false",
            Self::Toggle { string, .. } => !string.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Toggle { .. } => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as usize)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggle { string, option } => write!(f, "{}({})", option, string),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ============================================================================
// Recipe configuration
// ============================================================================

/// One step of a recipe as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpConfig {
    /// Operation name, e.g. "From Base64"
    pub op: String,

    /// Positional arguments; missing trailing arguments take their defaults
    #[serde(default)]
    pub args: Vec<ArgValue>,

    /// Skip this step without running it
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,

    /// Pause execution before this step
    #[serde(default, skip_serializing_if = "is_false")]
    pub breakpoint: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl OpConfig {
    pub fn new(op: &str, args: Vec<ArgValue>) -> Self {
        Self {
            op: op.to_string(),
            args,
            disabled: false,
            breakpoint: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn with_breakpoint(mut self) -> Self {
        self.breakpoint = true;
        self
    }
}

/// A recipe file: a named list of steps.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecipeFile {
    /// Human-readable recipe name
    #[serde(default)]
    pub name: Option<String>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Ordered steps
    pub recipe: Vec<OpConfig>,
}

// ============================================================================
// Bake results
// ============================================================================

/// A fatal error as reported to the caller of a bake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BakeFailure {
    pub display_str: String,
}

/// Result of one top-level bake.
#[derive(Debug, Clone)]
pub struct BakeResult {
    /// Presented value, fetched as the requested return type
    pub result: super::dish::DishValue,
    /// Type of the dish after presentation
    pub result_type: TypeTag,
    /// Unpresented clone of the dish, captured before presentation
    pub raw: super::dish::Dish,
    /// Index execution stopped at (op-list length when complete)
    pub progress: usize,
    pub duration: Duration,
    pub error: Option<BakeFailure>,
}

impl BakeResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================
