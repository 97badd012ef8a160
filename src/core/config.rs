//! GY-010: Engine configuration (`galley.toml`).

use super::error::ConfigError;
use super::types::TypeTag;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "galley.toml";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub magic: MagicConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Interpreter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound applied to every Jump's own max-jumps argument
    #[serde(default = "default_jump_ceiling")]
    pub jump_ceiling: usize,

    /// Type the bake result is fetched as (HTML output is always kept)
    #[serde(default = "default_return_type")]
    pub return_type: TypeTag,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            jump_ceiling: default_jump_ceiling(),
            return_type: default_return_type(),
        }
    }
}

/// Speculative decode search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicConfig {
    #[serde(default = "default_depth")]
    pub depth: usize,

    /// Brute-force single-byte XOR keys
    #[serde(default)]
    pub intensive: bool,

    /// Score against every known language instead of the common subset
    #[serde(default)]
    pub extensive_languages: bool,

    #[serde(default = "default_preview_length")]
    pub preview_length: usize,

    /// Prefix length used by brute-force candidates
    #[serde(default = "default_sample")]
    pub brute_force_sample: usize,
}

impl Default for MagicConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            intensive: false,
            extensive_languages: false,
            preview_length: default_preview_length(),
            brute_force_sample: default_sample(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "galley=debug"
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Concurrent bakes; 0 means one per available CPU
    #[serde(default)]
    pub workers: usize,
}

impl DispatchConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn default_jump_ceiling() -> usize {
    1000
}

fn default_return_type() -> TypeTag {
    TypeTag::ArrayBuffer
}

fn default_depth() -> usize {
    3
}

fn default_preview_length() -> usize {
    100
}

fn default_sample() -> usize {
    100
}

fn default_level() -> String {
    "warn".to_string()
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `path` if given, else `galley.toml` if present, else defaults.
    ///
    /// An explicitly named file must exist.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
