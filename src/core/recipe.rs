//! GY-002: Recipe loading, argument validation, and hydration into operations.
//!
//! A recipe file is YAML or JSON: either a `RecipeFile` mapping or a bare list
//! of steps. Hydration resolves each step's operation name against the
//! registry and normalises its arguments against the operation's schema:
//! missing trailing arguments take their defaults, provided ones are checked
//! and coerced to the declared kind.

use super::error::RecipeError;
use super::operation::{ArgKind, ArgSpec, OpMeta, OperationInstance, OperationRegistry};
use super::types::{ArgValue, OpConfig, RecipeFile};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeDoc {
    File(RecipeFile),
    Steps(Vec<OpConfig>),
}

impl From<RecipeDoc> for RecipeFile {
    fn from(doc: RecipeDoc) -> Self {
        match doc {
            RecipeDoc::File(f) => f,
            RecipeDoc::Steps(recipe) => RecipeFile {
                name: None,
                description: None,
                recipe,
            },
        }
    }
}

/// Load a recipe file; `.json` files are parsed as JSON, anything else as YAML.
pub fn load_recipe(path: &Path) -> Result<RecipeFile, RecipeError> {
    let content = std::fs::read_to_string(path).map_err(|source| RecipeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_recipe_json(&content)
    } else {
        parse_recipe(&content)
    }
}

/// Parse a recipe from a YAML string.
pub fn parse_recipe(yaml: &str) -> Result<RecipeFile, RecipeError> {
    let doc: RecipeDoc =
        serde_yaml_ng::from_str(yaml).map_err(|e| RecipeError::Parse(e.to_string()))?;
    Ok(doc.into())
}

/// Parse a recipe from a JSON string.
pub fn parse_recipe_json(json: &str) -> Result<RecipeFile, RecipeError> {
    let doc: RecipeDoc =
        serde_json::from_str(json).map_err(|e| RecipeError::Parse(e.to_string()))?;
    Ok(doc.into())
}

/// Resolve every step against `registry`.
pub fn hydrate(
    config: &[OpConfig],
    registry: &OperationRegistry,
) -> Result<Vec<OperationInstance>, RecipeError> {
    config
        .iter()
        .map(|step| {
            let op = registry
                .get(&step.op)
                .ok_or_else(|| RecipeError::UnknownOperation(step.op.clone()))?;
            let args = normalize_args(op.meta(), &step.args)?;
            let mut instance = OperationInstance::new(op, args);
            instance.disabled = step.disabled;
            instance.breakpoint = step.breakpoint;
            Ok(instance)
        })
        .collect()
}

/// Fill defaults and validate provided arguments against the schema.
pub fn normalize_args(meta: &OpMeta, provided: &[ArgValue]) -> Result<Vec<ArgValue>, RecipeError> {
    if provided.len() > meta.args.len() {
        return Err(RecipeError::TooManyArguments {
            op: meta.name.to_string(),
            expected: meta.args.len(),
            got: provided.len(),
        });
    }

    meta.args
        .iter()
        .enumerate()
        .map(|(i, spec)| match provided.get(i) {
            Some(value) => validate_arg(meta.name, spec, value),
            None => Ok(spec.default.to_arg()),
        })
        .collect()
}

/// Validate a single argument value against its declared kind.
fn validate_arg(op: &str, spec: &ArgSpec, value: &ArgValue) -> Result<ArgValue, RecipeError> {
    let invalid = |reason: String| RecipeError::InvalidArgument {
        op: op.to_string(),
        arg: spec.name.to_string(),
        reason,
    };

    match spec.kind {
        ArgKind::String => match value {
            ArgValue::Toggle { .. } => Err(invalid("must be a string".into())),
            ArgValue::Str(s) => Ok(ArgValue::Str(s.clone())),
            other => Ok(ArgValue::Str(other.as_str())),
        },
        ArgKind::Number => match value {
            ArgValue::Num(n) => Ok(ArgValue::Num(*n)),
            ArgValue::Str(s) => s
                .trim()
                .parse()
                .map(ArgValue::Num)
                .map_err(|_| invalid("must be a number".into())),
            _ => Err(invalid("must be a number".into())),
        },
        ArgKind::Boolean => match value {
            ArgValue::Bool(b) => Ok(ArgValue::Bool(*b)),
            ArgValue::Str(s) if s == "true" || s == "false" => Ok(ArgValue::Bool(s == "true")),
            _ => Err(invalid("must be a boolean".into())),
        },
        ArgKind::Option(choices) => {
            let s = match value {
                ArgValue::Toggle { .. } => return Err(invalid("must be a string".into())),
                other => other.as_str(),
            };
            if !choices.contains(&s.as_str()) {
                return Err(invalid(format!("must be one of: {}", choices.join(", "))));
            }
            Ok(ArgValue::Str(s))
        }
        ArgKind::Toggle(options) => match value {
            ArgValue::Toggle { option, .. } => {
                if !options.contains(&option.as_str()) {
                    return Err(invalid(format!(
                        "option must be one of: {}",
                        options.join(", ")
                    )));
                }
                Ok(value.clone())
            }
            ArgValue::Str(s) => Ok(ArgValue::Toggle {
                string: s.clone(),
                option: options.first().copied().unwrap_or_default().to_string(),
            }),
            ArgValue::Num(_) | ArgValue::Bool(_) => Ok(ArgValue::Toggle {
                string: value.as_str(),
                option: options.first().copied().unwrap_or_default().to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit;

    const RECIPE_YAML: &str = r#"
name: decode-and-shout
description: Base64 decode then uppercase
recipe:
  - op: From Base64
  - op: To Upper case
  - op: XOR
    args: [{ string: "2a", option: Hex }]
    disabled: true
"#;

    #[test]
    fn test_gy002_parse_recipe() {
        let recipe = parse_recipe(RECIPE_YAML).unwrap();
        assert_eq!(recipe.name.as_deref(), Some("decode-and-shout"));
        assert_eq!(recipe.recipe.len(), 3);
        assert!(recipe.recipe[2].disabled);
    }

    #[test]
    fn test_gy002_parse_bare_list() {
        let recipe = parse_recipe("- op: Reverse\n- op: ROT13\n").unwrap();
        assert!(recipe.name.is_none());
        assert_eq!(recipe.recipe[1].op, "ROT13");
    }

    #[test]
    fn test_gy002_parse_json() {
        let recipe =
            parse_recipe_json(r#"[{"op": "To Hex", "args": ["Colon"]}, {"op": "Reverse"}]"#)
                .unwrap();
        assert_eq!(recipe.recipe[0].args, vec![ArgValue::from("Colon")]);
    }

    #[test]
    fn test_gy002_parse_error() {
        assert!(matches!(
            parse_recipe("recipe: 12"),
            Err(RecipeError::Parse(_))
        ));
    }

    #[test]
    fn test_gy002_load_recipe_file() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("r.yaml");
        std::fs::write(&yaml, RECIPE_YAML).unwrap();
        assert_eq!(load_recipe(&yaml).unwrap().recipe.len(), 3);

        let json = dir.path().join("r.JSON");
        std::fs::write(&json, r#"{"recipe": [{"op": "Reverse"}]}"#).unwrap();
        assert_eq!(load_recipe(&json).unwrap().recipe[0].op, "Reverse");

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            load_recipe(&missing),
            Err(RecipeError::Read { .. })
        ));
    }

    #[test]
    fn test_gy002_hydrate_fills_defaults() {
        let recipe = parse_recipe(RECIPE_YAML).unwrap();
        let ops = hydrate(&recipe.recipe, &testkit::registry()).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].args.len(), ops[0].meta().args.len());
        assert_eq!(ops[0].args[0], ArgValue::from("A-Za-z0-9+/="));
        assert!(ops[2].disabled);
    }

    #[test]
    fn test_gy002_hydrate_unknown_operation() {
        let err = hydrate(
            &[OpConfig::new("Frobnicate", vec![])],
            &testkit::registry(),
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::UnknownOperation(ref n) if n == "Frobnicate"));
    }

    #[test]
    fn test_gy002_validate_number() {
        let registry = testkit::registry();
        let ok = hydrate(
            &[OpConfig::new("Jump", vec!["L".into(), "4".into()])],
            &registry,
        )
        .unwrap();
        assert_eq!(ok[0].args[1], ArgValue::Num(4.0));

        let err = hydrate(
            &[OpConfig::new("Jump", vec!["L".into(), "many".into()])],
            &registry,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a number"));
    }

    #[test]
    fn test_gy002_validate_option() {
        let err = hydrate(
            &[OpConfig::new("To Hex", vec!["Semicolon-ish".into()])],
            &testkit::registry(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn test_gy002_validate_bool() {
        let err = hydrate(
            &[OpConfig::new("From Base64", vec!["A-Za-z0-9+/=".into(), 3.0.into()])],
            &testkit::registry(),
        )
        .unwrap_err();
        assert!(matches!(err, RecipeError::InvalidArgument { ref arg, .. } if arg == "Remove non-alphabet chars"));
    }

    #[test]
    fn test_gy002_toggle_from_plain_string() {
        let ops = hydrate(&[OpConfig::new("XOR", vec!["key".into()])], &testkit::registry()).unwrap();
        assert_eq!(
            ops[0].args[0],
            ArgValue::Toggle {
                string: "key".into(),
                option: "Hex".into()
            }
        );
    }

    #[test]
    fn test_gy002_too_many_arguments() {
        let err = hydrate(
            &[OpConfig::new("Reverse", vec!["Character".into(), "extra".into()])],
            &testkit::registry(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RecipeError::TooManyArguments {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }
}
