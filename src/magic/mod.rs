//! GY-033: Magic, speculative decoding as a flow-control operation.
//!
//! The operation runs the search over the dish bytes, stores the ranked
//! results as JSON and presents them as an HTML table.

pub mod filetype;
pub mod heuristics;
pub mod search;

pub use search::{Magic, MagicOptions, MagicResult, MatchingOp};

use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation};
use crate::core::state::RecipeState;
use crate::core::types::{ArgValue, TypeTag};
use serde_json::Value;
use std::fmt::Write;
use tracing::debug;

pub const MAGIC_NAME: &str = "Magic";

const NOTHING_FOUND: &str = "Nothing of interest could be detected about the input data.";

static MAGIC: OpMeta = OpMeta {
    name: MAGIC_NAME,
    module: "Default",
    description: "Attempts to detect what the input data is and which operations could help make more sense of it.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::Json,
    presentation_type: Some(TypeTag::Html),
    args: &[
        ArgSpec {
            name: "Depth",
            kind: ArgKind::Number,
            default: Literal::Num(3.0),
        },
        ArgSpec {
            name: "Intensive mode",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Extensive language support",
            kind: ArgKind::Boolean,
            default: Literal::Bool(false),
        },
        ArgSpec {
            name: "Crib (known plaintext string or regex)",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
    ],
    flow_control: true,
};

pub struct MagicOperation;

impl MagicOperation {
    fn options(state: &RecipeState) -> MagicOptions {
        let crib = state.arg_str(3);
        MagicOptions {
            depth: state.arg(0).and_then(ArgValue::as_usize).unwrap_or(3),
            intensive: state.arg_bool(1),
            extensive_languages: state.arg_bool(2),
            crib: (!crib.is_empty()).then_some(crib),
            preview_length: state.ctx.limits.preview_length,
            brute_force_sample: state.ctx.limits.brute_force_sample,
        }
    }
}

impl Operation for MagicOperation {
    fn meta(&self) -> &'static OpMeta {
        &MAGIC
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let options = Self::options(state);
        let data = state.dish.get_bytes()?;
        let magic = Magic::new(state.ctx.registry.clone(), options)?;
        let results = magic.search(&data);
        debug!("Magic over {} bytes gave {} result(s)", data.len(), results.len());
        let value = serde_json::to_value(&results)
            .map_err(|e| OpError::Unexpected(format!("cannot serialise Magic results: {}", e)))?;
        state.dish.set(DishValue::Json(value), TypeTag::Json)?;
        Ok(())
    }

    fn has_presenter(&self) -> bool {
        true
    }

    fn present(&self, output: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let value = output.into_json()?;
        let results = value.as_array().map(Vec::as_slice).unwrap_or_default();
        Ok(DishValue::Html(render_table(results)))
    }
}

// ============================================================================
// Presentation
// ============================================================================

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// `Op(arg, arg)` per step, one per line.
fn recipe_cell(result: &Value) -> String {
    let Some(steps) = result["recipe"].as_array() else {
        return String::new();
    };
    steps
        .iter()
        .map(|step| {
            let args: Vec<String> = step["args"]
                .as_array()
                .map(|args| args.iter().map(Value::to_string).collect())
                .unwrap_or_default();
            format!(
                "{}({})",
                escape_html(step["op"].as_str().unwrap_or_default()),
                escape_html(&args.join(", "))
            )
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

fn properties_cell(result: &Value) -> String {
    let mut props = Vec::new();
    if let Some(ft) = result["file_type"].as_object() {
        props.push(format!(
            "Possible file type: {} ({})",
            escape_html(ft.get("name").and_then(Value::as_str).unwrap_or_default()),
            escape_html(ft.get("extension").and_then(Value::as_str).unwrap_or_default())
        ));
    }
    if let Some(entropy) = result["entropy"].as_f64() {
        props.push(format!("Entropy: {:.2}", entropy));
    }
    let languages: Vec<Value> = result["language_scores"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    if let Some(best) = languages
        .iter()
        .find(|s| s["probability"].as_f64().unwrap_or(0.0) > heuristics::MIN_LANGUAGE_PROBABILITY)
    {
        props.push(format!(
            "Possible language: {}",
            escape_html(best["lang"].as_str().unwrap_or_default())
        ));
    }
    if result["is_utf8"].as_bool() == Some(true) {
        props.push("Valid UTF8".to_string());
    }
    if let Some(ops) = result["matching_ops"].as_array().filter(|o| !o.is_empty()) {
        let names: Vec<String> = ops
            .iter()
            .filter_map(|o| o["op"].as_str())
            .map(escape_html)
            .collect();
        props.push(format!("Matching ops: {}", names.join(", ")));
    }
    props.join("<br>")
}

/// Render Magic results as an HTML table.
pub fn render_table(results: &[Value]) -> String {
    if results.is_empty() {
        return NOTHING_FOUND.to_string();
    }
    let mut html = String::from(
        "<table class='table table-hover table-sm table-bordered table-nonfluid'>\
         <tr><th>Recipe (click to load)</th><th>Result snippet</th><th>Properties</th></tr>",
    );
    for result in results {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            recipe_cell(result),
            escape_html(result["data"].as_str().unwrap_or_default()),
            properties_cell(result)
        );
    }
    html.push_str("</table>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor;
    use crate::core::testkit::{self, op};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    const PLAIN: &str = "this is the flag: galley{speculative} and some more english words";

    #[test]
    fn test_gy033_magic_writes_json_results() {
        let (mut state, result) = testkit::run(&STANDARD.encode(PLAIN), &[op("Magic", vec![])]);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(state.last_run, Some(0));
        let value = state.dish.get(TypeTag::Json).unwrap().into_json().unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["recipe"][0]["op"], "From Base64");
        assert!(first["data"].as_str().unwrap().starts_with("this is the flag"));
    }

    #[test]
    fn test_gy033_magic_is_presented_as_html() {
        let (mut state, result) = testkit::run(&STANDARD.encode(PLAIN), &[op("Magic", vec![])]);
        result.unwrap();
        executor::present(&mut state).unwrap();
        assert_eq!(state.dish.type_tag(), TypeTag::Html);
        let html = state.dish.get_string().unwrap();
        assert!(html.starts_with("<table"));
        assert!(html.contains("From Base64("));
        assert!(html.contains("Valid UTF8"));
    }

    #[test]
    fn test_gy033_crib_without_match_reports_nothing() {
        let (mut state, result) = testkit::run(
            "plain words",
            &[op(
                "Magic",
                vec![3.0.into(), false.into(), false.into(), "zzzz".into()],
            )],
        );
        result.unwrap();
        executor::present(&mut state).unwrap();
        assert_eq!(state.dish.get_string().unwrap(), NOTHING_FOUND);
    }

    #[test]
    fn test_gy033_invalid_crib_is_recovered() {
        let (mut state, result) = testkit::run(
            "abc",
            &[op("Magic", vec![3.0.into(), false.into(), false.into(), "(".into()])],
        );
        assert_eq!(result.unwrap(), 0);
        assert!(state.last_run.is_none());
        assert!(state
            .dish
            .get_string()
            .unwrap()
            .starts_with("Invalid regular expression"));
    }

    #[test]
    fn test_gy033_escapes_result_snippets() {
        let results = vec![serde_json::json!({
            "recipe": [{"op": "From Hex", "args": ["Auto"]}],
            "data": "<script>",
            "language_scores": [],
            "file_type": null,
            "is_utf8": true,
            "entropy": 2.5,
            "matching_ops": [],
        })];
        let html = render_table(&results);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("From Hex(&quot;Auto&quot;)"));
        assert!(html.contains("Entropy: 2.50"));
    }
}
