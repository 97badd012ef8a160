//! GY-046: JSON formatting.

use super::arg_str;
use crate::core::dish::DishValue;
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder.register(JsonBeautify).register(JsonMinify);
}

static JSON_BEAUTIFY: OpMeta = OpMeta {
    name: "JSON Beautify",
    module: "Code",
    description: "Indents and pretty prints JavaScript Object Notation (JSON) code.",
    input_type: TypeTag::Json,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Indent string",
        kind: ArgKind::String,
        default: Literal::Str("    "),
    }],
    flow_control: false,
};

/// Pretty-print `value` using `indent` for each nesting level.
pub fn beautify(value: &serde_json::Value, indent: &str) -> Result<String, OpError> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| OpError::operation(format!("JSON Beautify failed: {}", e)))?;
    String::from_utf8(out).map_err(|e| OpError::Unexpected(e.to_string()))
}

pub struct JsonBeautify;

impl Operation for JsonBeautify {
    fn meta(&self) -> &'static OpMeta {
        &JSON_BEAUTIFY
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let value = input.into_json()?;
        Ok(DishValue::String(beautify(&value, &super::unescape(&arg_str(args, 0)))?))
    }
}

static JSON_MINIFY: OpMeta = OpMeta {
    name: "JSON Minify",
    module: "Code",
    description: "Compresses JavaScript Object Notation (JSON) code.",
    input_type: TypeTag::Json,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: false,
};

pub struct JsonMinify;

impl Operation for JsonMinify {
    fn meta(&self) -> &'static OpMeta {
        &JSON_MINIFY
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let value = input.into_json()?;
        serde_json::to_string(&value)
            .map(DishValue::String)
            .map_err(|e| OpError::operation(format!("JSON Minify failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::testkit::{self, op};

    #[test]
    fn test_gy046_beautify_default_indent() {
        let out = testkit::run_to_string(r#"{"a":[1,2]}"#, &[op("JSON Beautify", vec![])]);
        assert_eq!(out, "{\n    \"a\": [\n        1,\n        2\n    ]\n}");
    }

    #[test]
    fn test_gy046_beautify_tab_indent() {
        let out = testkit::run_to_string(r#"{"a":1}"#, &[op("JSON Beautify", vec!["\\t".into()])]);
        assert_eq!(out, "{\n\t\"a\": 1\n}");
    }

    #[test]
    fn test_gy046_minify() {
        let out = testkit::run_to_string("{ \"a\" : [ 1 , 2 ] }", &[op("JSON Minify", vec![])]);
        assert_eq!(out, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_gy046_invalid_json_is_recovered() {
        let (mut state, result) = testkit::run("{nope", &[op("JSON Beautify", vec![])]);
        assert_eq!(result.unwrap(), 0);
        assert!(state.dish.get_string().unwrap().contains("JSON"));
    }
}
