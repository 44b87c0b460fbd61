//! Schema for the extraction reply, shaped for strict structured output.
//!
//! A strict provider only accepts closed objects whose properties are all
//! listed in `required` (optional ones stay nullable), and it does not follow
//! `$ref`. [`strict_schema`] rewrites the schemars output in one walk.

use schemars::{JsonSchema, schema_for};
use serde_json::{Map, Value};

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Self-contained strict-mode schema for `T`.
pub fn strict_schema<T: JsonSchema>() -> Value {
    let Ok(Value::Object(mut root)) = serde_json::to_value(schema_for!(T)) else {
        return Value::Object(Map::new());
    };

    root.remove("$schema");
    let definitions = match root.remove("definitions") {
        Some(Value::Object(defs)) => defs,
        _ => Map::new(),
    };

    let mut schema = Value::Object(root);
    tighten(&mut schema, &definitions);
    schema
}

/// Resolve references and close objects, depth first.
fn tighten(node: &mut Value, definitions: &Map<String, Value>) {
    match node {
        Value::Object(fields) => {
            let target = fields
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
                .and_then(|name| definitions.get(name));
            if let Some(target) = target {
                *node = target.clone();
                return tighten(node, definitions);
            }

            if fields.get("type").and_then(Value::as_str) == Some("object") {
                close_object(fields);
            }
            fields.values_mut().for_each(|child| tighten(child, definitions));
        }
        Value::Array(children) => children.iter_mut().for_each(|child| tighten(child, definitions)),
        _ => {}
    }
}

fn close_object(fields: &mut Map<String, Value>) {
    fields.insert("additionalProperties".into(), Value::Bool(false));
    let required: Option<Vec<Value>> = fields
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().map(|k| Value::String(k.clone())).collect());
    if let Some(required) = required {
        fields.insert("required".into(), Value::Array(required));
    }
}
