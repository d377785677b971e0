//! Schema generation for structured function-call output.
//!
//! Uses `schemars` to derive JSON schemas from Rust types, then normalizes
//! them for the inference service's strict mode, which requires:
//!
//! 1. `additionalProperties: false` on every object schema
//! 2. ALL properties listed in `required`, even nullable ones
//! 3. Fully inlined schemas (no `$ref` references)

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Types usable as function-call arguments.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait FunctionArgs: JsonSchema + DeserializeOwned {
    /// Generate a strict-mode schema for this type.
    fn function_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        strictify_objects(&mut value);
        inline_refs(&mut value);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    /// Schema name, used as the default function name.
    fn args_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> FunctionArgs for T {}

/// Add `additionalProperties: false` and a complete `required` list to every
/// object schema in the tree.
fn strictify_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                strictify_objects(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strictify_objects(item);
            }
        }
        _ => {}
    }
}

/// Replace every `$ref` with the referenced definition, inlined.
fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let name = reference.trim_start_matches("#/definitions/").to_string();
                if let Some(definition) = definitions.get(&name) {
                    let mut inlined = definition.clone();
                    inline_refs_recursive(&mut inlined, definitions);
                    *value = inlined;
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Span {
        #[allow(dead_code)]
        start: u32,
        #[allow(dead_code)]
        end: u32,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Report {
        #[allow(dead_code)]
        summary: String,
        #[allow(dead_code)]
        spans: Vec<Span>,
    }

    #[test]
    fn schema_disallows_additional_properties() {
        let schema = Report::function_schema();
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn schema_requires_all_properties() {
        let schema = Report::function_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"summary"));
        assert!(required.contains(&"spans"));
    }

    #[test]
    fn nested_refs_are_inlined() {
        let schema = Report::function_schema();
        let serialized = serde_json::to_string(&schema).unwrap();
        assert!(!serialized.contains("$ref"));
        // The nested Span object kept its properties after inlining
        assert!(schema["properties"]["spans"]["items"]["properties"]["start"].is_object());
    }
}
