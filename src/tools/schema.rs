//! Parameter schema derivation from tool signatures.

use serde_json::{json, Map, Value};

use super::{ParamSpec, ParamType};
use crate::types::ToolSchema;

/// Build the `ToolSchema` for a callable's signature
///
/// Each parameter becomes a property with its JSON type (unannotated
/// parameters are `string`) and a description (`"Parameter <name>"` unless one
/// was supplied). Parameters without a default are required. The tool
/// description falls back to `"Function <name>"`.
pub fn extract_function_schema(
    name: &str,
    description: Option<&str>,
    params: &[ParamSpec],
) -> ToolSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        let param_type = param.param_type.unwrap_or(ParamType::String);
        let param_description = param
            .description
            .clone()
            .unwrap_or_else(|| format!("Parameter {}", param.name));

        properties.insert(
            param.name.clone(),
            json!({
                "type": param_type.as_json_type(),
                "description": param_description,
            }),
        );

        if !param.has_default {
            required.push(Value::String(param.name.clone()));
        }
    }

    let description = match description.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("Function {}", name),
    };

    ToolSchema {
        name: name.to_string(),
        description,
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_signature() {
        let params = vec![
            ParamSpec::new("location", Some(ParamType::String), false)
                .with_description("City to look up"),
            ParamSpec::new("days", Some(ParamType::Integer), true),
            ParamSpec::new("raw", None, false),
        ];

        let schema = extract_function_schema("get_forecast", Some("Weather forecast"), &params);

        assert_eq!(schema.description, "Weather forecast");
        assert_eq!(
            schema.parameters,
            json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string", "description": "City to look up"},
                    "days": {"type": "integer", "description": "Parameter days"},
                    "raw": {"type": "string", "description": "Parameter raw"}
                },
                "required": ["location", "raw"]
            })
        );
    }

    #[test]
    fn test_type_mapping() {
        let all = [
            (ParamType::String, "string"),
            (ParamType::Integer, "integer"),
            (ParamType::Number, "number"),
            (ParamType::Boolean, "boolean"),
            (ParamType::Array, "array"),
            (ParamType::Object, "object"),
        ];
        for (param_type, expected) in all {
            let schema = extract_function_schema(
                "f",
                None,
                &[ParamSpec::new("x", Some(param_type), false)],
            );
            assert_eq!(schema.parameters["properties"]["x"]["type"], expected);
        }
    }

    #[test]
    fn test_default_description_and_empty_signature() {
        let schema = extract_function_schema("ping", None, &[]);
        assert_eq!(schema.description, "Function ping");
        assert_eq!(schema.parameters["properties"], json!({}));
        assert_eq!(schema.parameters["required"], json!([]));

        let blank = extract_function_schema("ping", Some("   "), &[]);
        assert_eq!(blank.description, "Function ping");
    }
}
