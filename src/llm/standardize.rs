//! Tool call standardization
//!
//! Maps each provider's native tool-call shape onto the canonical
//! [`ToolCall`] `{id, name, arguments}` form:
//!
//! - OpenAI: `{id, type: "function", function: {name, arguments}}`
//! - Bedrock: `{toolUse: {toolUseId, name, input}}`
//! - canonical: `{id, name, arguments}` passes through unchanged

use serde_json::Value;
use tracing::trace;

use crate::types::ToolCall;

/// Standardize a provider's tool-call array
///
/// Absent input or a non-array yields an empty list. Entries that are not
/// objects, or that match no known shape, are skipped.
pub fn standardize_tool_calls(raw: Option<&Value>) -> Vec<ToolCall> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let call = standardize_tool_call(entry, index);
            if call.is_none() {
                trace!("Skipping unrecognized tool call entry at index {}", index);
            }
            call
        })
        .collect()
}

/// Standardize one entry; `index` feeds the Bedrock placeholder id
pub fn standardize_tool_call(entry: &Value, index: usize) -> Option<ToolCall> {
    let object = entry.as_object()?;

    if let Some(function) = object.get("function") {
        return Some(ToolCall {
            id: string_field(object.get("id")),
            name: string_field(function.get("name")),
            arguments: encode_arguments(function.get("arguments")),
        });
    }

    if let Some(tool_use) = object.get("toolUse") {
        let id = match tool_use.get("toolUseId").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("call_{}", index),
        };
        return Some(ToolCall {
            id,
            name: string_field(tool_use.get("name")),
            arguments: encode_arguments(tool_use.get("input")),
        });
    }

    if object.contains_key("name") {
        return Some(ToolCall {
            id: string_field(object.get("id")),
            name: string_field(object.get("name")),
            arguments: encode_arguments(object.get("arguments")),
        });
    }

    None
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Strings pass through; structured values are JSON-encoded
fn encode_arguments(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
