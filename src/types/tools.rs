//! Tool-related type definitions.

use serde::{Deserialize, Serialize};

/// A tool call in canonical `{id, name, arguments}` form
///
/// `arguments` is a JSON-encoded object, whatever provider produced the call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier, unique within one response
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments object
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// A call is complete once id, name and arguments are all non-empty
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.arguments.is_empty()
    }

    /// Decode the arguments; an empty string decodes to an empty object
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            Ok(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str(&self.arguments)
        }
    }
}

/// Description of a tool as advertised to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON-Schema-like `{type: "object", properties, required}` object
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_completeness() {
        assert!(ToolCall::new("call_1", "calculate", "{}").is_complete());
        assert!(!ToolCall::new("call_1", "calculate", "").is_complete());
        assert!(!ToolCall::new("", "calculate", "{}").is_complete());
    }

    #[test]
    fn test_parsed_arguments_empty_is_object() {
        let call = ToolCall::new("call_1", "now", "");
        assert_eq!(call.parsed_arguments().unwrap(), serde_json::json!({}));
        let bad = ToolCall::new("call_2", "now", "{oops");
        assert!(bad.parsed_arguments().is_err());
    }
}
