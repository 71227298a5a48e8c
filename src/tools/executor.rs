//! Synchronous dispatch of canonical tool calls
//!
//! [`ToolExecutor`] holds a fixed registry of tools built at construction
//! time. Execution never fails from the caller's point of view: every
//! problem (unknown tool, malformed arguments, a tool reporting failure or
//! panicking) comes back as a descriptive result string so one bad call can't
//! abort a batch.
//!
//! ```rust
//! use unillm::tools::{builtin, ToolExecutor};
//! use unillm::types::ToolCall;
//!
//! let executor = ToolExecutor::new(vec![builtin::calculate()]).unwrap();
//!
//! let calls = vec![
//!     ToolCall::new("call_1", "calculate", r#"{"expression": "15 * 8 - 10"}"#),
//!     ToolCall::new("call_2", "weather", r#"{"location": "Oslo"}"#),
//! ];
//!
//! let messages = executor.execute_all(&calls);
//! assert_eq!(messages[0].text(), "110.0");
//! assert!(messages[1].text().starts_with("Error: Tool 'weather' not found"));
//! ```
//!
//! Use [`ToolExecutor::try_execute`] when a typed [`ToolError`] is more useful
//! than the formatted string.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Result, UnillmError};
use crate::tools::{Tool, ToolError};
use crate::types::{Message, ToolCall};

/// Timing of a single tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionMetrics {
    pub tool_name: String,
    pub duration: Duration,
    pub success: bool,
}

/// Fixed registry of tools keyed by name
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, used for "available tools" listings
    order: Vec<String>,
}

impl ToolExecutor {
    /// Build the registry; tool names must be non-empty and unique
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = HashMap::with_capacity(tools.len());
        let mut order = Vec::with_capacity(tools.len());

        for tool in tools {
            let name = tool.name().to_string();
            if name.trim().is_empty() {
                return Err(UnillmError::validation_error(
                    "Tool must have a non-empty name",
                ));
            }
            if registry.contains_key(&name) {
                return Err(ToolError::DuplicateTool { name }.into());
            }
            order.push(name.clone());
            registry.insert(name, tool);
        }

        debug!("Tool executor registered {} tools: {:?}", order.len(), order);

        Ok(Self {
            tools: registry,
            order,
        })
    }

    /// Names of registered tools in registration order
    pub fn available_tools(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    fn available_list(&self) -> String {
        self.order.join(", ")
    }

    /// Execute a call, returning the tool's result rendered as a string
    pub fn try_execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        if call.name.is_empty() {
            return Err(ToolError::MissingName);
        }
        if call.id.is_empty() {
            return Err(ToolError::MissingId);
        }

        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::ToolNotFound {
                name: call.name.clone(),
                available: self.available_list(),
            })?;

        let arguments = decode_arguments(&call.arguments)?;

        debug!("Executing tool '{}' (call {})", call.name, call.id);

        let outcome = catch_unwind(AssertUnwindSafe(|| tool.call(arguments))).map_err(|panic| {
            ToolError::Panicked {
                name: call.name.clone(),
                message: panic_message(panic.as_ref()),
            }
        })?;

        outcome.map(render_result)
    }

    /// Execute a call, folding every failure into a descriptive string
    pub fn execute(&self, call: &ToolCall) -> String {
        match self.try_execute(call) {
            Ok(result) => result,
            Err(error) => {
                debug!("Tool call '{}' failed: {}", call.name, error);
                format_error(&error)
            }
        }
    }

    /// Execute a call and report how long it took
    pub fn execute_with_metrics(&self, call: &ToolCall) -> (String, ExecutionMetrics) {
        let start = Instant::now();
        let outcome = self.try_execute(call);
        let metrics = ExecutionMetrics {
            tool_name: call.name.clone(),
            duration: start.elapsed(),
            success: outcome.is_ok(),
        };

        let content = match outcome {
            Ok(result) => result,
            Err(error) => format_error(&error),
        };
        (content, metrics)
    }

    /// Execute every call in order, wrapping each result as a tool message
    pub fn execute_all(&self, calls: &[ToolCall]) -> Vec<Message> {
        calls
            .iter()
            .map(|call| {
                let content = self.execute(call);
                let id = if call.id.is_empty() {
                    "unknown".to_string()
                } else {
                    call.id.clone()
                };
                Message::tool_result(id, content)
            })
            .collect()
    }

    /// Structural checks without executing; an empty list means valid
    pub fn validate_tool_call(&self, call: &ToolCall) -> Vec<String> {
        let mut problems = Vec::new();

        if call.name.is_empty() {
            problems.push("Missing tool name".to_string());
        }
        if call.id.is_empty() {
            problems.push("Missing tool call ID".to_string());
        }
        if !call.name.is_empty() && !self.has_tool(&call.name) {
            problems.push(format!(
                "Tool '{}' not found. Available: {}",
                call.name,
                self.available_list()
            ));
        }
        if let Err(error) = decode_arguments(&call.arguments) {
            problems.push(error.to_string());
        }

        problems
    }
}

/// Decode a JSON-encoded arguments object; empty or `null` means no arguments
fn decode_arguments(raw: &str) -> std::result::Result<Map<String, Value>, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(ToolError::InvalidJsonArguments {
            message: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
        Err(e) => Err(ToolError::InvalidJsonArguments {
            message: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn render_result(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn format_error(error: &ToolError) -> String {
    match error {
        ToolError::MissingName
        | ToolError::MissingId
        | ToolError::ToolNotFound { .. }
        | ToolError::DuplicateTool { .. } => format!("Error: {}", error),
        ToolError::InvalidJsonArguments { .. }
        | ToolError::InvalidArguments { .. }
        | ToolError::ExecutionFailed { .. } => format!("Tool execution error: {}", error),
        ToolError::Panicked { .. } => error.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}
