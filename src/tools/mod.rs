//! Tool definitions, schema derivation and execution.
//!
//! A [`Tool`] is a named synchronous function that accepts a JSON object of
//! arguments. Tools are declared either with the `#[tool]` macro, which reads
//! the function signature at compile time, or at run time with [`FunctionTool`].
//!
//! ```no_run
//! use unillm::tool;
//! use unillm::tools::{Tool, ToolExecutor};
//! use unillm::types::ToolCall;
//!
//! #[tool]
//! /// Get weather information for a location
//! fn get_weather(location: String, units: Option<String>) -> Result<String, String> {
//!     let units = units.unwrap_or_else(|| "celsius".to_string());
//!     Ok(format!("Weather in {}: sunny, 22 degrees {}", location, units))
//! }
//!
//! let executor = ToolExecutor::new(vec![get_weather()]).unwrap();
//! let result = executor.execute(&ToolCall::new(
//!     "call_1",
//!     "get_weather",
//!     r#"{"location": "Tokyo"}"#,
//! ));
//! assert!(result.starts_with("Weather in Tokyo"));
//! ```
//!
//! # Key Types
//!
//! - [`Tool`] - Primary trait for implementing tools
//! - [`ParamSpec`] - One introspected parameter of a tool
//! - [`ToolExecutor`] - Dispatches canonical tool calls to registered tools
//! - [`ToolError`] - Failures raised while binding arguments or running a tool

pub mod builtin;
pub mod executor;
pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Result, UnillmError};
use crate::types::ToolSchema;

pub use executor::ToolExecutor;
pub use schema::extract_function_schema;

/// JSON schema type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON schema type name
    pub fn as_json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// One parameter of a tool's signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Declared type; `None` means unannotated
    pub param_type: Option<ParamType>,
    /// Parameters with a default are optional in the schema
    pub has_default: bool,
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: Option<ParamType>, has_default: bool) -> Self {
        Self {
            name: name.into(),
            param_type,
            has_default,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A callable tool
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    /// Human-readable description; `None` falls back to `"Function <name>"`
    fn description(&self) -> Option<&str> {
        None
    }

    /// The tool's parameters in declaration order
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Invoke the tool with decoded keyword arguments
    fn call(&self, arguments: Map<String, Value>) -> std::result::Result<Value, ToolError>;

    /// Schema advertised to providers
    fn schema(&self) -> ToolSchema {
        extract_function_schema(self.name(), self.description(), &self.parameters())
    }
}

/// Tool-layer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Missing tool name in tool call")]
    MissingName,

    #[error("Missing tool call ID")]
    MissingId,

    #[error("Tool '{name}' not found. Available tools: {available}")]
    ToolNotFound { name: String, available: String },

    #[error("Duplicate tool name: {name}")]
    DuplicateTool { name: String },

    /// Arguments were not a JSON object
    #[error("Invalid JSON arguments: {message}")]
    InvalidJsonArguments { message: String },

    /// Arguments did not bind to the tool's parameters
    #[error("Invalid function arguments: {message}")]
    InvalidArguments { message: String },

    /// The tool ran and reported a failure
    #[error("Function execution failed: {message}")]
    ExecutionFailed { message: String },

    /// The tool panicked
    #[error("Unexpected error executing tool '{name}': {message}")]
    Panicked { name: String, message: String },
}

impl ToolError {
    /// Name of the tool involved, when the error carries it
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolError::ToolNotFound { name, .. }
            | ToolError::DuplicateTool { name }
            | ToolError::Panicked { name, .. } => Some(name),
            _ => None,
        }
    }
}

type ToolFn = dyn Fn(Map<String, Value>) -> std::result::Result<Value, ToolError> + Send + Sync;

/// A tool built at run time from a closure and declared parameters
///
/// ```
/// use serde_json::json;
/// use unillm::tools::{FunctionTool, ParamType, Tool};
///
/// let echo = FunctionTool::new("echo", |args| Ok(args.get("text").cloned().unwrap_or(json!(""))))
///     .with_description("Echo text back")
///     .param("text", ParamType::String)
///     .optional_param("times", ParamType::Integer);
///
/// let schema = echo.schema();
/// assert_eq!(schema.parameters["required"], json!(["text"]));
/// ```
pub struct FunctionTool {
    name: String,
    description: Option<String>,
    params: Vec<ParamSpec>,
    func: Arc<ToolFn>,
}

impl FunctionTool {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Map<String, Value>) -> std::result::Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required parameter
    pub fn param(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec::new(name, Some(param_type), false));
        self
    }

    /// Declare a parameter that has a default
    pub fn optional_param(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec::new(name, Some(param_type), true));
        self
    }

    /// Declare a fully described parameter
    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        self.params.clone()
    }

    fn call(&self, arguments: Map<String, Value>) -> std::result::Result<Value, ToolError> {
        (self.func)(arguments)
    }
}

/// Derive schemas for a tool set, rejecting unusable tools
///
/// Every tool needs a non-empty, unique name.
pub fn tool_schemas(tools: &[Arc<dyn Tool>]) -> Result<Vec<ToolSchema>> {
    let mut seen = HashSet::new();
    let mut schemas = Vec::with_capacity(tools.len());

    for (index, tool) in tools.iter().enumerate() {
        let name = tool.name();
        if name.trim().is_empty() {
            return Err(UnillmError::validation_error(format!(
                "Tool at position {} has an empty name",
                index
            )));
        }
        if !seen.insert(name.to_string()) {
            return Err(UnillmError::validation_error(format!(
                "Duplicate tool name: {}",
                name
            )));
        }
        schemas.push(tool.schema());
    }

    Ok(schemas)
}
