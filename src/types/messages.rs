//! Message types and message validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{required_field_for, ContentBlock};
use super::tools::ToolCall;
use crate::error::{Result, UnillmError};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions, context)
    System,
    /// Message from the user/human
    User,
    /// Message from the AI assistant
    Assistant,
    /// Result of a tool call
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

const VALID_ROLES: &str = "system, user, assistant, tool";

/// Message content: plain text or an ordered list of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Concatenated text of the content (text blocks only)
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        MessageContent::Blocks(blocks)
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text or content blocks
    pub content: MessageContent,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Reasoning text of a previous assistant turn, replayed to Bedrock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Signature that accompanies replayed reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_signature: Option<String>,
}

impl Message {
    /// Create a new message with the specified role and content
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            reasoning: None,
            reasoning_signature: None,
        }
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::System, text.into())
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::User, text.into())
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::new(MessageRole::Assistant, text.into())
    }

    /// Create a tool result message answering `tool_call_id`
    pub fn tool_result<S: Into<String>, I: Into<String>>(tool_call_id: I, content: S) -> Self {
        let mut message = Self::new(MessageRole::Tool, content.into());
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Create a message made of content blocks
    pub fn with_blocks(role: MessageRole, blocks: Vec<ContentBlock>) -> Self {
        Self::new(role, blocks)
    }

    /// Attach tool calls (assistant turns)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Attach reasoning from a previous assistant turn
    pub fn with_reasoning(mut self, reasoning: impl Into<String>, signature: Option<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self.reasoning_signature = signature;
        self
    }

    /// Text of this message (text blocks only)
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Validate typed messages before building a provider request
pub fn validate_messages(messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Err(UnillmError::validation_error("Messages list cannot be empty"));
    }

    for (i, message) in messages.iter().enumerate() {
        if let MessageContent::Blocks(blocks) = &message.content {
            for (j, block) in blocks.iter().enumerate() {
                if block.payload().is_empty() {
                    return Err(UnillmError::validation_error(format!(
                        "Message {}, content block {} of type '{}' missing '{}' field",
                        i,
                        j,
                        block.type_name(),
                        block.payload_field()
                    )));
                }
            }
        }

        if message.role == MessageRole::Tool
            && message.tool_call_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(UnillmError::validation_error(format!(
                "Tool message {} missing 'tool_call_id' field",
                i
            )));
        }
    }

    Ok(())
}

/// Validate raw JSON messages structurally
///
/// Reports the first problem with its message (and block) index, so callers
/// accepting untyped input get actionable errors before deserializing.
pub fn validate_message_values(messages: &Value) -> Result<()> {
    let Some(list) = messages.as_array() else {
        return Err(UnillmError::validation_error("Messages must be a list"));
    };
    if list.is_empty() {
        return Err(UnillmError::validation_error("Messages list cannot be empty"));
    }

    for (i, message) in list.iter().enumerate() {
        let Some(object) = message.as_object() else {
            return Err(UnillmError::validation_error(format!(
                "Message {} must be an object",
                i
            )));
        };

        let Some(role) = object.get("role") else {
            return Err(UnillmError::validation_error(format!(
                "Message {} missing 'role' field",
                i
            )));
        };
        let Some(content) = object.get("content") else {
            return Err(UnillmError::validation_error(format!(
                "Message {} missing 'content' field",
                i
            )));
        };

        let role = role.as_str().unwrap_or_default();
        if !matches!(role, "system" | "user" | "assistant" | "tool") {
            return Err(UnillmError::validation_error(format!(
                "Message {} has invalid role '{}'. Must be one of: {}",
                i, role, VALID_ROLES
            )));
        }

        match content {
            Value::String(_) => {}
            Value::Array(blocks) => {
                for (j, block) in blocks.iter().enumerate() {
                    validate_block_value(i, j, block)?;
                }
            }
            _ => {
                return Err(UnillmError::validation_error(format!(
                    "Message {} content must be string or list of content blocks",
                    i
                )));
            }
        }

        if role == "tool" && !object.contains_key("tool_call_id") {
            return Err(UnillmError::validation_error(format!(
                "Tool message {} missing 'tool_call_id' field",
                i
            )));
        }
    }

    Ok(())
}

fn validate_block_value(i: usize, j: usize, block: &Value) -> Result<()> {
    let Some(block) = block.as_object() else {
        return Err(UnillmError::validation_error(format!(
            "Message {}, content block {} must be an object",
            i, j
        )));
    };
    let Some(block_type) = block.get("type") else {
        return Err(UnillmError::validation_error(format!(
            "Message {}, content block {} missing 'type' field",
            i, j
        )));
    };

    let block_type = block_type.as_str().unwrap_or_default();
    match required_field_for(block_type) {
        Some(field) if block.contains_key(field) => Ok(()),
        Some(field) => Err(UnillmError::validation_error(format!(
            "Message {}, content block {} of type '{}' missing '{}' field",
            i, j, block_type, field
        ))),
        None => Err(UnillmError::validation_error(format!(
            "Message {}, content block {} has unsupported type '{}'",
            i, j, block_type
        ))),
    }
}

/// Validate raw JSON messages and decode them
pub fn parse_messages(messages: &Value) -> Result<Vec<Message>> {
    validate_message_values(messages)?;
    let parsed: Vec<Message> = serde_json::from_value(messages.clone())
        .map_err(|e| UnillmError::validation_error(format!("Invalid message: {}", e)))?;
    validate_messages(&parsed)?;
    Ok(parsed)
}
