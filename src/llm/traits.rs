//! Core traits for the LLM abstraction layer.
//!
//! [`LlmProvider`] splits a provider into the steps every backend shares:
//! prepare a request, execute it, and parse the response or each stream
//! event. The provided [`LlmProvider::chat`] and [`LlmProvider::chat_stream`]
//! methods compose those steps, so a provider only owns its wire format.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::reasoning::ReasoningExtraction;
use super::streaming::{StreamDelta, StreamNormalizer};
use crate::error::Result;
use crate::types::{validate_messages, Message, ToolCall, ToolSchema};

/// LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    /// Any endpoint speaking the OpenAI chat-completions protocol
    #[serde(rename = "openai_like")]
    OpenAICompatible,
    /// AWS Bedrock Converse API
    #[serde(rename = "bedrock")]
    Bedrock,
}

impl ProviderType {
    /// Get string representation of provider type
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAICompatible => "openai_like",
            ProviderType::Bedrock => "bedrock",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Request and extract reasoning content
    pub enable_reasoning: bool,
}

impl ChatOptions {
    pub fn with_reasoning() -> Self {
        Self {
            enable_reasoning: true,
        }
    }
}

/// Response from a non-streaming chat call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Final answer text
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    /// Canonical tool calls; returned as data, never executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Provider-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// The assistant message to append to the conversation
    pub fn to_message(&self) -> Message {
        let mut message = Message::assistant(self.content.clone());
        if let Some(calls) = &self.tool_calls {
            message = message.with_tool_calls(calls.clone());
        }
        message
    }
}

/// One normalized streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    pub content_delta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_delta: Option<String>,
    /// A reasoning span closed in this chunk
    pub is_reasoning_complete: bool,
    /// Last chunk of the stream
    pub is_complete: bool,
    /// Partial calls on intermediate chunks, completed calls on the last one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Health status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub provider: ProviderType,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Core LLM provider trait
///
/// Providers own request formatting, transport and response parsing. Stream
/// state lives in a per-call [`StreamNormalizer`], never on the provider.
#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    fn provider_type(&self) -> ProviderType;

    /// Schemas derived from the tools supplied at construction
    fn tool_schemas(&self) -> &[ToolSchema];

    /// Convert unified messages into the provider's request body
    fn prepare_request(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Value>;

    /// Execute a non-streaming request
    async fn execute(&self, request: Value) -> Result<Value>;

    /// Execute a streaming request, yielding one decoded event per item
    async fn execute_stream(&self, request: Value) -> Result<BoxStream<'static, Result<Value>>>;

    /// Convert a full provider response into a [`ChatResponse`]
    fn parse_response(&self, response: &Value, options: &ChatOptions) -> Result<ChatResponse>;

    /// Decode one raw stream event; unknown or malformed events yield an empty delta
    fn parse_stream_event(&self, event: &Value) -> StreamDelta;

    /// Separate reasoning from final content in a full response
    fn extract_reasoning(&self, response: &Value) -> ReasoningExtraction;

    /// Normalizer configured for one stream call
    fn stream_normalizer(&self, options: &ChatOptions) -> StreamNormalizer;

    async fn health_check(&self) -> Result<HealthStatus>;

    /// Validate, prepare, execute and parse a chat call
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        validate_messages(messages)?;
        let request = self.prepare_request(messages, options, false)?;
        debug!(provider = %self.provider_type(), "Executing chat request");
        let response = self.execute(request).await?;
        self.parse_response(&response, options)
    }

    /// Streaming chat call
    ///
    /// The stream ends after the chunk with `is_complete`, or after an `Err`
    /// item when the transport fails mid-stream.
    async fn chat_stream<'a>(
        &'a self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'a, Result<ChatStreamChunk>>> {
        validate_messages(messages)?;
        let request = self.prepare_request(messages, options, true)?;
        debug!(provider = %self.provider_type(), "Executing streaming chat request");
        let mut events = self.execute_stream(request).await?;
        let mut normalizer = self.stream_normalizer(options);
        let provider = self;

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        let delta = provider.parse_stream_event(&event);
                        if let Some(chunk) = normalizer.push(delta) {
                            yield Ok(chunk);
                        }
                        if normalizer.is_done() {
                            break;
                        }
                    }
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                }
            }
            if let Some(chunk) = normalizer.finish() {
                yield Ok(chunk);
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnillmError;
    use crate::llm::reasoning::extract_reasoning;
    use futures::stream;
    use serde_json::json;

    /// Provider that replays canned events
    #[derive(Debug)]
    struct ScriptedProvider {
        events: Vec<Result<Value>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::OpenAICompatible
        }

        fn tool_schemas(&self) -> &[ToolSchema] {
            &[]
        }

        fn prepare_request(&self, messages: &[Message], _: &ChatOptions, stream: bool) -> Result<Value> {
            Ok(json!({"count": messages.len(), "stream": stream}))
        }

        async fn execute(&self, request: Value) -> Result<Value> {
            Ok(json!({"choices": [{"message": {"content": format!("{} messages", request["count"])}}]}))
        }

        async fn execute_stream(&self, _: Value) -> Result<BoxStream<'static, Result<Value>>> {
            Ok(stream::iter(self.events.clone()).boxed())
        }

        fn parse_response(&self, response: &Value, _: &ChatOptions) -> Result<ChatResponse> {
            let (content, reasoning_content) = self.extract_reasoning(response).into_parts();
            Ok(ChatResponse {
                content,
                reasoning_content,
                ..Default::default()
            })
        }

        fn parse_stream_event(&self, event: &Value) -> StreamDelta {
            StreamDelta {
                content: event["text"].as_str().map(str::to_string),
                finish_reason: event["finish"].as_str().map(str::to_string),
                ..Default::default()
            }
        }

        fn extract_reasoning(&self, response: &Value) -> ReasoningExtraction {
            extract_reasoning(response)
        }

        fn stream_normalizer(&self, options: &ChatOptions) -> StreamNormalizer {
            StreamNormalizer::new(options.enable_reasoning, options.enable_reasoning)
        }

        async fn health_check(&self) -> Result<HealthStatus> {
            Ok(HealthStatus {
                healthy: true,
                provider: self.provider_type(),
                latency_ms: None,
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn test_chat_pipeline_validates_first() {
        let provider = ScriptedProvider { events: vec![] };
        let err = provider.chat(&[], &ChatOptions::default()).await.unwrap_err();
        assert_eq!(err, UnillmError::validation_error("Messages list cannot be empty"));

        let response = provider
            .chat(&[Message::user("hi")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(response.content, "1 messages");
    }

    #[tokio::test]
    async fn test_chat_stream_stops_at_finish() {
        let provider = ScriptedProvider {
            events: vec![
                Ok(json!({"text": "<think>plan</think>"})),
                Ok(json!({"text": "answer", "finish": "stop"})),
                Ok(json!({"text": "ignored"})),
            ],
        };

        let chunks: Vec<_> = provider
            .chat_stream(&[Message::user("hi")], &ChatOptions::with_reasoning())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.reasoning_delta.as_deref(), Some("plan"));
        assert!(first.is_reasoning_complete);
        let last = chunks[1].as_ref().unwrap();
        assert_eq!(last.content_delta, "answer");
        assert!(last.is_complete);
    }

    #[tokio::test]
    async fn test_chat_stream_surfaces_transport_error() {
        let provider = ScriptedProvider {
            events: vec![
                Ok(json!({"text": "partial"})),
                Err(UnillmError::network_error("connection reset")),
                Ok(json!({"text": "never"})),
            ],
        };

        let chunks: Vec<_> = provider
            .chat_stream(&[Message::user("hi")], &ChatOptions::default())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(chunks[1].is_err());
    }

    #[test]
    fn test_response_to_message() {
        let response = ChatResponse {
            content: "calling".to_string(),
            tool_calls: Some(vec![ToolCall::new("c1", "f", "{}")]),
            ..Default::default()
        };
        assert!(response.has_tool_calls());
        let message = response.to_message();
        assert_eq!(message.tool_calls.as_ref().unwrap().len(), 1);
        assert_eq!(ProviderType::Bedrock.to_string(), "bedrock");
    }
}
