//! OpenAI-compatible provider.
//!
//! Speaks the chat-completions protocol used by vLLM, LM Studio, llama.cpp
//! server, Ollama's compatibility layer and the hosted OpenAI API. Requests go
//! to `POST {base_url}/chat/completions`; streaming responses are read as
//! server-sent events.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use super::retry::{retry_llm_operation, RetryConfig};
use crate::config::OpenAICompatibleConfig;
use crate::error::{Result, UnillmError};
use crate::llm::reasoning::{self, ReasoningExtraction};
use crate::llm::standardize::standardize_tool_calls;
use crate::llm::streaming::{StreamDelta, StreamNormalizer, ToolCallDelta};
use crate::llm::traits::{ChatOptions, ChatResponse, HealthStatus, LlmProvider, ProviderType};
use crate::tools::{tool_schemas, Tool};
use crate::types::{ContentBlock, Message, MessageContent, MessageRole, ToolSchema};
use crate::utils::logging::{obscure_credential, preview};

const PROVIDER: &str = "openai_like";

/// Provider for any OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: reqwest::Client,
    tool_schemas: Vec<ToolSchema>,
}

impl OpenAICompatibleProvider {
    /// Create a provider; `tools` are used for schema generation only
    pub fn new(config: OpenAICompatibleConfig, tools: &[Arc<dyn Tool>]) -> Result<Self> {
        // No client-wide deadline: streams are bounded per read instead
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| {
                UnillmError::configuration_error(format!("Failed to build HTTP client: {}", e))
            })?;

        let tool_schemas = tool_schemas(tools)?;
        debug!(
            provider = PROVIDER,
            base_url = %config.base_url,
            model = %config.model,
            api_key = %obscure_credential(&config.api_key),
            tools = tool_schemas.len(),
            "Created OpenAI-compatible provider"
        );

        Ok(Self {
            config,
            client,
            tool_schemas,
        })
    }

    pub fn config(&self) -> &OpenAICompatibleConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Convert unified messages to OpenAI's message format
    fn convert_messages(&self, messages: &[Message]) -> Result<Vec<Value>> {
        messages.iter().map(convert_message).collect()
    }

    fn convert_tools(&self) -> Vec<Value> {
        self.tool_schemas
            .iter()
            .map(|schema| {
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters,
                    }
                })
            })
            .collect()
    }

    /// Send once, turning non-2xx statuses into provider errors.
    ///
    /// A buffered request is bounded end to end by `config.timeout`. A
    /// streaming request is only bounded until the response headers arrive;
    /// the body is then bounded per read by [`parse_sse_stream`].
    async fn send(&self, request: &Value, streaming: bool) -> Result<reqwest::Response> {
        let url = self.endpoint("chat/completions");
        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request);

        let sent = if streaming {
            tokio::time::timeout(self.config.timeout, builder.send())
                .await
                .map_err(|_| {
                    UnillmError::network_error(format!(
                        "Request timed out after {} ms waiting for response headers",
                        self.config.timeout.as_millis()
                    ))
                })?
        } else {
            builder.timeout(self.config.timeout).send().await
        };
        let response = sent.map_err(|e| {
            debug!(provider = PROVIDER, "HTTP request attempt failed: {}", e);
            UnillmError::network_error(format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let detail = error_detail(&body);
        error!(provider = PROVIDER, status = status.as_u16(), "API error: {}", detail);
        Err(UnillmError::provider_error(
            PROVIDER,
            format!("API request failed: {}", detail),
            Some(status.as_u16()),
        ))
    }

    async fn send_with_retry(
        &self,
        request: &Value,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        trace!(
            provider = PROVIDER,
            "POST {} body: {}",
            self.endpoint("chat/completions"),
            preview(&request.to_string(), 2000)
        );
        retry_llm_operation(|| self.send(request, streaming), &self.config.retry).await
    }
}

fn convert_message(message: &Message) -> Result<Value> {
    let mut converted = Map::new();
    converted.insert("role".to_string(), json!(message.role.as_str()));

    let content = match &message.content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Blocks(blocks) => {
            let parts = blocks
                .iter()
                .map(convert_block)
                .collect::<Result<Vec<_>>>()?;
            Value::Array(parts)
        }
    };
    converted.insert("content".to_string(), content);

    if message.role == MessageRole::Assistant {
        if let Some(calls) = message.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
            let calls: Vec<Value> = calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.arguments},
                    })
                })
                .collect();
            converted.insert("tool_calls".to_string(), Value::Array(calls));
        }
    }

    if message.role == MessageRole::Tool {
        if let Some(id) = &message.tool_call_id {
            converted.insert("tool_call_id".to_string(), json!(id));
        }
    }

    Ok(Value::Object(converted))
}

fn convert_block(block: &ContentBlock) -> Result<Value> {
    match block {
        ContentBlock::Text { text } => Ok(json!({"type": "text", "text": text})),
        ContentBlock::Image { image_data, format } => {
            let format = format.as_deref().unwrap_or("jpeg");
            Ok(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:image/{};base64,{}", format, image_data)},
            }))
        }
        ContentBlock::Document { .. } | ContentBlock::Video { .. } => {
            Err(UnillmError::validation_error(format!(
                "Content block type '{}' is not supported by the OpenAI-compatible provider",
                block.type_name()
            )))
        }
    }
}

/// `error.message` from an API error body, else the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// One parsed server-sent-events line
#[derive(Debug, PartialEq)]
enum SseLine {
    Event(Value),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str(data) {
        Ok(event) => SseLine::Event(event),
        Err(e) => {
            warn!(provider = PROVIDER, "Skipping unparseable SSE data: {}", e);
            SseLine::Skip
        }
    }
}

/// An in-band `{"error": {...}}` event
fn stream_error(event: &Value) -> Option<UnillmError> {
    let error = event.get("error")?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    let status = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok());
    Some(UnillmError::provider_error(
        PROVIDER,
        format!("Stream error: {}", message),
        status,
    ))
}

/// Byte buffer that yields complete lines.
///
/// Network reads can end inside a multi-byte character, so bytes are only
/// decoded once their terminating newline has arrived.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// The next newline-terminated line, terminator included
    fn next_line(&mut self) -> Option<String> {
        let newline = self.bytes.iter().position(|byte| *byte == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=newline).collect();
        Some(decode_line(line))
    }

    /// Whatever is left once the body has ended
    fn take_remainder(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.bytes)))
    }
}

fn decode_line(line: Vec<u8>) -> String {
    String::from_utf8(line).unwrap_or_else(|e| {
        warn!(provider = PROVIDER, "SSE line is not valid UTF-8: {}", e);
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    })
}

/// Decode a server-sent-events body; each read must arrive within `read_timeout`
fn parse_sse_stream(
    response: reqwest::Response,
    read_timeout: Duration,
) -> BoxStream<'static, Result<Value>> {
    let mut bytes = response.bytes_stream();

    let stream = async_stream::stream! {
        let mut buffer = LineBuffer::default();
        let mut events = 0usize;
        let mut done = false;

        'read: loop {
            let next = match tokio::time::timeout(read_timeout, bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    error!(provider = PROVIDER, events, "SSE stream stalled");
                    yield Err(UnillmError::network_error(format!(
                        "Stream stalled: no data received for {} ms",
                        read_timeout.as_millis()
                    )));
                    return;
                }
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    error!(provider = PROVIDER, "SSE stream error: {}", e);
                    yield Err(UnillmError::network_error(format!("Stream interrupted: {}", e)));
                    return;
                }
                None => break 'read,
            };
            buffer.extend(&chunk);

            while let Some(line) = buffer.next_line() {
                trace!(provider = PROVIDER, "SSE line: {}", line.trim_end());
                match parse_sse_line(&line) {
                    SseLine::Event(event) => {
                        if let Some(error) = stream_error(&event) {
                            yield Err(error);
                            return;
                        }
                        events += 1;
                        yield Ok(event);
                    }
                    SseLine::Done => {
                        done = true;
                        break 'read;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        // A final event without a trailing newline
        if let Some(line) = buffer.take_remainder().filter(|_| !done) {
            if let SseLine::Event(event) = parse_sse_line(&line) {
                match stream_error(&event) {
                    Some(error) => yield Err(error),
                    None => {
                        events += 1;
                        yield Ok(event);
                    }
                }
            }
        }

        debug!(provider = PROVIDER, events, "SSE stream ended");
    };

    stream.boxed()
}

#[async_trait]
impl LlmProvider for OpenAICompatibleProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAICompatible
    }

    fn tool_schemas(&self) -> &[ToolSchema] {
        &self.tool_schemas
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
        stream: bool,
    ) -> Result<Value> {
        let config = &self.config;
        let mut request = Map::new();
        request.insert("model".to_string(), json!(config.model));
        request.insert("messages".to_string(), json!(self.convert_messages(messages)?));
        request.insert("stream".to_string(), json!(stream));

        request.insert("temperature".to_string(), json!(config.temperature));
        request.insert("max_tokens".to_string(), json!(config.max_tokens));
        let optional = [
            ("top_p", config.top_p.map(Value::from)),
            ("frequency_penalty", config.frequency_penalty.map(Value::from)),
            ("presence_penalty", config.presence_penalty.map(Value::from)),
            ("stop", config.stop.as_ref().map(|stop| json!(stop))),
            ("seed", config.seed.map(Value::from)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                request.insert(key.to_string(), value);
            }
        }
        for (key, value) in &config.provider_params {
            request.insert(key.clone(), value.clone());
        }

        if !self.tool_schemas.is_empty() {
            request.insert("tools".to_string(), Value::Array(self.convert_tools()));
            request.insert("tool_choice".to_string(), json!("auto"));
        }

        Ok(Value::Object(request))
    }

    async fn execute(&self, request: Value) -> Result<Value> {
        let response = self.send_with_retry(&request, false).await?;
        let body = response.text().await.map_err(|e| {
            UnillmError::network_error(format!("Failed to read response body: {}", e))
        })?;
        trace!(provider = PROVIDER, "Response body: {}", preview(&body, 2000));
        Ok(serde_json::from_str(&body)?)
    }

    async fn execute_stream(&self, request: Value) -> Result<BoxStream<'static, Result<Value>>> {
        let response = self.send_with_retry(&request, true).await?;
        Ok(parse_sse_stream(response, self.config.timeout))
    }

    fn parse_response(&self, response: &Value, options: &ChatOptions) -> Result<ChatResponse> {
        let Some(choice) = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return Err(UnillmError::provider_error(
                PROVIDER,
                "Response contained no choices",
                None,
            ));
        };
        let message = choice.get("message").unwrap_or(&Value::Null);

        let mut content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let tool_calls = standardize_tool_calls(message.get("tool_calls"));

        let mut reasoning_content = None;
        let mut reasoning_tokens = None;
        if options.enable_reasoning {
            (content, reasoning_content) = self.extract_reasoning(response).into_parts();
            reasoning_tokens = reasoning::reasoning_tokens(response);
        }

        let field = |key: &str| response.get(key).cloned().unwrap_or(Value::Null);
        let metadata = [
            ("model", field("model")),
            ("usage", response.get("usage").cloned().unwrap_or_else(|| json!({}))),
            ("finish_reason", choice.get("finish_reason").cloned().unwrap_or(Value::Null)),
            ("system_fingerprint", field("system_fingerprint")),
            ("provider", json!(PROVIDER)),
            ("endpoint", json!(self.config.base_url)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Ok(ChatResponse {
            content,
            reasoning_content,
            reasoning_tokens,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            metadata,
        })
    }

    fn parse_stream_event(&self, event: &Value) -> StreamDelta {
        let mut delta = StreamDelta::default().with_metadata("raw_chunk", event.clone());
        if let Some(usage) = event.get("usage").filter(|usage| !usage.is_null()) {
            delta = delta.with_metadata("usage", usage.clone());
        }

        let Some(choice) = event
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return delta;
        };
        let chunk = choice.get("delta").unwrap_or(&Value::Null);
        let text = |key: &str| chunk.get(key).and_then(Value::as_str).map(str::to_string);

        delta.content = text("content");
        delta.native_reasoning = text("reasoning_content").or_else(|| text("thinking"));
        delta.finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(calls) = chunk.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let function = call.get("function").unwrap_or(&Value::Null);
                let field = |value: &Value, key: &str| {
                    value.get(key).and_then(Value::as_str).map(str::to_string)
                };
                delta.tool_calls.push(ToolCallDelta {
                    index: call.get("index").and_then(Value::as_u64),
                    id: field(call, "id"),
                    name: field(function, "name"),
                    arguments: None,
                    arguments_delta: field(function, "arguments"),
                });
            }
        }

        delta
            .with_metadata("model", event.get("model").cloned().unwrap_or(Value::Null))
            .with_metadata(
                "finish_reason",
                choice.get("finish_reason").cloned().unwrap_or(Value::Null),
            )
            .with_metadata("provider", json!(PROVIDER))
    }

    fn extract_reasoning(&self, response: &Value) -> ReasoningExtraction {
        reasoning::extract_reasoning(response)
    }

    fn stream_normalizer(&self, options: &ChatOptions) -> StreamNormalizer {
        StreamNormalizer::new(options.enable_reasoning, options.enable_reasoning)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let url = self.endpoint("models");
        let conservative_retry = RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        let start = Instant::now();
        let result = retry_llm_operation(
            || async {
                self.client
                    .get(&url)
                    .bearer_auth(&self.config.api_key)
                    .timeout(self.config.timeout)
                    .send()
                    .await
                    .map_err(|e| {
                        UnillmError::network_error(format!("Health check request failed: {}", e))
                    })
            },
            &conservative_retry,
        )
        .await;
        let latency = start.elapsed().as_millis() as u64;

        let status = match result {
            Ok(response) if response.status().is_success() => HealthStatus {
                healthy: true,
                provider: self.provider_type(),
                latency_ms: Some(latency),
                error: None,
            },
            Ok(response) => HealthStatus {
                healthy: false,
                provider: self.provider_type(),
                latency_ms: Some(latency),
                error: Some(format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    response.status().canonical_reason().unwrap_or("Unknown")
                )),
            },
            Err(e) => HealthStatus {
                healthy: false,
                provider: self.provider_type(),
                latency_ms: None,
                error: Some(format!("Connection failed: {}", e)),
            },
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ParamType};
    use crate::types::ToolCall;

    fn provider_with_tools() -> OpenAICompatibleProvider {
        let weather: Arc<dyn Tool> = Arc::new(
            FunctionTool::new("get_weather", |_| Ok(json!("sunny")))
                .with_description("Look up the weather")
                .param("location", ParamType::String),
        );
        let config = OpenAICompatibleConfig::new("qwen3-8b").with_base_url("http://localhost:1234");
        OpenAICompatibleProvider::new(config, &[weather]).unwrap()
    }

    #[test]
    fn test_prepare_request_shape() {
        let mut provider = provider_with_tools();
        provider.config.seed = Some(42);
        provider
            .config
            .provider_params
            .insert("repetition_penalty".to_string(), json!(1.05));

        let messages = vec![Message::system("be brief"), Message::user("weather in Tokyo?")];
        let request = provider
            .prepare_request(&messages, &ChatOptions::default(), true)
            .unwrap();

        assert_eq!(request["model"], "qwen3-8b");
        assert_eq!(request["stream"], true);
        assert_eq!(request["temperature"], 0.7);
        assert_eq!(request["max_tokens"], 1000);
        assert_eq!(request["seed"], 42);
        assert_eq!(request["repetition_penalty"], 1.05);
        assert!(request.get("top_p").is_none());
        assert_eq!(request["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(request["tool_choice"], "auto");
        assert_eq!(request["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(
            request["tools"][0]["function"]["parameters"]["required"],
            json!(["location"])
        );
    }

    #[test]
    fn test_message_conversion() {
        let assistant = Message::assistant("")
            .with_tool_calls(vec![ToolCall::new("call_1", "get_weather", r#"{"location":"Tokyo"}"#)]);
        let converted = convert_message(&assistant).unwrap();
        assert_eq!(converted["tool_calls"][0]["type"], "function");
        assert_eq!(converted["tool_calls"][0]["function"]["arguments"], r#"{"location":"Tokyo"}"#);

        let tool = convert_message(&Message::tool_result("call_1", "sunny")).unwrap();
        assert_eq!(tool, json!({"role": "tool", "content": "sunny", "tool_call_id": "call_1"}));

        let image = Message::with_blocks(
            MessageRole::User,
            vec![ContentBlock::text("what is this?"), ContentBlock::image("AAAA", Some("png"))],
        );
        let converted = convert_message(&image).unwrap();
        assert_eq!(converted["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");

        let video = Message::with_blocks(MessageRole::User, vec![ContentBlock::video("AAAA", None)]);
        assert!(matches!(
            convert_message(&video),
            Err(UnillmError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_parse_response_with_reasoning_gate() {
        let provider = provider_with_tools();
        let response = json!({
            "model": "qwen3-8b",
            "choices": [{
                "message": {
                    "content": "<think>need the tool</think>Checking.",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Tokyo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8}
        });

        let plain = provider.parse_response(&response, &ChatOptions::default()).unwrap();
        assert_eq!(plain.content, "<think>need the tool</think>Checking.");
        assert!(plain.reasoning_content.is_none());
        assert_eq!(plain.tool_calls.as_ref().unwrap()[0].id, "call_9");
        assert_eq!(plain.metadata["finish_reason"], "tool_calls");
        assert_eq!(plain.metadata["provider"], "openai_like");
        assert_eq!(plain.metadata["endpoint"], "http://localhost:1234/v1");

        let reasoned = provider
            .parse_response(&response, &ChatOptions::with_reasoning())
            .unwrap();
        assert_eq!(reasoned.content, "Checking.");
        assert_eq!(reasoned.reasoning_content.as_deref(), Some("need the tool"));

        assert!(provider.parse_response(&json!({"choices": []}), &ChatOptions::default()).is_err());
    }

    #[test]
    fn test_parse_stream_event() {
        let provider = provider_with_tools();
        let delta = provider.parse_stream_event(&json!({
            "model": "qwen3-8b",
            "choices": [{
                "delta": {
                    "content": "Hi",
                    "reasoning_content": "greeting",
                    "tool_calls": [{"index": 0, "id": "call_1", "function": {"name": "get_weather", "arguments": "{\"lo"}}]
                },
                "finish_reason": null
            }]
        }));

        assert_eq!(delta.content.as_deref(), Some("Hi"));
        assert_eq!(delta.native_reasoning.as_deref(), Some("greeting"));
        assert_eq!(delta.tool_calls[0].index, Some(0));
        assert_eq!(delta.tool_calls[0].arguments_delta.as_deref(), Some("{\"lo"));
        assert!(delta.finish_reason.is_none());
        assert_eq!(delta.metadata["provider"], "openai_like");
        assert!(delta.metadata.contains_key("raw_chunk"));

        let usage_only = provider.parse_stream_event(&json!({"choices": [], "usage": {"total_tokens": 3}}));
        assert!(usage_only.content.is_none());
        assert_eq!(usage_only.metadata["usage"]["total_tokens"], 3);
    }

    #[test]
    fn test_sse_line_parsing() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: {\"a\":1}\r\n"), SseLine::Event(json!({"a": 1})));
        assert_eq!(error_detail(r#"{"error":{"message":"model not loaded"}}"#), "model not loaded");
        assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_line_buffer_holds_split_characters() {
        let encoded = "data: café\n".as_bytes();
        let split = encoded.iter().position(|byte| *byte == 0xC3).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        buffer.extend(&encoded[..split]);
        assert!(buffer.next_line().is_none());
        buffer.extend(&encoded[split..]);
        assert_eq!(buffer.next_line().as_deref(), Some("data: café\n"));
        assert!(buffer.next_line().is_none());

        buffer.extend(b"data: tail");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.take_remainder().as_deref(), Some("data: tail"));
        assert!(buffer.take_remainder().is_none());
    }
}
