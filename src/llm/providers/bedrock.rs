//! AWS Bedrock provider using the Converse API.
//!
//! Requests are prepared as Converse-shaped JSON (the same document the
//! Converse API accepts over the wire) and mapped onto SDK builders at send
//! time. SDK output is mapped back into Converse-shaped JSON before parsing, so
//! response and stream-event parsing stay pure functions of JSON.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::config::http::HttpResponse;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, SdkError};
use aws_sdk_bedrockruntime::operation::converse::ConverseOutput as ConverseResponse;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    AutoToolChoice, ContentBlock as BedrockBlock, ContentBlockDelta, ContentBlockStart,
    ConversationRole, ConverseOutput, ConverseStreamOutput, DocumentBlock, DocumentFormat,
    DocumentSource, ImageBlock, ImageFormat, ImageSource, InferenceConfiguration,
    Message as BedrockMessage, ReasoningContentBlock, ReasoningContentBlockDelta,
    ReasoningTextBlock, SystemContentBlock, TokenUsage, Tool as BedrockTool, ToolChoice,
    ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock,
    ToolResultStatus, ToolSpecification, ToolUseBlock, VideoBlock, VideoFormat, VideoSource,
};
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_smithy_types::{Document, Number};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::config::BedrockConfig;
use crate::error::{Result, UnillmError};
use crate::llm::reasoning::{ExtractionMethod, ReasoningExtraction};
use crate::llm::standardize::standardize_tool_calls;
use crate::llm::streaming::{StreamDelta, StreamNormalizer, ToolCallDelta};
use crate::llm::traits::{ChatOptions, ChatResponse, HealthStatus, LlmProvider, ProviderType};
use crate::tools::{tool_schemas, Tool};
use crate::types::{ContentBlock, Message, MessageContent, MessageRole, ToolSchema};
use crate::utils::logging::{obscure_credential, preview};

const PROVIDER: &str = "bedrock";

/// AWS Bedrock provider
#[derive(Debug, Clone)]
pub struct BedrockProvider {
    client: BedrockClient,
    config: BedrockConfig,
    tool_schemas: Vec<ToolSchema>,
}

impl BedrockProvider {
    /// Build a client from `config` and create the provider
    ///
    /// Credentials come from the configured access key, else the named
    /// profile, else the default AWS chain.
    pub async fn new(config: BedrockConfig, tools: &[Arc<dyn Tool>]) -> Result<Self> {
        let client = build_client(&config).await;
        Self::with_client(client, config, tools)
    }

    /// Create the provider around a pre-configured client
    pub fn with_client(
        client: BedrockClient,
        config: BedrockConfig,
        tools: &[Arc<dyn Tool>],
    ) -> Result<Self> {
        let tool_schemas = tool_schemas(tools)?;
        debug!(
            provider = PROVIDER,
            model_id = %config.model_id,
            region = %config.region,
            tools = tool_schemas.len(),
            "Created Bedrock provider"
        );
        Ok(Self {
            client,
            config,
            tool_schemas,
        })
    }

    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    fn convert_message(&self, message: &Message, options: &ChatOptions) -> Result<Value> {
        if message.role == MessageRole::Tool {
            let result = json!({
                "toolResult": {
                    "toolUseId": message.tool_call_id.clone().unwrap_or_default(),
                    "content": [{"text": message.text()}],
                    "status": "success",
                }
            });
            return Ok(json!({"role": "user", "content": [result]}));
        }

        let mut content = Vec::new();
        if message.role == MessageRole::Assistant && options.enable_reasoning {
            if let Some(reasoning) = &message.reasoning {
                let mut text = Map::new();
                text.insert("text".to_string(), json!(reasoning));
                if let Some(signature) = &message.reasoning_signature {
                    text.insert("signature".to_string(), json!(signature));
                }
                content.push(json!({"reasoningContent": {"reasoningText": text}}));
            }
        }

        match &message.content {
            MessageContent::Text(text) => {
                if !text.is_empty() {
                    content.push(json!({"text": text}));
                }
            }
            MessageContent::Blocks(blocks) => {
                for block in blocks {
                    content.push(convert_block(block)?);
                }
            }
        }

        if message.role == MessageRole::Assistant {
            for call in message.tool_calls.iter().flatten() {
                let input = match call.arguments.trim() {
                    "" => json!({}),
                    raw => serde_json::from_str(raw).map_err(|e| {
                        UnillmError::validation_error(format!(
                            "Tool call '{}' has invalid JSON arguments: {}",
                            call.id, e
                        ))
                    })?,
                };
                content.push(json!({
                    "toolUse": {"toolUseId": call.id, "name": call.name, "input": input}
                }));
            }
        }

        if content.is_empty() {
            content.push(json!({"text": ""}));
        }

        Ok(json!({"role": message.role.as_str(), "content": content}))
    }

    fn tool_config(&self) -> Value {
        let tools: Vec<Value> = self
            .tool_schemas
            .iter()
            .map(|schema| {
                json!({
                    "toolSpec": {
                        "name": schema.name,
                        "description": schema.description,
                        "inputSchema": {"json": schema.parameters},
                    }
                })
            })
            .collect();
        json!({"tools": tools, "toolChoice": {"auto": {}}})
    }
}

async fn build_client(config: &BedrockConfig) -> BedrockClient {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key)
    {
        debug!(
            provider = PROVIDER,
            access_key = %obscure_credential(access_key),
            "Using static AWS credentials"
        );
        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            config.session_token.clone(),
            None,
            "unillm-config",
        );
        loader = loader.credentials_provider(credentials);
    } else if let Some(profile) = &config.profile_name {
        debug!(provider = PROVIDER, profile = %profile, "Using AWS profile");
        loader = loader.profile_name(profile);
    }

    BedrockClient::new(&loader.load().await)
}

fn convert_block(block: &ContentBlock) -> Result<Value> {
    let checked = |data: &str| -> Result<String> {
        BASE64.decode(data).map_err(|e| {
            UnillmError::validation_error(format!(
                "Content block of type '{}' has invalid base64 data: {}",
                block.type_name(),
                e
            ))
        })?;
        Ok(data.to_string())
    };

    Ok(match block {
        ContentBlock::Text { text } => json!({"text": text}),
        ContentBlock::Image { image_data, format } => json!({
            "image": {
                "format": format.as_deref().unwrap_or("jpeg"),
                "source": {"bytes": checked(image_data)?},
            }
        }),
        ContentBlock::Document {
            document_data,
            format,
            name,
        } => json!({
            "document": {
                "format": format.as_deref().unwrap_or("txt"),
                "name": name.as_deref().unwrap_or("document"),
                "source": {"bytes": checked(document_data)?},
            }
        }),
        ContentBlock::Video { video_data, format } => json!({
            "video": {
                "format": format.as_deref().unwrap_or("mp4"),
                "source": {"bytes": checked(video_data)?},
            }
        }),
    })
}

// JSON -> SDK mapping

/// A prepared Converse request mapped onto SDK types
struct ConverseInput {
    model_id: String,
    system: Vec<SystemContentBlock>,
    messages: Vec<BedrockMessage>,
    inference: Option<InferenceConfiguration>,
    tools: Option<ToolConfiguration>,
    additional: Option<Document>,
}

/// Apply a [`ConverseInput`] to a `converse` or `converse_stream` builder
macro_rules! apply_input {
    ($builder:expr, $input:expr) => {{
        let input = $input;
        $builder
            .model_id(input.model_id)
            .set_system((!input.system.is_empty()).then_some(input.system))
            .set_messages(Some(input.messages))
            .set_inference_config(input.inference)
            .set_tool_config(input.tools)
            .set_additional_model_request_fields(input.additional)
    }};
}

fn invalid(what: &str, e: impl std::fmt::Display) -> UnillmError {
    UnillmError::validation_error(format!("Invalid Bedrock {}: {}", what, e))
}

fn str_at<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn decode_bytes(source: &Value) -> Result<Blob> {
    let data = str_at(source, "bytes");
    BASE64
        .decode(data)
        .map(Blob::new)
        .map_err(|e| invalid("content bytes", e))
}

fn converse_input(request: &Value) -> Result<ConverseInput> {
    let system = request
        .get("system")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .map(|block| SystemContentBlock::Text(str_at(block, "text").to_string()))
                .collect()
        })
        .unwrap_or_default();

    let messages = request
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| messages.iter().map(sdk_message).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let inference = request.get("inferenceConfig").map(|config| {
        let float = |key: &str| config.get(key).and_then(Value::as_f64).map(|v| v as f32);
        InferenceConfiguration::builder()
            .set_temperature(float("temperature"))
            .set_top_p(float("topP"))
            .set_max_tokens(
                config
                    .get("maxTokens")
                    .and_then(Value::as_i64)
                    .and_then(|v| i32::try_from(v).ok()),
            )
            .set_stop_sequences(config.get("stopSequences").and_then(Value::as_array).map(
                |stops| {
                    stops
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                },
            ))
            .build()
    });

    let tools = request.get("toolConfig").map(sdk_tool_config).transpose()?;

    Ok(ConverseInput {
        model_id: str_at(request, "modelId").to_string(),
        system,
        messages,
        inference,
        tools,
        additional: request
            .get("additionalModelRequestFields")
            .map(value_to_document),
    })
}

fn sdk_message(message: &Value) -> Result<BedrockMessage> {
    let role = match str_at(message, "role") {
        "assistant" => ConversationRole::Assistant,
        _ => ConversationRole::User,
    };
    let content = message
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().map(sdk_block).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    BedrockMessage::builder()
        .role(role)
        .set_content(Some(content))
        .build()
        .map_err(|e| invalid("message", e))
}

fn sdk_block(block: &Value) -> Result<BedrockBlock> {
    if let Some(text) = block.get("text").and_then(Value::as_str) {
        return Ok(BedrockBlock::Text(text.to_string()));
    }
    if let Some(image) = block.get("image") {
        let image = ImageBlock::builder()
            .format(ImageFormat::from(str_at(image, "format")))
            .source(ImageSource::Bytes(decode_bytes(&image["source"])?))
            .build()
            .map_err(|e| invalid("image block", e))?;
        return Ok(BedrockBlock::Image(image));
    }
    if let Some(document) = block.get("document") {
        let document = DocumentBlock::builder()
            .format(DocumentFormat::from(str_at(document, "format")))
            .name(str_at(document, "name"))
            .source(DocumentSource::Bytes(decode_bytes(&document["source"])?))
            .build()
            .map_err(|e| invalid("document block", e))?;
        return Ok(BedrockBlock::Document(document));
    }
    if let Some(video) = block.get("video") {
        let video = VideoBlock::builder()
            .format(VideoFormat::from(str_at(video, "format")))
            .source(VideoSource::Bytes(decode_bytes(&video["source"])?))
            .build()
            .map_err(|e| invalid("video block", e))?;
        return Ok(BedrockBlock::Video(video));
    }
    if let Some(tool_use) = block.get("toolUse") {
        let tool_use = ToolUseBlock::builder()
            .tool_use_id(str_at(tool_use, "toolUseId"))
            .name(str_at(tool_use, "name"))
            .input(value_to_document(tool_use.get("input").unwrap_or(&Value::Null)))
            .build()
            .map_err(|e| invalid("toolUse block", e))?;
        return Ok(BedrockBlock::ToolUse(tool_use));
    }
    if let Some(result) = block.get("toolResult") {
        let content = result
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .map(|part| ToolResultContentBlock::Text(str_at(part, "text").to_string()))
                    .collect()
            });
        let result = ToolResultBlock::builder()
            .tool_use_id(str_at(result, "toolUseId"))
            .set_content(content)
            .status(ToolResultStatus::from(str_at(result, "status")))
            .build()
            .map_err(|e| invalid("toolResult block", e))?;
        return Ok(BedrockBlock::ToolResult(result));
    }
    if let Some(reasoning) = block.get("reasoningContent") {
        let text = &reasoning["reasoningText"];
        let text = ReasoningTextBlock::builder()
            .text(str_at(text, "text"))
            .set_signature(text.get("signature").and_then(Value::as_str).map(str::to_string))
            .build()
            .map_err(|e| invalid("reasoningContent block", e))?;
        return Ok(BedrockBlock::ReasoningContent(
            ReasoningContentBlock::ReasoningText(text),
        ));
    }

    Err(UnillmError::validation_error(format!(
        "Unsupported Bedrock content block: {}",
        preview(&block.to_string(), 200)
    )))
}

fn sdk_tool_config(config: &Value) -> Result<ToolConfiguration> {
    let tools = config
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .map(|tool| {
                    let spec = &tool["toolSpec"];
                    ToolSpecification::builder()
                        .name(str_at(spec, "name"))
                        .set_description(
                            spec.get("description").and_then(Value::as_str).map(str::to_string),
                        )
                        .input_schema(ToolInputSchema::Json(value_to_document(
                            &spec["inputSchema"]["json"],
                        )))
                        .build()
                        .map(BedrockTool::ToolSpec)
                        .map_err(|e| invalid("tool specification", e))
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    ToolConfiguration::builder()
        .set_tools(tools)
        .tool_choice(ToolChoice::Auto(AutoToolChoice::builder().build()))
        .build()
        .map_err(|e| invalid("tool configuration", e))
}

// SDK -> JSON mapping

fn usage_json(usage: &TokenUsage) -> Value {
    json!({
        "inputTokens": usage.input_tokens(),
        "outputTokens": usage.output_tokens(),
        "totalTokens": usage.total_tokens(),
    })
}

fn block_json(block: &BedrockBlock) -> Option<Value> {
    match block {
        BedrockBlock::Text(text) => Some(json!({"text": text})),
        BedrockBlock::ToolUse(tool_use) => Some(json!({
            "toolUse": {
                "toolUseId": tool_use.tool_use_id(),
                "name": tool_use.name(),
                "input": document_to_value(tool_use.input()),
            }
        })),
        BedrockBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(text)) => {
            Some(json!({
                "reasoningContent": {
                    "reasoningText": {"text": text.text(), "signature": text.signature()}
                }
            }))
        }
        _ => None,
    }
}

fn response_json(output: &ConverseResponse) -> Value {
    let content: Vec<Value> = match output.output() {
        Some(ConverseOutput::Message(message)) => {
            message.content().iter().filter_map(block_json).collect()
        }
        _ => Vec::new(),
    };

    let mut response = json!({
        "output": {"message": {"role": "assistant", "content": content}},
        "stopReason": output.stop_reason().as_str(),
    });
    if let Some(usage) = output.usage() {
        response["usage"] = usage_json(usage);
    }
    if let Some(metrics) = output.metrics() {
        response["metrics"] = json!({"latencyMs": metrics.latency_ms()});
    }
    response
}

fn stream_event_json(event: &ConverseStreamOutput) -> Option<Value> {
    match event {
        ConverseStreamOutput::MessageStart(start) => {
            Some(json!({"messageStart": {"role": start.role().as_str()}}))
        }
        ConverseStreamOutput::ContentBlockStart(start) => match start.start() {
            Some(ContentBlockStart::ToolUse(tool_use)) => Some(json!({
                "contentBlockStart": {
                    "contentBlockIndex": start.content_block_index(),
                    "start": {
                        "toolUse": {"toolUseId": tool_use.tool_use_id(), "name": tool_use.name()}
                    }
                }
            })),
            _ => None,
        },
        ConverseStreamOutput::ContentBlockDelta(delta) => {
            let body = match delta.delta()? {
                ContentBlockDelta::Text(text) => json!({"text": text}),
                ContentBlockDelta::ToolUse(tool_use) => {
                    json!({"toolUse": {"input": tool_use.input()}})
                }
                ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Text(text)) => {
                    json!({"reasoningContent": {"text": text}})
                }
                ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Signature(
                    signature,
                )) => json!({"reasoningContent": {"signature": signature}}),
                _ => return None,
            };
            Some(json!({
                "contentBlockDelta": {
                    "contentBlockIndex": delta.content_block_index(),
                    "delta": body,
                }
            }))
        }
        ConverseStreamOutput::ContentBlockStop(stop) => Some(json!({
            "contentBlockStop": {"contentBlockIndex": stop.content_block_index()}
        })),
        ConverseStreamOutput::MessageStop(stop) => Some(json!({
            "messageStop": {"stopReason": stop.stop_reason().as_str()}
        })),
        ConverseStreamOutput::Metadata(metadata) => {
            let mut body = Map::new();
            if let Some(usage) = metadata.usage() {
                body.insert("usage".to_string(), usage_json(usage));
            }
            if let Some(metrics) = metadata.metrics() {
                body.insert("metrics".to_string(), json!({"latencyMs": metrics.latency_ms()}));
            }
            Some(json!({"metadata": body}))
        }
        _ => None,
    }
}

fn sdk_error<E>(operation: &str, error: SdkError<E, HttpResponse>) -> UnillmError
where
    E: std::error::Error + 'static,
{
    let status = error.raw_response().map(|r| r.status().as_u16());
    let message = DisplayErrorContext(&error).to_string();
    error!(provider = PROVIDER, status = ?status, "{} failed: {}", operation, message);
    UnillmError::provider_error(
        PROVIDER,
        format!("Bedrock {} error: {}", operation, message),
        status,
    )
}

/// Convert a `serde_json::Value` to an AWS `Document`
pub(crate) fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                n.as_f64()
                    .map_or(Document::Null, |f| Document::Number(Number::Float(f)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

/// Convert an AWS `Document` to a `serde_json::Value`
pub(crate) fn document_to_value(document: &Document) -> Value {
    match document {
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_value(v)))
                .collect(),
        ),
        Document::Array(items) => Value::Array(items.iter().map(document_to_value).collect()),
        Document::Number(Number::PosInt(u)) => json!(u),
        Document::Number(Number::NegInt(i)) => json!(i),
        Document::Number(Number::Float(f)) => {
            serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
        }
        Document::String(s) => Value::String(s.clone()),
        Document::Bool(b) => Value::Bool(*b),
        Document::Null => Value::Null,
    }
}

fn message_blocks(response: &Value) -> &[Value] {
    response
        .get("output")
        .and_then(|output| output.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Bedrock
    }

    fn tool_schemas(&self) -> &[ToolSchema] {
        &self.tool_schemas
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        _stream: bool,
    ) -> Result<Value> {
        let config = &self.config;
        let mut system = Vec::new();
        let mut converted = Vec::new();
        for message in messages {
            if message.role == MessageRole::System {
                system.push(json!({"text": message.text()}));
            } else {
                converted.push(self.convert_message(message, options)?);
            }
        }

        let mut request = Map::new();
        request.insert("modelId".to_string(), json!(config.model_id));
        request.insert("messages".to_string(), Value::Array(converted));
        if !system.is_empty() {
            request.insert("system".to_string(), Value::Array(system));
        }

        let mut inference = Map::new();
        let entries = [
            ("temperature", config.temperature.map(Value::from)),
            ("maxTokens", config.max_tokens.map(Value::from)),
            ("topP", config.top_p.map(Value::from)),
            ("stopSequences", config.stop_sequences.as_ref().map(|s| json!(s))),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                inference.insert(key.to_string(), value);
            }
        }
        if !inference.is_empty() {
            request.insert("inferenceConfig".to_string(), Value::Object(inference));
        }

        if !self.tool_schemas.is_empty() {
            request.insert("toolConfig".to_string(), self.tool_config());
        }

        let mut additional: Map<String, Value> = config
            .additional_model_request_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if options.enable_reasoning {
            additional.insert(
                "thinking".to_string(),
                json!({"type": "enabled", "budget_tokens": config.reasoning_budget_tokens}),
            );
        }
        if !additional.is_empty() {
            request.insert(
                "additionalModelRequestFields".to_string(),
                Value::Object(additional),
            );
        }

        Ok(Value::Object(request))
    }

    async fn execute(&self, request: Value) -> Result<Value> {
        trace!(provider = PROVIDER, "Converse request: {}", preview(&request.to_string(), 2000));
        let input = converse_input(&request)?;
        let output = apply_input!(self.client.converse(), input)
            .send()
            .await
            .map_err(|e| sdk_error("converse", e))?;
        let response = response_json(&output);
        trace!(provider = PROVIDER, "Converse response: {}", preview(&response.to_string(), 2000));
        Ok(response)
    }

    async fn execute_stream(&self, request: Value) -> Result<BoxStream<'static, Result<Value>>> {
        let input = converse_input(&request)?;
        let output = apply_input!(self.client.converse_stream(), input)
            .send()
            .await
            .map_err(|e| sdk_error("converse_stream", e))?;
        let mut receiver = output.stream;

        // messageStop is held until the next event so a trailing metadata
        // event (usage, metrics) travels with it
        let stream = async_stream::stream! {
            let mut pending_stop: Option<Value> = None;
            loop {
                match receiver.recv().await {
                    Ok(Some(event)) => {
                        let Some(event) = stream_event_json(&event) else {
                            continue;
                        };
                        trace!(provider = PROVIDER, "Stream event: {}", event);
                        if event.get("messageStop").is_some() {
                            pending_stop = Some(event);
                            continue;
                        }
                        if let Some(mut stop) = pending_stop.take() {
                            if let Some(metadata) = event.get("metadata") {
                                stop["metadata"] = metadata.clone();
                                yield Ok(stop);
                                continue;
                            }
                            yield Ok(stop);
                        }
                        yield Ok(event);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let message = DisplayErrorContext(&e).to_string();
                        error!(provider = PROVIDER, "Stream error: {}", message);
                        yield Err(UnillmError::provider_error(
                            PROVIDER,
                            format!("Bedrock stream error: {}", message),
                            None,
                        ));
                        return;
                    }
                }
            }
            if let Some(stop) = pending_stop {
                yield Ok(stop);
            }
        };

        Ok(stream.boxed())
    }

    fn parse_response(&self, response: &Value, _options: &ChatOptions) -> Result<ChatResponse> {
        let (content, reasoning_content) = self.extract_reasoning(response).into_parts();

        let tool_uses: Vec<Value> = message_blocks(response)
            .iter()
            .filter(|block| block.get("toolUse").is_some())
            .cloned()
            .collect();
        let tool_calls = standardize_tool_calls(Some(&Value::Array(tool_uses)));

        let usage = response.get("usage").cloned().unwrap_or_else(|| json!({}));

        let metadata = [
            ("model", json!(self.config.model_id)),
            ("usage", usage),
            ("stop_reason", response.get("stopReason").cloned().unwrap_or(Value::Null)),
            ("provider", json!(PROVIDER)),
            ("metrics", response.get("metrics").cloned().unwrap_or(Value::Null)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Ok(ChatResponse {
            content,
            reasoning_content,
            // Converse usage has no reasoning-token count
            reasoning_tokens: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            metadata,
        })
    }

    fn parse_stream_event(&self, event: &Value) -> StreamDelta {
        let mut delta = StreamDelta::default().with_metadata("provider", json!(PROVIDER));

        if let Some(start) = event.get("messageStart") {
            delta = delta.with_metadata("role", start.get("role").cloned().unwrap_or(Value::Null));
        }

        if let Some(start) = event.get("contentBlockStart") {
            if let Some(tool_use) = start.get("start").and_then(|s| s.get("toolUse")) {
                delta.tool_calls.push(ToolCallDelta {
                    index: start.get("contentBlockIndex").and_then(Value::as_u64),
                    id: tool_use.get("toolUseId").and_then(Value::as_str).map(str::to_string),
                    name: tool_use.get("name").and_then(Value::as_str).map(str::to_string),
                    ..Default::default()
                });
            }
        }

        if let Some(block) = event.get("contentBlockDelta") {
            let body = block.get("delta").unwrap_or(&Value::Null);
            if let Some(text) = body.get("text").and_then(Value::as_str) {
                delta.content = Some(text.to_string());
            } else if let Some(tool_use) = body.get("toolUse") {
                delta.tool_calls.push(ToolCallDelta {
                    index: block.get("contentBlockIndex").and_then(Value::as_u64),
                    arguments_delta: Some(str_at(tool_use, "input").to_string()),
                    ..Default::default()
                });
            } else if let Some(reasoning) = body.get("reasoningContent") {
                delta.native_reasoning = reasoning
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }

        if let Some(stop) = event.get("messageStop") {
            let reason = stop.get("stopReason").and_then(Value::as_str).map(str::to_string);
            if let Some(reason) = &reason {
                delta = delta.with_metadata("finish_reason", json!(reason));
            }
            delta.finish_reason = reason;
        }

        if let Some(metadata) = event.get("metadata") {
            delta = delta
                .with_metadata("usage", metadata.get("usage").cloned().unwrap_or_else(|| json!({})))
                .with_metadata(
                    "metrics",
                    metadata.get("metrics").cloned().unwrap_or_else(|| json!({})),
                )
                .with_metadata("model", json!(self.config.model_id));
        }

        delta
    }

    fn extract_reasoning(&self, response: &Value) -> ReasoningExtraction {
        let mut content = Vec::new();
        let mut reasoning = Vec::new();
        for block in message_blocks(response) {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                content.push(text);
            } else if let Some(native) = block.get("reasoningContent") {
                reasoning.push(
                    native
                        .get("reasoningText")
                        .and_then(|text| text.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                );
            }
        }

        let (reasoning, method) = if reasoning.is_empty() {
            (None, ExtractionMethod::None)
        } else {
            (Some(reasoning.join("\n")), ExtractionMethod::NativeField)
        };
        ReasoningExtraction {
            content: content.join("\n"),
            reasoning,
            method,
        }
    }

    fn stream_normalizer(&self, _options: &ChatOptions) -> StreamNormalizer {
        StreamNormalizer::new(false, true)
    }

    /// Round-trips a one-token Converse call
    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let ping = BedrockMessage::builder()
            .role(ConversationRole::User)
            .content(BedrockBlock::Text("ping".to_string()))
            .build()
            .map_err(|e| invalid("message", e))?;

        let result = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .messages(ping)
            .inference_config(InferenceConfiguration::builder().max_tokens(1).build())
            .send()
            .await;
        let latency = start.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(_) => HealthStatus {
                healthy: true,
                provider: ProviderType::Bedrock,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => HealthStatus {
                healthy: false,
                provider: ProviderType::Bedrock,
                latency_ms: Some(latency),
                error: Some(sdk_error("health check", e).to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ParamType};
    use crate::types::ToolCall;

    fn provider() -> BedrockProvider {
        let calculate: Arc<dyn Tool> = Arc::new(
            FunctionTool::new("calculate", |_| Ok(json!(4.0)))
                .with_description("Evaluate arithmetic")
                .param("expression", ParamType::String),
        );
        let sdk_config = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(aws_sdk_bedrockruntime::config::BehaviorVersion::latest())
            .region(aws_sdk_bedrockruntime::config::Region::new("us-east-1"))
            .build();
        let mut config = BedrockConfig::new("anthropic.claude-3-7-sonnet-20250219-v1:0");
        config.max_tokens = Some(512);
        config
            .additional_model_request_fields
            .insert("top_k".to_string(), json!(40));
        BedrockProvider::with_client(BedrockClient::from_conf(sdk_config), config, &[calculate])
            .unwrap()
    }

    #[test]
    fn test_prepare_request() {
        let provider = provider();
        let messages = vec![
            Message::system("You are terse."),
            Message::user("2+2?"),
            Message::assistant("")
                .with_tool_calls(vec![ToolCall::new("tooluse_1", "calculate", r#"{"expression":"2+2"}"#)])
                .with_reasoning("use the tool", Some("sig".to_string())),
            Message::tool_result("tooluse_1", "4.0"),
        ];

        let request = provider
            .prepare_request(&messages, &ChatOptions::with_reasoning(), false)
            .unwrap();

        assert_eq!(request["system"], json!([{"text": "You are terse."}]));
        assert_eq!(request["messages"][0], json!({"role": "user", "content": [{"text": "2+2?"}]}));

        let assistant = &request["messages"][1]["content"];
        assert_eq!(assistant[0]["reasoningContent"]["reasoningText"]["signature"], "sig");
        assert_eq!(assistant[1]["toolUse"]["input"], json!({"expression": "2+2"}));

        let tool = &request["messages"][2];
        assert_eq!(tool["role"], "user");
        assert_eq!(tool["content"][0]["toolResult"]["toolUseId"], "tooluse_1");
        assert_eq!(tool["content"][0]["toolResult"]["status"], "success");

        assert_eq!(request["inferenceConfig"], json!({"maxTokens": 512}));
        assert_eq!(request["toolConfig"]["toolChoice"], json!({"auto": {}}));
        assert_eq!(
            request["toolConfig"]["tools"][0]["toolSpec"]["inputSchema"]["json"]["required"],
            json!(["expression"])
        );
        assert_eq!(request["additionalModelRequestFields"]["top_k"], 40);
        assert_eq!(
            request["additionalModelRequestFields"]["thinking"],
            json!({"type": "enabled", "budget_tokens": 2000})
        );

        let plain = provider
            .prepare_request(&messages, &ChatOptions::default(), false)
            .unwrap();
        assert!(plain["additionalModelRequestFields"].get("thinking").is_none());
        assert!(plain["messages"][1]["content"][0].get("toolUse").is_some());

        // maps cleanly onto SDK types
        let input = converse_input(&request).unwrap();
        assert_eq!(input.messages.len(), 3);
        assert_eq!(input.system.len(), 1);
        assert!(input.tools.is_some());
    }

    #[test]
    fn test_media_blocks() {
        let provider = provider();
        let message = Message::with_blocks(
            MessageRole::User,
            vec![
                ContentBlock::image("aGVsbG8=", None),
                ContentBlock::document("aGVsbG8=", Some("pdf"), None),
                ContentBlock::video("aGVsbG8=", None),
            ],
        );
        let converted = provider
            .convert_message(&message, &ChatOptions::default())
            .unwrap();
        assert_eq!(converted["content"][0]["image"]["format"], "jpeg");
        assert_eq!(converted["content"][1]["document"]["name"], "document");
        assert_eq!(converted["content"][1]["document"]["format"], "pdf");
        assert_eq!(converted["content"][2]["video"]["format"], "mp4");
        assert!(sdk_message(&converted).is_ok());

        let bad = Message::with_blocks(MessageRole::User, vec![ContentBlock::image("not base64!", None)]);
        assert!(provider.convert_message(&bad, &ChatOptions::default()).is_err());
    }

    #[test]
    fn test_parse_response() {
        let provider = provider();
        let response = json!({
            "output": {"message": {"role": "assistant", "content": [
                {"reasoningContent": {"reasoningText": {"text": "2 plus 2", "signature": "abc"}}},
                {"text": "Let me check."},
                {"toolUse": {"toolUseId": "tooluse_1", "name": "calculate", "input": {"expression": "2+2"}}},
                {"text": "Done."}
            ]}},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 20, "outputTokens": 10, "totalTokens": 30},
            "metrics": {"latencyMs": 321}
        });

        let parsed = provider.parse_response(&response, &ChatOptions::default()).unwrap();
        assert_eq!(parsed.content, "Let me check.\nDone.");
        assert_eq!(parsed.reasoning_content.as_deref(), Some("2 plus 2"));
        assert!(parsed.reasoning_tokens.is_none());
        assert_eq!(parsed.metadata["usage"]["totalTokens"], 30);
        assert_eq!(
            parsed.tool_calls.unwrap(),
            vec![ToolCall::new("tooluse_1", "calculate", r#"{"expression":"2+2"}"#)]
        );
        assert_eq!(parsed.metadata["stop_reason"], "tool_use");
        assert_eq!(parsed.metadata["provider"], "bedrock");
        assert_eq!(parsed.metadata["metrics"]["latencyMs"], 321);

        let empty = provider.parse_response(&json!({}), &ChatOptions::default()).unwrap();
        assert_eq!(empty.content, "");
        assert!(empty.tool_calls.is_none());
    }

    #[test]
    fn test_stream_events_through_normalizer() {
        let provider = provider();
        let events = [
            json!({"messageStart": {"role": "assistant"}}),
            json!({"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"reasoningContent": {"text": "thinking"}}}}),
            json!({"contentBlockDelta": {"contentBlockIndex": 1, "delta": {"text": "Sure."}}}),
            json!({"contentBlockStart": {"contentBlockIndex": 2, "start": {"toolUse": {"toolUseId": "tu_1", "name": "calculate"}}}}),
            json!({"contentBlockDelta": {"contentBlockIndex": 2, "delta": {"toolUse": {"input": "{\"expression\":"}}}}),
            json!({"contentBlockDelta": {"contentBlockIndex": 2, "delta": {"toolUse": {"input": "\"1+1\"}"}}}}),
            json!({"messageStop": {"stopReason": "tool_use"}, "metadata": {"usage": {"totalTokens": 9}}}),
        ];

        let mut normalizer = provider.stream_normalizer(&ChatOptions::default());
        let chunks: Vec<_> = events
            .iter()
            .filter_map(|event| normalizer.push(provider.parse_stream_event(event)))
            .collect();

        assert_eq!(chunks[0].metadata["role"], "assistant");
        assert_eq!(chunks[1].reasoning_delta.as_deref(), Some("thinking"));
        assert_eq!(chunks[2].content_delta, "Sure.");

        let last = chunks.last().unwrap();
        assert!(last.is_complete);
        assert_eq!(last.finish_reason.as_deref(), Some("tool_use"));
        assert_eq!(last.metadata["usage"]["totalTokens"], 9);
        assert_eq!(
            last.tool_calls.as_ref().unwrap(),
            &vec![ToolCall::new("tu_1", "calculate", r#"{"expression":"1+1"}"#)]
        );
    }

    #[test]
    fn test_document_conversion() {
        let value = json!({"a": [1, -2, 2.5, "x", true, null], "b": {"c": {}}});
        assert_eq!(document_to_value(&value_to_document(&value)), value);
    }
}
