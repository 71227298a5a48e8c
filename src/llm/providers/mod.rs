//! Provider implementations.
//!
//! - `openai_compatible` - any endpoint speaking the OpenAI chat-completions
//!   protocol (vLLM, LM Studio, Ollama, hosted gateways)
//! - `bedrock` - AWS Bedrock through the Converse API
//!
//! [`Provider`] wraps the closed set of backends behind one value.

pub mod bedrock;
pub mod openai_compatible;
pub mod retry;

pub use bedrock::BedrockProvider;
pub use openai_compatible::OpenAICompatibleProvider;
pub use retry::RetryConfig;

use futures::stream::BoxStream;
use std::sync::Arc;

use super::traits::{ChatOptions, ChatResponse, ChatStreamChunk, HealthStatus, LlmProvider, ProviderType};
use crate::config::{BedrockConfig, OpenAICompatibleConfig};
use crate::error::Result;
use crate::tools::Tool;
use crate::types::Message;

/// A configured backend
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAICompatible(OpenAICompatibleProvider),
    Bedrock(BedrockProvider),
}

impl Provider {
    /// OpenAI-compatible provider; `tools` only feed the advertised schemas
    pub fn openai_compatible(
        config: OpenAICompatibleConfig,
        tools: &[Arc<dyn Tool>],
    ) -> Result<Self> {
        OpenAICompatibleProvider::new(config, tools).map(Self::OpenAICompatible)
    }

    /// Bedrock provider with a client resolved from `config`
    pub async fn bedrock(config: BedrockConfig, tools: &[Arc<dyn Tool>]) -> Result<Self> {
        BedrockProvider::new(config, tools).await.map(Self::Bedrock)
    }

    pub fn as_provider(&self) -> &dyn LlmProvider {
        match self {
            Self::OpenAICompatible(provider) => provider,
            Self::Bedrock(provider) => provider,
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.as_provider().provider_type()
    }

    pub async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        self.as_provider().chat(messages, options).await
    }

    pub async fn chat_stream<'a>(
        &'a self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'a, Result<ChatStreamChunk>>> {
        self.as_provider().chat_stream(messages, options).await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.as_provider().health_check().await
    }
}

impl From<OpenAICompatibleProvider> for Provider {
    fn from(provider: OpenAICompatibleProvider) -> Self {
        Self::OpenAICompatible(provider)
    }
}

impl From<BedrockProvider> for Provider {
    fn from(provider: BedrockProvider) -> Self {
        Self::Bedrock(provider)
    }
}
