//! Provider abstraction and the normalization pipeline shared by all providers.
//!
//! ```text
//! Provider → LlmProvider (OpenAICompatible | Bedrock)
//!   ↓            ↓
//! chat      prepare_request → execute → parse_response
//!                                        ├─ standardize (tool calls)
//!                                        └─ reasoning   (native field or tags)
//! chat_stream  execute_stream → parse_stream_event → StreamNormalizer
//! ```
//!
//! # Key Types
//!
//! - [`LlmProvider`] - capability trait every backend implements
//! - [`Provider`] - closed set of configured backends
//! - [`StreamNormalizer`] - per-call stream state machine
//! - [`ChatResponse`] / [`ChatStreamChunk`] - unified output

pub mod providers;
pub mod reasoning;
pub mod standardize;
pub mod streaming;
pub mod traits;

pub use providers::{BedrockProvider, OpenAICompatibleProvider, Provider, RetryConfig};
pub use reasoning::{extract_reasoning, ExtractionMethod, ReasoningExtraction};
pub use standardize::{standardize_tool_call, standardize_tool_calls};
pub use streaming::{StreamDelta, StreamMode, StreamNormalizer, StreamState, ToolCallDelta};
pub use traits::{
    ChatOptions, ChatResponse, ChatStreamChunk, HealthStatus, LlmProvider, ProviderType,
};
