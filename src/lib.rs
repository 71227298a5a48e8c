//! Talk to OpenAI-compatible endpoints and AWS Bedrock through one API.
//!
//! unillm converts a unified message model into each backend's wire format
//! and converts the answers back. Tool calls come back in one canonical
//! `{id, name, arguments}` shape, reasoning ("thinking") text is separated from
//! the final answer, and streams are normalized into [`ChatStreamChunk`]s.
//!
//! # Quick Start
//!
//! ```no_run
//! use unillm::config::OpenAICompatibleConfig;
//! use unillm::tools::builtin::calculate;
//! use unillm::{ChatOptions, Message, Provider, ToolExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tools = vec![calculate()];
//!     let provider = Provider::openai_compatible(
//!         OpenAICompatibleConfig::new("qwen2.5-7b-instruct"),
//!         &tools,
//!     )?;
//!
//!     let mut messages = vec![Message::user("What is 25 * 4 + 10?")];
//!     let response = provider.chat(&messages, &ChatOptions::default()).await?;
//!
//!     // Tool calls are returned as data; running them is up to the caller
//!     if let Some(calls) = &response.tool_calls {
//!         let executor = ToolExecutor::new(tools.clone())?;
//!         messages.push(response.to_message());
//!         messages.extend(executor.execute_all(calls));
//!         let answer = provider.chat(&messages, &ChatOptions::default()).await?;
//!         println!("{}", answer.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Defining tools
//!
//! ```no_run
//! use unillm::tool;
//! use unillm::tools::Tool;
//!
//! #[tool]
//! /// Get the current weather for a city
//! fn get_weather(
//!     /// City name
//!     location: String,
//!     /// "celsius" or "fahrenheit"
//!     unit: Option<String>,
//! ) -> Result<String, String> {
//!     Ok(format!("Sunny in {} ({})", location, unit.unwrap_or_else(|| "celsius".into())))
//! }
//!
//! let tool = get_weather();
//! assert_eq!(tool.name(), "get_weather");
//! ```
//!
//! # Key modules
//!
//! - [`llm`] - the [`LlmProvider`] trait, providers, reasoning extraction and
//!   stream normalization
//! - [`tools`] - the [`tools::Tool`] trait, schema extraction and the executor
//! - [`types`] - messages, content blocks and tool calls
//! - [`config`] - file and environment configuration
//! - [`utils::logging`] - `tracing` subscriber setup

extern crate self as unillm;

pub mod config;
pub mod error;
pub mod llm;
pub mod tools;
pub mod types;
pub mod utils;

pub use error::{Result, UnillmError};
pub use llm::{
    ChatOptions, ChatResponse, ChatStreamChunk, HealthStatus, LlmProvider, Provider, ProviderType,
};
pub use tools::ToolExecutor;
pub use types::*;

pub use unillm_macros::tool;

// Path used by `#[tool]` expansions
#[doc(hidden)]
pub use serde_json as __serde_json;
