//! Error handling for the unillm library
//!
//! Every fallible public operation returns [`UnillmError`]. Lower layers keep
//! their own error enums ([`crate::tools::ToolError`], [`crate::config::ConfigError`])
//! and convert into this one with `From`.
//!
//! # Error Categories
//!
//! - **Validation** - malformed messages, unusable tools, incomplete tool calls
//! - **Tool execution** - a registered tool failed or rejected its arguments
//! - **Provider** - the remote API or its transport failed
//! - **Network** - the request never produced an HTTP response
//! - **Configuration** - invalid or unreadable settings
//! - **Serialization** - JSON encoding or decoding failed
//!
//! ```rust
//! use unillm::error::UnillmError;
//!
//! let error = UnillmError::provider_error("openai_like", "rate limited", Some(429));
//! assert!(error.is_retryable());
//! assert!(!error.is_user_error());
//! ```

use thiserror::Error;

/// Main error type for the unillm library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnillmError {
    /// Malformed input to the core (bad message structure, unusable tool, missing fields)
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// A registered tool failed or its arguments could not be bound
    #[error("Tool execution error in '{tool_name}': {message}")]
    ToolExecutionError { tool_name: String, message: String },

    /// The provider API or its transport failed
    #[error("{provider} provider error: {message}")]
    ProviderError {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The request could not reach the provider
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// Configuration errors (settings, credentials, environment)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl UnillmError {
    /// Create a ValidationError
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Create a ToolExecutionError
    pub fn tool_execution_error(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecutionError {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create a ProviderError
    pub fn provider_error(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Create a NetworkError
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create a ConfigurationError
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// HTTP status reported by the provider, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UnillmError::ProviderError { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            UnillmError::NetworkError { .. } => true,
            UnillmError::ProviderError { status_code, .. } => {
                matches!(status_code, Some(429 | 500 | 502 | 503 | 504))
            }
            _ => false,
        }
    }

    /// Check if this error is due to caller input
    pub fn is_user_error(&self) -> bool {
        matches!(self, UnillmError::ValidationError { .. })
    }
}

impl From<serde_json::Error> for UnillmError {
    fn from(error: serde_json::Error) -> Self {
        UnillmError::serialization_error(error.to_string())
    }
}

impl From<crate::tools::ToolError> for UnillmError {
    fn from(error: crate::tools::ToolError) -> Self {
        UnillmError::ToolExecutionError {
            tool_name: error.tool_name().unwrap_or("unknown").to_string(),
            message: error.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for UnillmError {
    fn from(error: crate::config::ConfigError) -> Self {
        UnillmError::configuration_error(error.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, UnillmError>;
