//! Configuration for providers and logging
//!
//! Configuration can be loaded from a file (TOML, YAML or JSON), from
//! environment variables, or both: load a file and then apply
//! [`UnillmConfig::merge_with_env`] so the environment takes precedence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, env, fs, path::Path, time::Duration};
use thiserror::Error;
use url::Url;

use crate::llm::providers::retry::RetryConfig;
use crate::utils::logging::LoggingConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable parsing error: {0}")]
    EnvVarParse(String),
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UnillmConfig {
    #[serde(default)]
    pub openai_compatible: OpenAICompatibleConfig,
    #[serde(default)]
    pub bedrock: BedrockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAICompatibleConfig {
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Always normalized to end with `/v1`
    #[serde(default = "default_base_url", deserialize_with = "normalized_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Request timeout in seconds
    #[serde(with = "duration_seconds", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Extra body fields passed through verbatim
    #[serde(default)]
    pub provider_params: HashMap<String, Value>,
    #[serde(skip)]
    pub retry: RetryConfig,
}

impl OpenAICompatibleConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            model: default_openai_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            timeout: default_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: None,
            seed: None,
            provider_params: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// AWS Bedrock Converse configuration
///
/// Credentials resolve in order: explicit access key, named profile, then
/// the default AWS chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BedrockConfig {
    #[serde(default = "default_bedrock_model")]
    pub model_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default = "default_reasoning_budget")]
    pub reasoning_budget_tokens: u32,
    /// Model-specific fields such as `top_k`
    #[serde(default)]
    pub additional_model_request_fields: HashMap<String, Value>,
}

impl BedrockConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: default_bedrock_model(),
            region: default_region(),
            profile_name: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop_sequences: None,
            reasoning_budget_tokens: default_reasoning_budget(),
            additional_model_request_fields: HashMap::new(),
        }
    }
}

impl UnillmConfig {
    /// Load configuration from a file (supports TOML, YAML, JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            _ => Err(ConfigError::FileParse(
                "Unsupported file format. Use .toml, .yaml, .yml, or .json".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_with_env()
    }

    /// Apply environment variable overrides (environment takes precedence)
    pub fn merge_with_env(mut self) -> Result<Self, ConfigError> {
        let openai = &mut self.openai_compatible;
        if let Ok(base_url) = env::var("OPENAI_LIKE_BASE_URL") {
            openai.base_url = normalize_base_url(&base_url);
        }
        if let Ok(api_key) = env::var("OPENAI_LIKE_API_KEY") {
            openai.api_key = api_key;
        }
        if let Ok(model) = env::var("OPENAI_LIKE_MODEL") {
            openai.model = model;
        }
        if let Some(secs) = parse_env::<u64>("OPENAI_LIKE_TIMEOUT")? {
            openai.timeout = Duration::from_secs(secs);
        }

        if let Ok(region) = env::var("AWS_REGION") {
            self.bedrock.region = region;
        }
        if let Ok(profile) = env::var("AWS_PROFILE") {
            self.bedrock.profile_name = Some(profile);
        }
        if let Ok(model_id) = env::var("BEDROCK_MODEL_ID") {
            self.bedrock.model_id = model_id;
        }

        if let Some(temperature) = parse_env::<f64>("UNILLM_TEMPERATURE")? {
            self.openai_compatible.temperature = temperature;
            self.bedrock.temperature = Some(temperature);
        }
        if let Some(max_tokens) = parse_env::<u32>("UNILLM_MAX_TOKENS")? {
            self.openai_compatible.max_tokens = max_tokens;
            self.bedrock.max_tokens = Some(max_tokens);
        }

        self.logging = self.logging.merge_with_env()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let openai = &self.openai_compatible;
        if openai.model.is_empty() {
            return Err(ConfigError::Validation(
                "OpenAI-compatible model cannot be empty".to_string(),
            ));
        }
        match Url::parse(&openai.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ConfigError::Validation(format!(
                    "Base URL must use http or https, got '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "Invalid base URL '{}': {}",
                    openai.base_url, e
                )))
            }
        }
        if openai.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        check_temperature(openai.temperature)?;
        if openai.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "Max tokens must be greater than 0".to_string(),
            ));
        }

        if self.bedrock.model_id.is_empty() {
            return Err(ConfigError::Validation(
                "Bedrock model ID cannot be empty".to_string(),
            ));
        }
        if self.bedrock.region.is_empty() {
            return Err(ConfigError::Validation(
                "AWS region cannot be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.bedrock.temperature {
            check_temperature(temperature)?;
        }
        if self.bedrock.access_key_id.is_some() && self.bedrock.secret_access_key.is_none() {
            return Err(ConfigError::Validation(
                "secret_access_key is required when access_key_id is set".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_temperature(temperature: f64) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(
            "Temperature must be between 0.0 and 2.0".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::EnvVarParse(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Strip trailing slashes and make sure the URL ends with `/v1`
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

fn normalized_url<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_base_url(&raw))
}

/// Custom serialization for Duration as seconds
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Default value functions for serde
fn default_openai_model() -> String {
    "local-model".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_api_key() -> String {
    "dummy-key".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_bedrock_model() -> String {
    "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_reasoning_budget() -> u32 {
    2000
}
