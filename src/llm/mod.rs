mod ollama;
mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Who authored a turn in the conversation sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// Anyone other than the persona being voiced
    User,
    /// The persona's own earlier lines
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Request to generate a single chat reply
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Persona instructions
    pub system_prompt: String,
    /// Conversation so far, oldest first
    pub messages: Vec<PromptMessage>,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: Option<u32>,
    /// Timeout for the request
    pub timeout: Duration,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Metadata about the LLM response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openai", "ollama")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate one reply for the given conversation
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// Ollama base URL (only used when no OpenAI key is set)
    pub ollama_base_url: Option<String>,
    /// Ollama model to use
    pub ollama_model: String,
    /// Default timeout for LLM requests
    pub default_timeout: Duration,
    /// Default max tokens for responses
    pub default_max_tokens: u32,
    /// How many recent chat lines are sent along with a request
    pub history_limit: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: None,
            ollama_model: "llama3.2".to_string(),
            default_timeout: Duration::from_secs(20),
            default_max_tokens: 80,
            history_limit: 30,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_model: non_empty_env("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            ollama_base_url: non_empty_env("OLLAMA_BASE_URL"),
            ollama_model: non_empty_env("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            default_timeout: std::env::var("LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            default_max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_max_tokens),
            history_limit: std::env::var("LLM_HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_limit),
        }
    }

    /// Build the configured provider. OpenAI wins when both are configured.
    pub fn build_provider(&self) -> LlmResult<Arc<dyn LlmProvider>> {
        if let Some(api_key) = &self.openai_api_key {
            return Ok(Arc::new(OpenAiProvider::new(
                api_key.clone(),
                self.openai_model.clone(),
            )));
        }

        if let Some(base_url) = &self.ollama_base_url {
            return Ok(Arc::new(OllamaProvider::new(
                base_url.clone(),
                self.ollama_model.clone(),
            )?));
        }

        Err(LlmError::ConfigError(
            "No LLM provider configured. Set OPENAI_API_KEY or OLLAMA_BASE_URL".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.ollama_model, "llama3.2");
        assert!(config.ollama_base_url.is_none());
        assert_eq!(config.default_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_build_provider_without_credentials_fails() {
        let config = LlmConfig::default();
        let err = config.build_provider().err().expect("should fail");
        assert!(matches!(err, LlmError::ConfigError(_)));
    }

    #[test]
    fn test_build_provider_prefers_openai() {
        let config = LlmConfig {
            openai_api_key: Some("sk-test".to_string()),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ..LlmConfig::default()
        };
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_blank_values() {
        std::env::set_var("OPENAI_API_KEY", "   ");
        std::env::set_var("LLM_MAX_TOKENS", "64");
        let config = LlmConfig::from_env();
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("LLM_MAX_TOKENS");

        assert!(config.openai_api_key.is_none());
        assert_eq!(config.default_max_tokens, 64);
    }
}
