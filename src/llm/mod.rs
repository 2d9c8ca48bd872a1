//! LLM providers and client
//!
//! Provides a unified interface to the OpenAI-compatible providers used
//! for test generation (`OpenRouter`, Groq, `OpenAI`).

/// Implementations of specific LLM providers
pub mod providers;

use crate::config::{Settings, GROQ_MODEL, OPENAI_MODEL, OPENROUTER_MODEL};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Interface for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a single chat completion
    async fn chat_completion(
        &self,
        system_prompt: &str,
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Unified client wrapping the first configured provider.
///
/// Provider priority is openrouter, then groq, then openai.
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
    provider_name: &'static str,
    model_id: &'static str,
    max_tokens: u32,
}

impl LlmClient {
    /// Create a new LLM client from settings
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingConfig` if no provider API key is configured.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        if let Some(key) = &settings.openrouter_api_key {
            return Ok(Self {
                provider: Box::new(providers::OpenRouterProvider::new(key.clone())),
                provider_name: "openrouter",
                model_id: OPENROUTER_MODEL.id,
                max_tokens: OPENROUTER_MODEL.max_tokens,
            });
        }
        if let Some(key) = &settings.groq_api_key {
            return Ok(Self {
                provider: Box::new(providers::GroqProvider::new(key.clone())),
                provider_name: "groq",
                model_id: GROQ_MODEL.id,
                max_tokens: GROQ_MODEL.max_tokens,
            });
        }
        if let Some(key) = &settings.openai_api_key {
            return Ok(Self {
                provider: Box::new(providers::OpenAiProvider::new(key.clone())),
                provider_name: "openai",
                model_id: OPENAI_MODEL.id,
                max_tokens: OPENAI_MODEL.max_tokens,
            });
        }
        Err(LlmError::MissingConfig(
            "no LLM provider API key configured".to_string(),
        ))
    }

    /// Wrap an arbitrary provider (used by tests to inject mocks)
    #[must_use]
    pub fn with_provider(provider: Box<dyn LlmProvider>, model_id: &'static str) -> Self {
        Self {
            provider,
            provider_name: "custom",
            model_id,
            max_tokens: 8192,
        }
    }

    /// Name of the active provider
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        self.provider_name
    }

    /// Model identifier the client sends requests to
    #[must_use]
    pub const fn model_id(&self) -> &'static str {
        self.model_id
    }

    /// Perform a chat completion request against the active provider
    ///
    /// # Errors
    ///
    /// Returns any error from the provider.
    #[instrument(skip(self, system_prompt, user_message))]
    pub async fn chat_completion(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        debug!(
            provider = self.provider_name,
            model = self.model_id,
            "Sending request to LLM"
        );

        let start = std::time::Instant::now();
        let result = self
            .provider
            .chat_completion(system_prompt, user_message, self.model_id, self.max_tokens)
            .await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => debug!(
                provider = self.provider_name,
                duration_ms = duration.as_millis(),
                "Received success response from LLM"
            ),
            Err(e) => warn!(
                provider = self.provider_name,
                duration_ms = duration.as_millis(),
                error = %e,
                "Received error response from LLM"
            ),
        }

        result
    }
}
