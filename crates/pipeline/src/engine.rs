//! Query execution against the configured completion provider.

use itzai_config::AppConfig;
use itzai_core::error::QueryError;
use itzai_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sends an assembled prompt to a provider and returns the answer text.
///
/// Exactly one attempt per call. There is no retry or fallback: a failure is
/// reported to the user, who decides whether to ask again.
pub struct QueryEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl QueryEngine {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Build an engine using the model settings in `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.effective_model())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submit `prompt` and return the provider's answer.
    pub async fn submit(&self, prompt: &str) -> Result<String, QueryError> {
        let mut request = ProviderRequest::single(self.model.as_str(), prompt);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Submitting query"
        );

        let start = Instant::now();
        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(provider = %self.provider.name(), error = %e, "Query failed");
            QueryError::from(e)
        })?;

        let answer = response.message.content;
        if answer.trim().is_empty() {
            warn!(provider = %self.provider.name(), "Provider returned an empty answer");
            return Err(QueryError::new("provider returned an empty answer"));
        }

        info!(
            provider = %self.provider.name(),
            model = %response.model,
            tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            duration_ms = start.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(answer)
    }
}
