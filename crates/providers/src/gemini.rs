//! Gemini native provider implementation.
//!
//! Uses the Generative Language REST API (`models/{model}:generateContent`)
//! directly rather than an OpenAI-compatible proxy.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - Assistant turns mapped to the `model` role
//! - Blocked prompts surfaced as errors with the block reason

use async_trait::async_trait;
use itzai_core::error::ProviderError;
use itzai_core::message::{Message, Role};
use itzai_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model for new configurations.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(request: &ProviderRequest) -> GenerateContentRequest {
        let contents = request
            .messages
            .iter()
            .map(|msg| Content {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }
                .into(),
                parts: vec![Part {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn into_response(
        api_response: GenerateContentResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ProviderError::EmptyResponse(format!(
                "prompt blocked by safety filters ({reason})"
            )));
        }

        let text: String = api_response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(
                "no candidate text in response".into(),
            ));
        }

        let usage = api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage,
            model: api_response
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }

}

#[async_trait]
impl itzai_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_request(&request);

        debug!(provider = %self.name, model = %request.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = http::retry_after(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(http::status_error(status, &error_body, &request.model, retry_after));
        }

        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        Self::into_response(api_response, &request.model)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(http::send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use itzai_core::Provider;

    #[test]
    fn constructor_defaults() {
        let provider = GeminiProvider::new("AIza-test");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url.contains("generativelanguage.googleapis.com"));
    }

    #[test]
    fn custom_base_url_trimmed() {
        let provider = GeminiProvider::new("k").with_base_url("http://localhost:9000/v1beta/");
        assert_eq!(provider.base_url, "http://localhost:9000/v1beta");
    }

    #[test]
    fn request_maps_assistant_to_model_role() {
        let mut request = ProviderRequest::single(DEFAULT_GEMINI_MODEL, "What is the diagnosis?");
        request.messages.push(Message::assistant("Migraine."));
        request.max_tokens = Some(1024);

        let body = GeminiProvider::build_request(&request);
        assert_eq!(body.contents.len(), 2);
        assert_eq!(body.contents[0].role, "user");
        assert_eq!(body.contents[1].role, "model");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "What is the diagnosis?");
    }

    #[test]
    fn request_without_max_tokens_omits_limit() {
        let request = ProviderRequest::single(DEFAULT_GEMINI_MODEL, "prompt");
        let json = serde_json::to_value(GeminiProvider::build_request(&request)).unwrap();
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn parse_candidate_text() {
        let data = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "**RECORD"}, {"text": " | ItzAI**"}]
                }
            }],
            "usageMetadata": {
                "promptTokenCount": 1200,
                "candidatesTokenCount": 80,
                "totalTokenCount": 1280
            },
            "modelVersion": "gemini-2.0-flash-exp"
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(data).unwrap();
        let response = GeminiProvider::into_response(parsed, DEFAULT_GEMINI_MODEL).unwrap();
        assert_eq!(response.message.content, "**RECORD | ItzAI**");
        assert_eq!(response.usage.unwrap().total_tokens, 1280);
        assert_eq!(response.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn blocked_prompt_is_error() {
        let data = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(data).unwrap();
        let err = GeminiProvider::into_response(parsed, DEFAULT_GEMINI_MODEL).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn missing_candidates_is_error() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            GeminiProvider::into_response(parsed, DEFAULT_GEMINI_MODEL),
            Err(ProviderError::EmptyResponse(_))
        ));
    }
}
