//! Provider selection from configuration.

use itzai_config::{AppConfig, ProviderConfig};
use itzai_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Well-known OpenAI-compatible endpoints, used when no `api_url` is set.
const KNOWN_ENDPOINTS: &[(&str, &str)] = &[
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("openai", "https://api.openai.com/v1"),
    ("ollama", "http://localhost:11434/v1"),
    ("deepseek", "https://api.deepseek.com/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("together", "https://api.together.xyz/v1"),
    ("vllm", "http://localhost:8000/v1"),
    ("llamacpp", "http://localhost:8080/v1"),
];

/// Named providers plus the one a query cycle should use.
pub struct ProviderRouter {
    default_name: String,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
            providers: HashMap::new(),
        }
    }

    /// Register `provider` under its own name, replacing any previous entry.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// The provider named by `default_provider`.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.get(&self.default_name)
    }
}

/// Build a router holding every `[providers.*]` entry plus the default provider.
///
/// The default provider is always present, falling back to the top-level
/// `api_key` and the endpoint's well-known URL when it has no table of its own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, settings) in &config.providers {
        router.register(build_provider(name, config, Some(settings)));
    }

    if router.get(&config.default_provider).is_none() {
        router.register(build_provider(&config.default_provider, config, None));
    }

    router
}

fn build_provider(
    name: &str,
    config: &AppConfig,
    settings: Option<&ProviderConfig>,
) -> Arc<dyn Provider> {
    let api_key = settings
        .and_then(|s| s.api_key.as_deref())
        .or(config.api_key.as_deref())
        .unwrap_or_default();
    let api_url = settings.and_then(|s| s.api_url.as_deref());

    if name == "gemini" {
        let provider = GeminiProvider::new(api_key);
        return match api_url {
            Some(url) => Arc::new(provider.with_base_url(url)),
            None => Arc::new(provider),
        };
    }

    let base_url = api_url.map_or_else(|| default_base_url(name), String::from);
    Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
}

fn default_base_url(name: &str) -> String {
    KNOWN_ENDPOINTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, url)| url.to_string())
        .unwrap_or_else(|| format!("https://{name}.api.example.com/v1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_keys_by_provider_name() {
        let mut router = ProviderRouter::new("vllm");
        assert!(router.default().is_none());

        router.register(Arc::new(OpenAiCompatProvider::new("vllm", "http://h/v1", "k")));
        assert!(router.get("vllm").is_some());
        assert!(router.get("nonexistent").is_none());
        assert_eq!(router.default().unwrap().name(), "vllm");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
        assert_eq!(default_base_url("acme"), "https://acme.api.example.com/v1");
    }

    #[test]
    fn build_from_default_config_uses_gemini() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or".into()),
                api_url: None,
                default_model: None,
            },
        );

        let router = build_from_config(&config);
        assert_eq!(router.get("openrouter").unwrap().name(), "openrouter");
        assert_eq!(router.default().unwrap().name(), "ollama");
        assert!(router.get("gemini").is_none());
    }
}
