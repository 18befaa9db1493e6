//! Configuration loading, validation, and management for ItzAI.
//!
//! Loads configuration from `~/.itzai/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default per-document character budget for prompt assembly.
pub const DEFAULT_CHAR_BUDGET: usize = 15_000;

/// Environment variables consulted for an API key, highest priority first.
const API_KEY_VARS: [&str; 4] = [
    "ITZAI_API_KEY",
    "GEMINI_API_KEY",
    "OPENROUTER_API_KEY",
    "OPENAI_API_KEY",
];

/// The root configuration structure.
///
/// Maps directly to `~/.itzai/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per answer
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Document locations and truncation budget
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Prompt presentation settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model forced by `ITZAI_MODEL`; never read from or written to the file
    #[serde(skip)]
    pub model_override: Option<String>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash-exp".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("documents", &self.documents)
            .field("prompt", &self.prompt)
            .field("providers", &self.providers)
            .field("model_override", &self.model_override)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Where the clinical documents live and how much of each reaches the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Clinical history loaded at startup (relative paths resolve against the
    /// working directory)
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Optional treatment protocol loaded at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<PathBuf>,

    /// Whether the protocol is included in prompts by default
    #[serde(default)]
    pub include_protocol: bool,

    /// Maximum characters taken from each document
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,
}

fn default_history_path() -> PathBuf {
    PathBuf::from("HC.pdf")
}
fn default_char_budget() -> usize {
    DEFAULT_CHAR_BUDGET
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            protocol_path: None,
            include_protocol: false,
            char_budget: default_char_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Name printed in the report header
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// How many characters of the question are echoed in the report header
    #[serde(default = "default_query_preview_chars")]
    pub query_preview_chars: usize,
}

fn default_assistant_name() -> String {
    "ItzAI".into()
}
fn default_query_preview_chars() -> usize {
    100
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            query_preview_chars: default_query_preview_chars(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.itzai/config.toml),
    /// then apply environment overrides (see [`AppConfig::apply_env`]).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `var`.
    ///
    /// When the file sets no `api_key`, the first of `ITZAI_API_KEY`,
    /// `GEMINI_API_KEY`, `OPENROUTER_API_KEY` and `OPENAI_API_KEY` is used.
    /// `ITZAI_PROVIDER` replaces `default_provider`. `ITZAI_MODEL` becomes
    /// the model for every query, ahead of any per-provider model.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = API_KEY_VARS.iter().find_map(|key| var(*key));
        }

        if let Some(provider) = var("ITZAI_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("ITZAI_MODEL") {
            tracing::debug!(%model, "Model overridden from environment");
            self.model_override = Some(model);
        }
    }

    /// The model queries are sent to.
    ///
    /// `ITZAI_MODEL` wins, then `[providers.<default_provider>].default_model`,
    /// then the top-level `default_model`.
    pub fn effective_model(&self) -> &str {
        self.model_override
            .as_deref()
            .or_else(|| {
                self.providers
                    .get(&self.default_provider)
                    .and_then(|p| p.default_model.as_deref())
            })
            .unwrap_or(&self.default_model)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".itzai")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.documents.char_budget == 0 {
            return Err(ConfigError::ValidationError(
                "documents.char_budget must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            documents: DocumentsConfig::default(),
            prompt: PromptConfig::default(),
            providers: HashMap::new(),
            model_override: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
