//! Configuration management for chatroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section has defaults, so an empty file is a valid configuration;
//! credentials are normally supplied through the environment instead of the
//! file (see [`Config::apply_env_overrides`]).

use crate::catalog::{Catalog, ModelCandidate, default_models};
use crate::error::{AppError, AppResult};
use crate::router::{AUTO, DEFAULT_MODEL_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for `routing.model_timeout_ms`
pub const MAX_MODEL_TIMEOUT_MS: u64 = 120_000;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub bytez: BytezConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Model catalog; falls back to the built-in catalog when absent
    #[serde(default = "default_models")]
    pub models: Vec<ModelCandidate>,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            bytez: BytezConfig::default(),
            routing: RoutingConfig::default(),
            models: default_models(),
            chat: ChatConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

/// OpenAI-compatible inference endpoint (GitHub Models by default)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_endpoint")]
    endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl UpstreamConfig {
    /// Base URL; `/chat/completions` is appended per request
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bearer token, if one is configured and non-blank
    pub fn token(&self) -> Option<&str> {
        non_blank(self.token.as_deref())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_upstream_endpoint(),
            token: None,
        }
    }
}

fn default_upstream_endpoint() -> String {
    "https://models.github.ai/inference".to_string()
}

/// Bytez hosted-model service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BytezConfig {
    #[serde(default = "default_bytez_base_url")]
    base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

impl BytezConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }
}

impl Default for BytezConfig {
    fn default() -> Self {
        Self {
            base_url: default_bytez_base_url(),
            api_key: None,
        }
    }
}

fn default_bytez_base_url() -> String {
    "https://api.bytez.com/models/v2".to_string()
}

/// Routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Per-attempt deadline in milliseconds
    #[serde(default = "default_model_timeout_ms")]
    model_timeout_ms: u64,
}

impl RoutingConfig {
    pub fn model_timeout_ms(&self) -> u64 {
        self.model_timeout_ms
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            model_timeout_ms: default_model_timeout_ms(),
        }
    }
}

fn default_model_timeout_ms() -> u64 {
    DEFAULT_MODEL_TIMEOUT_MS
}

/// Chat behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// System message prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Answer clearly and concisely. When images are attached, \
     describe what you see before answering questions about them."
        .to_string()
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Environment overrides are applied between parsing and validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let mut config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config.apply_env_overrides();

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Overlay settings from the process environment
    ///
    /// | variable | setting |
    /// |---|---|
    /// | `AI_API_URL` | `upstream.endpoint` |
    /// | `GITHUB_TOKEN`, then `AI_API_KEY` | `upstream.token` |
    /// | `BYTEZ_KEY` | `bytez.api_key` |
    /// | `AI_SYSTEM_PROMPT` | `chat.system_prompt` |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay settings from an arbitrary variable lookup
    ///
    /// Blank values are ignored so an exported-but-empty variable does not
    /// erase a value from the file.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("AI_API_URL") {
            tracing::debug!(endpoint = %endpoint, "Upstream endpoint overridden from environment");
            self.upstream.endpoint = endpoint;
        }
        if let Some(token) = get("GITHUB_TOKEN").or_else(|| get("AI_API_KEY")) {
            self.upstream.token = Some(token);
        }
        if let Some(key) = get("BYTEZ_KEY") {
            self.bytez.api_key = Some(key);
        }
        if let Some(prompt) = get("AI_SYSTEM_PROMPT") {
            self.chat.system_prompt = prompt;
        }
    }

    /// Per-attempt deadline as a `Duration`
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.routing.model_timeout_ms)
    }

    /// Build the priority-ordered catalog from `[[models]]`
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.models.clone())
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> AppResult<()> {
        if self.models.is_empty() {
            return Err(AppError::Config(
                "Configuration error: [[models]] is empty. At least one model must be \
                configured, or omit [[models]] entirely to use the built-in catalog."
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id().trim().is_empty() {
                return Err(AppError::Config(
                    "Configuration error: a model has an empty id".to_string(),
                ));
            }
            if model.id() == AUTO {
                return Err(AppError::Config(format!(
                    "Configuration error: '{}' is reserved for automatic selection and cannot be \
                    used as a model id",
                    AUTO
                )));
            }
            if !seen.insert(model.id()) {
                return Err(AppError::Config(format!(
                    "Configuration error: duplicate model id '{}'",
                    model.id()
                )));
            }
            if model.display_name().trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Configuration error: model '{}' has an empty display_name",
                    model.id()
                )));
            }
        }

        for (key, url) in [
            ("upstream.endpoint", self.upstream.endpoint()),
            ("bytez.base_url", self.bytez.base_url()),
        ] {
            if !is_http_url(url) {
                return Err(AppError::Config(format!(
                    "Configuration error: {} '{}' must start with 'http://' or 'https://'",
                    key, url
                )));
            }
        }

        let timeout = self.routing.model_timeout_ms;
        if timeout == 0 {
            return Err(AppError::Config(
                "Configuration error: routing.model_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if timeout > MAX_MODEL_TIMEOUT_MS {
            return Err(AppError::Config(format!(
                "Configuration error: routing.model_timeout_ms cannot exceed {}, got {}",
                MAX_MODEL_TIMEOUT_MS, timeout
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    /// Parse and validate without consulting the environment
    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
