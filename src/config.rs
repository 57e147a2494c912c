//! Provider configuration helpers and the LLM configuration surface.
//!
//! `Provider` and its env-var resolution helpers resolve default base URLs
//! and model names for fields of [`LlmConfig`] the caller left unset.

use std::env;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Supported local/OpenAI-compatible providers, used to resolve default
/// base URLs and model names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
        }
    }
}

/// Get the base URL for API requests. Priority: `OPEN_AGENT_BASE_URL` env var
/// > provider default > `fallback`.
pub fn get_base_url(provider: Option<Provider>, fallback: Option<&str>) -> String {
    if let Ok(url) = env::var("OPEN_AGENT_BASE_URL") {
        if !url.is_empty() {
            return url;
        }
    }
    if let Some(p) = provider {
        return p.default_base_url().to_string();
    }
    fallback.unwrap_or("http://localhost:1234/v1").to_string()
}

/// Get the model name for requests. When `prefer_env` is true, an
/// `OPEN_AGENT_MODEL` env var overrides `fallback`.
pub fn get_model(fallback: &str, prefer_env: bool) -> String {
    if prefer_env {
        if let Ok(model) = env::var("OPEN_AGENT_MODEL") {
            if !model.is_empty() {
                return model;
            }
        }
    }
    fallback.to_string()
}

/// Reasoning effort hint sent on the responses path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
    None,
}

/// The full LLM configuration surface consumed by the adapter.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: Option<String>,

    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub seed: Option<u64>,
    pub max_output_tokens: Option<u32>,
    pub max_input_tokens: Option<u32>,

    pub retry: RetryPolicy,

    pub native_tool_calling: bool,
    pub disable_vision: bool,
    pub caching_prompt: bool,
    pub reasoning_effort: ReasoningEffort,
    pub enable_encrypted_reasoning: bool,

    pub log_completions: bool,
    pub log_completions_folder: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "unset".to_string(),
            api_key: None,
            base_url: get_base_url(Some(Provider::LMStudio), None),
            api_version: None,
            temperature: 0.0,
            top_p: None,
            top_k: None,
            seed: None,
            max_output_tokens: None,
            max_input_tokens: None,
            retry: RetryPolicy::default(),
            native_tool_calling: true,
            disable_vision: false,
            caching_prompt: false,
            reasoning_effort: ReasoningEffort::None,
            enable_encrypted_reasoning: false,
            log_completions: false,
            log_completions_folder: None,
        }
    }
}

/// Builder for [`LlmConfig`], validating required fields at `build()`.
#[derive(Debug, Clone, Default)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
    model_set: bool,
    base_url_set: bool,
}

impl LlmConfigBuilder {
    pub fn new() -> Self {
        Self { config: LlmConfig::default(), model_set: false, base_url_set: false }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self.model_set = true;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self.base_url_set = true;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.config.reasoning_effort = effort;
        self
    }

    pub fn enable_encrypted_reasoning(mut self, enabled: bool) -> Self {
        self.config.enable_encrypted_reasoning = enabled;
        self
    }

    pub fn caching_prompt(mut self, enabled: bool) -> Self {
        self.config.caching_prompt = enabled;
        self
    }

    pub fn build(self) -> Result<LlmConfig> {
        if !self.model_set || self.config.model.is_empty() {
            return Err(Error::config("model is required"));
        }
        if !self.base_url_set || self.config.base_url.is_empty() {
            return Err(Error::config("base_url is required"));
        }
        if !(0.0..=2.0).contains(&self.config.temperature) {
            return Err(Error::config("temperature must be between 0.0 and 2.0"));
        }
        Ok(self.config)
    }
}

impl LlmConfig {
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder::new()
    }
}
