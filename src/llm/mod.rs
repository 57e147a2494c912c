//! Dual-path LLM invocation layer: wraps a provider behind one `LLMResponse`
//! shape, centralizing retry, telemetry, prompt-cache hints, and model
//! feature detection.

pub mod features;
pub mod messages;
pub mod responses;

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::llm::features::Feature;
use crate::llm::messages::ChatMessage;
use crate::llm::responses::{ResponsesApiResponse, ResponsesInputItem, ResponsesOutputItem};
use crate::metrics::{Metrics, Usage};
use crate::retry::with_retry;

/// Temperature substituted for a configured `0.0` on the attempt right
/// after a rate-limit rejection.
const TEMPERATURE_ZERO_NUDGE: f64 = 0.1;

/// A tool call the Agent must turn into an `ActionEvent`, normalized across
/// both invocation paths.
#[derive(Debug, Clone)]
pub struct ActionDraft {
    pub tool_name: String,
    pub arguments: String,
    pub call_id: String,
    pub reasoning_summary: Option<String>,
    pub encrypted_reasoning: Option<String>,
}

/// The uniform result of one LLM invocation, regardless of path.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Terminal assistant text, present only when no tool calls were produced.
    pub message: Option<String>,
    pub actions: Vec<ActionDraft>,
    pub metrics: Metrics,
    pub raw: Value,
    /// The responses-path id to resume from on the next turn, if applicable.
    pub continuation_handle: Option<String>,
}

impl LlmResponse {
    pub fn is_terminal(&self) -> bool {
        self.actions.is_empty()
    }
}

// ============================================================================
// Completions-path wire response shapes
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatToolCallRaw {
    pub id: String,
    pub function: ChatToolCallFunctionRaw,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatToolCallFunctionRaw {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCallRaw>>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub prompt_cache_hit_tokens: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: ChatUsage,
}

/// The third-party model-invocation boundary: two entry points, one per
/// path, both transport-only (no retry/telemetry — that lives in
/// `LlmAdapter`).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call_completions(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
        opts: &LlmConfig,
    ) -> Result<ChatCompletionResponse>;

    async fn call_responses(
        &self,
        instructions: &str,
        input: &[ResponsesInputItem],
        tools: &[Value],
        opts: &LlmConfig,
        previous_response_id: Option<&str>,
    ) -> Result<ResponsesApiResponse>;
}

/// Wraps an `LlmProvider` with retry, telemetry, prompt-cache hints, and
/// feature detection. Holds no per-conversation state except cumulative
/// metrics, so it is safe to share across conversations via a registry.
pub struct LlmAdapter<P> {
    provider: P,
    config: LlmConfig,
    metrics: Mutex<Metrics>,
}

impl<P: LlmProvider> LlmAdapter<P> {
    pub fn new(provider: P, config: LlmConfig) -> Self {
        Self { provider, config, metrics: Mutex::new(Metrics::new()) }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn metrics_snapshot(&self) -> Metrics {
        self.metrics.lock().expect("metrics mutex poisoned").snapshot()
    }

    pub fn supports(&self, feature: Feature) -> bool {
        features::capabilities_for(&self.config.model).supports(feature)
    }

    /// Config to use for a given retry attempt. Some providers
    /// deterministically re-emit empty responses when repeatedly queried at
    /// `temperature == 0.0` under rate limiting; nudging it up slightly on
    /// the attempt immediately following a rate-limit rejection works
    /// around that without changing the caller's configured temperature for
    /// any other attempt.
    fn config_for_attempt(&self, previous_attempt_was_rate_limited: bool) -> LlmConfig {
        if previous_attempt_was_rate_limited && self.config.temperature == 0.0 {
            let mut opts = self.config.clone();
            opts.temperature = TEMPERATURE_ZERO_NUDGE;
            opts
        } else {
            self.config.clone()
        }
    }

    /// Best-effort token count: ~4 characters per token, used as a fallback
    /// when no model-matched tokenizer is wired.
    pub fn count_tokens(&self, messages: &[ChatMessage]) -> u64 {
        let chars: usize = messages
            .iter()
            .map(|m| match &m.content {
                crate::types::OpenAIContent::Text(t) => t.len(),
                crate::types::OpenAIContent::Parts(parts) => parts
                    .iter()
                    .map(|p| match p {
                        crate::types::OpenAIContentPart::Text { text } => text.len(),
                        crate::types::OpenAIContentPart::ImageUrl { .. } => 0,
                    })
                    .sum(),
            })
            .sum();
        (chars as u64 / 4).max(1)
    }

    /// Insert provider cache markers on the system prompt and the most
    /// recent user message, for providers that support cache control.
    /// Centralized here so no per-path call site can misapply it.
    fn apply_cache_hints(&self, messages: &mut [ChatMessage]) {
        if !self.config.caching_prompt || !self.supports(Feature::PromptCache) {
            return;
        }
        let marker = serde_json::json!({"type": "ephemeral"});
        if let Some(system_msg) = messages.iter_mut().find(|m| m.role == "system") {
            system_msg.cache_control = Some(marker.clone());
        }
        if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == "user") {
            last_user.cache_control = Some(marker);
        }
    }

    /// Chat-completions invocation, wrapped in retry + telemetry.
    pub async fn completion(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LlmResponse> {
        let mut messages = messages.to_vec();
        self.apply_cache_hints(&mut messages);

        let start = Instant::now();
        let mut call_metrics = Metrics::new();
        let response = with_retry(&self.config.retry, &mut call_metrics, |_attempt, rate_limited| {
            let opts = self.config_for_attempt(rate_limited);
            let messages = &messages;
            async move { self.provider.call_completions(messages, tools, &opts).await }
        })
        .await?;

        let latency = start.elapsed().as_secs_f64();
        let usage = Usage {
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
            cache_read_tokens: response.usage.prompt_cache_hit_tokens,
            cache_write_tokens: 0,
            reasoning_tokens: 0,
        };
        call_metrics.add_usage(usage);
        call_metrics.add_latency("completion", latency);
        crate::metrics::log_call("completions", &self.config.model, latency, &usage, "ok");

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::malformed_output("completions response had no choices"))?;

        let actions = match &choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => calls
                .iter()
                .enumerate()
                .map(|(i, call)| ActionDraft {
                    tool_name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                    call_id: call.id.clone(),
                    reasoning_summary: if i == 0 { choice.message.reasoning_content.clone() } else { None },
                    encrypted_reasoning: None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let message = if actions.is_empty() {
            match &choice.message.content {
                Some(text) if !text.is_empty() => Some(text.clone()),
                _ => return Err(Error::NoResponse),
            }
        } else {
            None
        };

        self.metrics.lock().expect("metrics mutex poisoned").merge(&call_metrics);

        Ok(LlmResponse {
            message,
            actions,
            metrics: call_metrics,
            raw: serde_json::to_value(&response).unwrap_or(Value::Null),
            continuation_handle: None,
        })
    }

    /// Responses-path invocation. On the first turn `previous_response_id`
    /// is `None` and the full input is sent; on continuation, only the
    /// delta.
    pub async fn responses(
        &self,
        instructions: &str,
        input: &[ResponsesInputItem],
        tools: &[Value],
        previous_response_id: Option<&str>,
    ) -> Result<LlmResponse> {
        if previous_response_id.is_some() && !self.supports(Feature::ResponsesApi) {
            return Err(Error::ModelSwitchNotAllowed);
        }

        let start = Instant::now();
        let mut call_metrics = Metrics::new();
        let response = with_retry(&self.config.retry, &mut call_metrics, |_attempt, rate_limited| {
            let opts = self.config_for_attempt(rate_limited);
            async move { self.provider.call_responses(instructions, input, tools, &opts, previous_response_id).await }
        })
        .await?;

        let latency = start.elapsed().as_secs_f64();
        let usage = Usage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            reasoning_tokens: response.usage.reasoning_tokens,
        };
        call_metrics.add_usage(usage);
        call_metrics.add_latency("responses", latency);
        crate::metrics::log_call("responses", &self.config.model, latency, &usage, "ok");

        let mut actions = Vec::new();
        let mut message = None;
        let mut pending_reasoning_summary = None;
        let mut pending_encrypted_reasoning = None;

        for item in &response.output {
            match item {
                ResponsesOutputItem::Message { content } => {
                    message = Some(content.clone());
                }
                ResponsesOutputItem::FunctionCall { call_id, name, arguments } => {
                    actions.push(ActionDraft {
                        tool_name: name.clone(),
                        arguments: arguments.clone(),
                        call_id: call_id.clone(),
                        reasoning_summary: pending_reasoning_summary.take(),
                        encrypted_reasoning: pending_encrypted_reasoning.take(),
                    });
                }
                ResponsesOutputItem::Reasoning { summary, content, encrypted_content } => {
                    let text = summary.clone().or_else(|| content.clone());
                    pending_reasoning_summary = text;
                    if self.config.enable_encrypted_reasoning {
                        pending_encrypted_reasoning = encrypted_content.clone();
                    }
                }
            }
        }

        if actions.is_empty() && message.is_none() {
            return Err(Error::NoResponse);
        }

        self.metrics.lock().expect("metrics mutex poisoned").merge(&call_metrics);

        Ok(LlmResponse {
            message,
            actions,
            metrics: call_metrics,
            raw: serde_json::to_value(&response).unwrap_or(Value::Null),
            continuation_handle: Some(response.id),
        })
    }
}
