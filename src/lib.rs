//! # Agent Execution Core
//!
//! An event-sourced conversation driver for building AI coding agents on top
//! of local OpenAI-compatible servers (LM Studio, Ollama, llama.cpp, vLLM) or
//! any hosted provider exposing the same two invocation shapes.
//!
//! ## Architecture
//!
//! - **event**: the append-only, typed event log and its view derivation.
//! - **state**: `ConversationState` — the event log plus cross-thread control
//!   flags (pause, confirmation mode).
//! - **agent**: decides how to call the LLM for one step, formats input,
//!   parses output into typed events.
//! - **conversation**: the step loop driving an `Agent` against a
//!   `ConversationState`, dispatching every appended event to subscribers.
//! - **llm**: the dual-path (chat-completions / responses) invocation layer,
//!   wrapped with retry, telemetry, and feature detection.
//! - **context**: system prompt assembly, microagent activation, history
//!   condensation.
//! - **tools** / **mcp**: the tool registry, typed Action/Observation
//!   contract, and MCP server bridging.
//! - **security**: risk classification of pending tool-call batches.
//! - **config** / **registry**: provider configuration and the
//!   service-id-to-`LlmConfig` map.
//! - **metrics**: cumulative token/cost/latency accounting.
//! - **retry**: exponential backoff with jitter, shared by the LLM adapter.
//!
//! ## Example
//!
//! ```rust,ignore
//! use open_agent::prelude::*;
//!
//! // `provider` implements `LlmProvider` against a local or hosted endpoint.
//! let config = LlmConfig::builder()
//!     .model("qwen2.5-32b-instruct")
//!     .base_url("http://localhost:1234/v1")
//!     .build()?;
//! let llm = LlmAdapter::new(provider, config);
//! let agent = Agent::new(
//!     llm,
//!     vec![ToolSpec::new("finish")],
//!     SystemPromptOptions { working_directory: "/repo".into(), ..Default::default() },
//!     MicroagentSet::default(),
//!     Box::new(NoOpCondenser),
//!     None,
//! );
//! let mut conversation = Conversation::new(agent, 50)?;
//! conversation.send_message("list the files in this repo")?;
//! conversation.run().await?;
//! ```

mod agent;
mod config;
mod context;
mod conversation;
mod error;
mod event;
mod llm;
mod mcp;
mod metrics;
mod registry;
mod retry;
mod security;
mod state;
mod tools;
mod types;

pub use agent::{Agent, PendingAction, StepOutcome};
pub use config::{get_base_url, get_model, LlmConfig, LlmConfigBuilder, Provider, ReasoningEffort};
pub use context::{
    render_system_prompt, Condenser, KnowledgeMicroagent, LlmSummarizingCondenser, MicroagentSet,
    NoOpCondenser, RepoMicroagent, Summarizer, SystemPromptOptions, View,
};
pub use conversation::{Conversation, EventSubscriber};
pub use error::{Error, Result};
pub use event::{Event, EventKind, EventSource, EventStore, RiskLevel};
pub use llm::features::{Capabilities, Feature};
pub use llm::messages::{ChatMessage, ChatToolCall, ChatToolCallFunction};
pub use llm::responses::{ResponsesApiResponse, ResponsesInputItem, ResponsesOutputItem, ResponsesUsage};
pub use llm::{
    ActionDraft, ChatChoice, ChatCompletionResponse, ChatResponseMessage, ChatToolCallFunctionRaw,
    ChatToolCallRaw, ChatUsage, LlmAdapter, LlmProvider, LlmResponse,
};
pub use mcp::{McpServer, McpToolDescriptor, McpTransport};
pub use metrics::{redact, Metrics, Usage};
pub use retry::{with_retry, RetryPolicy};
pub use registry::{LlmRegistry, SERVICE_AGENT, SERVICE_CONDENSER, SERVICE_SECURITY};
pub use security::{LlmSecurityAnalyzer, NoOpSecurityAnalyzer, RubricClassifier, SecurityAnalyzer};
pub use state::{ConversationState, ControlFlags, PauseHandle};
pub use tools::{
    is_finish_observation, registry, Action, Executor, Observation, Tool, ToolDef, ToolRegistry, ToolSpec,
    FINISH_SENTINEL,
};
pub use types::{
    to_openai_content, ContentBlock, ImageBlock, ImageDetail, Message, MessageRole, OpenAIContent,
    OpenAIContentPart, OpenAIImageUrl, TextBlock, ToolResultBlock, ToolUseBlock,
};

/// Convenience module re-exporting the types needed to assemble an `Agent`
/// and drive a `Conversation`. Import with `use open_agent::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Action, Agent, ContentBlock, Conversation, Error, Event, EventKind, EventSource,
        EventSubscriber, LlmAdapter, LlmConfig, LlmProvider, Message, MicroagentSet, NoOpCondenser,
        Observation, PauseHandle, Result, RiskLevel, SecurityAnalyzer, StepOutcome,
        SystemPromptOptions, Tool, ToolDef, ToolSpec, View,
    };
}
