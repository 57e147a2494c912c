//! A minimal single-turn conversation against a local OpenAI-compatible
//! server: send one message, run the step loop to completion, print the
//! assistant's reply.
//!
//! Point this at any server speaking the LM Studio / Ollama / llama.cpp /
//! vLLM chat-completions shape:
//!
//!     cargo run --example simple_query

use async_trait::async_trait;
use serde_json::Value;

use open_agent::{
    Agent, ChatMessage, Conversation, EventKind, LlmAdapter, LlmConfig, LlmProvider,
    MicroagentSet, NoOpCondenser, Result, SystemPromptOptions, ToolSpec,
};

/// Talks to an OpenAI-compatible `/chat/completions` endpoint. The responses
/// path is left unimplemented since every model targeted by this demo only
/// supports completions (see `llm::features::capabilities_for`).
struct ChatCompletionsProvider {
    client: reqwest::Client,
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    async fn call_completions(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
        opts: &LlmConfig,
    ) -> Result<open_agent::ChatCompletionResponse> {
        let body = serde_json::json!({
            "model": opts.model,
            "messages": messages,
            "tools": tools,
            "temperature": opts.temperature,
        });
        let response = self
            .client
            .post(format!("{}/chat/completions", opts.base_url))
            .json(&body)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    async fn call_responses(
        &self,
        _instructions: &str,
        _input: &[open_agent::ResponsesInputItem],
        _tools: &[Value],
        _opts: &LlmConfig,
        _previous_response_id: Option<&str>,
    ) -> Result<open_agent::ResponsesApiResponse> {
        unreachable!("this demo only targets models on the completions path")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = LlmConfig::builder()
        .model("qwen2.5-32b-instruct")
        .base_url("http://localhost:1234/v1")
        .build()?;
    let llm = LlmAdapter::new(ChatCompletionsProvider { client: reqwest::Client::new() }, config);

    let agent = Agent::new(
        llm,
        vec![ToolSpec::new("finish")],
        SystemPromptOptions { working_directory: std::env::current_dir()?.display().to_string(), ..Default::default() },
        MicroagentSet::default(),
        Box::new(NoOpCondenser),
        None,
    );

    let mut conversation = Conversation::new(agent, 20)?;
    conversation.send_message("What files are in the current directory?")?;
    conversation.run().await?;

    for event in conversation.state().events.snapshot() {
        if let EventKind::Message { content } = &event.kind {
            if event.source == open_agent::EventSource::Agent {
                for block in content {
                    if let Some(text) = block.as_text() {
                        println!("{text}");
                    }
                }
            }
        }
    }

    Ok(())
}
