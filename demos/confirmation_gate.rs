//! Demonstrates confirmation-mode gating: every tool-call batch is appended
//! to the log but held back from execution until explicitly approved
//! (`run()` again) or rejected (`reject_pending_actions`).
//!
//!     cargo run --example confirmation_gate

use async_trait::async_trait;
use serde_json::Value;
use std::io::{self, Write};

use open_agent::{
    Agent, ChatMessage, Conversation, EventKind, LlmAdapter, LlmConfig, LlmProvider,
    MicroagentSet, NoOpCondenser, Result, SystemPromptOptions, ToolSpec,
};

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
        SystemPromptOptions { working_directory: "/workspace".into(), ..Default::default() },
        MicroagentSet::default(),
        Box::new(NoOpCondenser),
        None,
    );

    let mut conversation = Conversation::new(agent, 20)?;
    conversation.set_confirmation_mode(true);
    conversation.send_message("Delete all build artifacts under target/.")?;
    conversation.run().await?;

    if conversation.state().waiting_for_confirmation() {
        for event in conversation.state().events.snapshot() {
            if let EventKind::Action { tool_name, arguments, risk_level, .. } = &event.kind {
                println!("pending: {tool_name}({arguments}) risk={risk_level:?}");
            }
        }

        print!("approve? [y/N] ");
        io::stdout().flush().ok();
        let mut answer = String::new();
        io::stdin().read_line(&mut answer).ok();

        if answer.trim().eq_ignore_ascii_case("y") {
            conversation.run().await?;
        } else {
            conversation.reject_pending_actions("not approved by operator")?;
        }
    }

    println!("finished: {}", conversation.state().finished);
    Ok(())
}
