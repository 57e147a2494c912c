//! Drives a long-running conversation past the condenser's configured
//! budget and shows the raw log keep growing while the rendered view stays
//! bounded, one `Condensation` event at a time.
//!
//!     cargo run --example context_condensation

use async_trait::async_trait;
use serde_json::Value;

use open_agent::{
    Agent, ChatMessage, Conversation, EventKind, LlmAdapter, LlmConfig, LlmProvider,
    LlmSummarizingCondenser, MicroagentSet, OpenAIContent, Result, Summarizer, SystemPromptOptions,
    ToolSpec,
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

/// Summarizes a condensed window by asking the same server for a one-line
/// recap, reusing the already-configured completions adapter.
struct LlmWindowSummarizer {
    adapter: LlmAdapter<ChatCompletionsProvider>,
}

#[async_trait]
impl Summarizer for LlmWindowSummarizer {
    async fn summarize(&self, window_text: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following conversation excerpt in one sentence:\n\n{window_text}"
        );
        let messages = vec![ChatMessage {
            role: "user",
            content: OpenAIContent::Text(prompt),
            tool_calls: Vec::new(),
            tool_call_id: None,
            cache_control: None,
        }];
        let response = self.adapter.completion(&messages, &[]).await?;
        Ok(response.message.unwrap_or_else(|| window_text.chars().take(80).collect()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = LlmConfig::builder()
        .model("qwen2.5-32b-instruct")
        .base_url("http://localhost:1234/v1")
        .build()?;
    let agent_llm = LlmAdapter::new(ChatCompletionsProvider { client: reqwest::Client::new() }, config.clone());
    let summarizer_llm = LlmAdapter::new(ChatCompletionsProvider { client: reqwest::Client::new() }, config);

    let condenser = LlmSummarizingCondenser::new(40, 4, LlmWindowSummarizer { adapter: summarizer_llm });

    let agent = Agent::new(
        agent_llm,
        vec![ToolSpec::new("finish")],
        SystemPromptOptions { working_directory: "/workspace".into(), ..Default::default() },
        MicroagentSet::default(),
        Box::new(condenser),
        None,
    );

    let mut conversation = Conversation::new(agent, 200)?;
    for turn in 0..30 {
        conversation.send_message(format!("Status update #{turn}: still investigating the failing test."))?;
        conversation.run().await?;
    }

    let raw_len = conversation.state().events.len();
    let view_len = conversation.state().events.view_for_llm().len();
    let condensations =
        conversation.state().events.snapshot().iter().filter(|e| matches!(e.kind, EventKind::Condensation { .. })).count();

    println!("raw log: {raw_len} events, rendered view: {view_len} events, condensations: {condensations}");
    Ok(())
}
