//! Registers two custom tools (`add`, `multiply`) and lets the agent call
//! them to answer an arithmetic question, demonstrating the tool registry
//! and dispatch path end to end.
//!
//!     cargo run --example calculator_tools

use async_trait::async_trait;
use serde_json::Value;

use open_agent::{
    registry, Action, Agent, ChatMessage, Conversation, Executor, LlmAdapter, LlmConfig,
    LlmProvider, MicroagentSet, NoOpCondenser, Observation, Result, SystemPromptOptions, Tool,
    ToolDef, ToolSpec,
};

struct AddExecutor;

#[async_trait]
impl Executor for AddExecutor {
    async fn execute(&self, action: &Action) -> Result<Observation> {
        let a = action.arguments["a"].as_f64().unwrap_or(0.0);
        let b = action.arguments["b"].as_f64().unwrap_or(0.0);
        Ok(Observation::ok((a + b).to_string()))
    }
}

struct MultiplyExecutor;

#[async_trait]
impl Executor for MultiplyExecutor {
    async fn execute(&self, action: &Action) -> Result<Observation> {
        let a = action.arguments["a"].as_f64().unwrap_or(0.0);
        let b = action.arguments["b"].as_f64().unwrap_or(0.0);
        Ok(Observation::ok((a * b).to_string()))
    }
}

fn register_calculator_tools() {
    let number_schema = serde_json::json!({
        "type": "object",
        "properties": { "a": {"type": "number"}, "b": {"type": "number"} },
        "required": ["a", "b"],
    });

    registry().register("add", {
        let schema = number_schema.clone();
        move |_params| {
            Ok(Tool {
                def: ToolDef {
                    name: "add".into(),
                    description: "Add two numbers.".into(),
                    parameters_schema: schema.clone(),
                    dangerous: false,
                },
                executor: Box::new(AddExecutor),
            })
        }
    });

    registry().register("multiply", move |_params| {
        Ok(Tool {
            def: ToolDef {
                name: "multiply".into(),
                description: "Multiply two numbers.".into(),
                parameters_schema: number_schema.clone(),
                dangerous: false,
            },
            executor: Box::new(MultiplyExecutor),
        })
    });
}

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
    register_calculator_tools();

    let config = LlmConfig::builder()
        .model("qwen2.5-32b-instruct")
        .base_url("http://localhost:1234/v1")
        .build()?;
    let llm = LlmAdapter::new(ChatCompletionsProvider { client: reqwest::Client::new() }, config);

    let agent = Agent::new(
        llm,
        vec![ToolSpec::new("add"), ToolSpec::new("multiply"), ToolSpec::new("finish")],
        SystemPromptOptions { working_directory: "/workspace".into(), ..Default::default() },
        MicroagentSet::default(),
        Box::new(NoOpCondenser),
        None,
    );

    let mut conversation = Conversation::new(agent, 20)?;
    conversation.send_message("What is (4 + 5) multiplied by 3? Use the tools to compute it.")?;
    conversation.run().await?;

    for event in conversation.state().events.snapshot() {
        if let open_agent::EventKind::Observation { content, .. } = &event.kind {
            println!("tool result: {content}");
        }
    }

    Ok(())
}
