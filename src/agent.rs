//! The Agent: decides how to call the LLM, formats inputs, parses outputs
//! into typed events, and bridges tool calls.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::context::{render_system_prompt, Condenser, MicroagentSet, SystemPromptOptions, View};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSource, RiskLevel};
use crate::llm::features::Feature;
use crate::llm::messages::build_completions_messages;
use crate::llm::{LlmAdapter, LlmProvider};
use crate::security::SecurityAnalyzer;
use crate::state::ConversationState;
use crate::tools::{self, Action as ToolAction, ToolSpec};
use crate::types::ContentBlock;

/// A tool call produced by a `step()`, not yet appended as an `ActionEvent`
/// (the driver assigns `index_in_batch` and performs the append).
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub tool_name: String,
    pub arguments: String,
    pub call_id: String,
    pub reasoning_summary: Option<String>,
    pub encrypted_reasoning: Option<String>,
    pub risk_level: Option<RiskLevel>,
}

/// What a single `step()` produced.
pub enum StepOutcome {
    Actions {
        batch_id: Uuid,
        actions: Vec<PendingAction>,
        /// Set when the security analyzer classified any action `high`,
        /// forcing confirmation-mode semantics for this batch even if
        /// confirmation mode is off.
        force_confirmation: bool,
    },
    Terminal(String),
}

/// Drives LLM invocation and output parsing for one conversation. Stateless
/// with respect to the conversation itself; all mutable state lives in
/// `ConversationState`, passed by reference into `step()`.
pub struct Agent<P> {
    llm: LlmAdapter<P>,
    tool_specs: Vec<ToolSpec>,
    prompt_options: SystemPromptOptions,
    microagents: MicroagentSet,
    condenser: Box<dyn Condenser>,
    security: Option<Box<dyn SecurityAnalyzer>>,
}

impl<P: LlmProvider> Agent<P> {
    pub fn new(
        llm: LlmAdapter<P>,
        tool_specs: Vec<ToolSpec>,
        prompt_options: SystemPromptOptions,
        microagents: MicroagentSet,
        condenser: Box<dyn Condenser>,
        security: Option<Box<dyn SecurityAnalyzer>>,
    ) -> Self {
        Self { llm, tool_specs, prompt_options, microagents, condenser, security }
    }

    /// Render the system prompt and append a `SystemPrompt` event once,
    /// idempotent per conversation.
    pub fn init_state(&self, state: &mut ConversationState) -> Result<()> {
        let already_initialized =
            state.events.snapshot().iter().any(|e| matches!(e.kind, EventKind::SystemPrompt { .. }));
        if already_initialized {
            return Ok(());
        }

        let mut options = self.prompt_options.clone();
        let repo_context = self.microagents.repo_context();
        if !repo_context.is_empty() {
            options.suffix = match options.suffix.take() {
                Some(existing) => Some(format!("{existing}\n{repo_context}")),
                None => Some(repo_context),
            };
        }
        let prompt = render_system_prompt(&options)?;

        let tool_names: Vec<String> = self.tool_specs.iter().map(|s| s.name.clone()).collect();
        state
            .events
            .append(Event::new(EventSource::System, EventKind::SystemPrompt { prompt, tool_names }))?;
        Ok(())
    }

    fn activate_microagents(&self, state: &mut ConversationState) -> Result<()> {
        let active: HashSet<String> = state.active_microagents.iter().cloned().collect();
        let mut newly: Vec<(String, String)> = Vec::new();

        for event in state.events.snapshot() {
            if event.source != EventSource::User {
                continue;
            }
            if let EventKind::Message { content } = &event.kind {
                let text = content.iter().filter_map(ContentBlock::as_text).collect::<Vec<_>>().join(" ");
                for (microagent, trigger) in self.microagents.newly_triggered(&text, &active) {
                    if !newly.iter().any(|(n, _)| n == &microagent.name) {
                        newly.push((microagent.name.clone(), trigger.to_string()));
                    }
                }
            }
        }

        for (name, trigger) in newly {
            state
                .events
                .append(Event::new(EventSource::System, EventKind::MicroagentActivation { name: name.clone(), trigger }))?;
            state.active_microagents.push(name);
        }
        Ok(())
    }

    pub fn tool_specs(&self) -> &[ToolSpec] {
        &self.tool_specs
    }

    fn resolve_tools(&self) -> Result<Vec<tools::Tool>> {
        self.tool_specs.iter().map(|spec| tools::registry().resolve(spec)).collect()
    }

    async fn classify_risk(&self, view: &View, drafts: &[crate::llm::ActionDraft]) -> (Vec<Option<RiskLevel>>, bool) {
        let Some(analyzer) = &self.security else {
            return (vec![None; drafts.len()], false);
        };
        let batch: Vec<ToolAction> = drafts
            .iter()
            .map(|d| ToolAction {
                tool_name: d.tool_name.clone(),
                arguments: serde_json::from_str(&d.arguments).unwrap_or(Value::Null),
                call_id: d.call_id.clone(),
            })
            .collect();
        let levels = analyzer.classify(&batch, view.events()).await;
        let force = levels.iter().any(|l| *l == RiskLevel::High);
        (levels.into_iter().map(Some).collect(), force)
    }

    /// Decide how to call the LLM, invoke it (retrying once on context
    /// overflow via condensation), and parse the result into a `StepOutcome`.
    pub async fn step(&self, state: &mut ConversationState) -> Result<StepOutcome> {
        self.activate_microagents(state)?;
        self.condenser.condense(&mut state.events).await?;

        let resolved = self.resolve_tools()?;
        let supports_responses = self.llm.supports(Feature::ResponsesApi);

        let response = match (&state.continuation_handle, supports_responses) {
            (Some(_), false) => return Err(Error::ModelSwitchNotAllowed),
            (Some(prev_id), true) => {
                let prev_id = prev_id.clone();
                self.call_responses(state, Some(&prev_id)).await
            }
            (None, true) => self.call_responses(state, None).await,
            (None, false) => self.call_completions(state, &resolved).await,
        };

        let response = match response {
            Err(Error::ContextWindowExceeded) => {
                let condensed = self.condenser.condense(&mut state.events).await?;
                if !condensed {
                    state.events.append(Event::new(
                        EventSource::System,
                        EventKind::AgentError {
                            kind: "context_window_exceeded".to_string(),
                            message: "context window exceeded and no further condensation is possible".to_string(),
                        },
                    ))?;
                    return Err(Error::ContextWindowExceeded);
                }
                match (&state.continuation_handle, supports_responses) {
                    (Some(prev_id), true) => {
                        let prev_id = prev_id.clone();
                        self.call_responses(state, Some(&prev_id)).await?
                    }
                    (None, true) => self.call_responses(state, None).await?,
                    _ => self.call_completions(state, &resolved).await?,
                }
            }
            other => other?,
        };

        if let Some(handle) = response.continuation_handle.clone() {
            state.continuation_handle = Some(handle);
            state.last_responses_submitted_event_id = state.events.snapshot().last().map(|e| e.id);
        }

        if !response.actions.is_empty() {
            let view = View::materialize(&state.events);
            let (risk_levels, force_confirmation) = self.classify_risk(&view, &response.actions).await;
            let batch_id = Uuid::new_v4();
            let actions = response
                .actions
                .into_iter()
                .zip(risk_levels)
                .map(|(draft, risk)| PendingAction {
                    tool_name: draft.tool_name,
                    arguments: draft.arguments,
                    call_id: draft.call_id,
                    reasoning_summary: draft.reasoning_summary,
                    encrypted_reasoning: draft.encrypted_reasoning,
                    risk_level: risk,
                })
                .collect();
            Ok(StepOutcome::Actions { batch_id, actions, force_confirmation })
        } else {
            Ok(StepOutcome::Terminal(response.message.unwrap_or_default()))
        }
    }

    async fn call_completions(
        &self,
        state: &ConversationState,
        resolved: &[tools::Tool],
    ) -> Result<crate::llm::LlmResponse> {
        let view = View::materialize(&state.events);
        let messages = build_completions_messages(view.events());
        let tools_json: Vec<Value> = resolved.iter().map(|t| t.def.to_completions_schema()).collect();
        self.llm.completion(&messages, &tools_json).await
    }

    async fn call_responses(
        &self,
        state: &ConversationState,
        previous_response_id: Option<&str>,
    ) -> Result<crate::llm::LlmResponse> {
        let resolved = self.resolve_tools()?;
        let view = View::materialize(&state.events);
        let since_id = if previous_response_id.is_some() { state.last_responses_submitted_event_id } else { None };
        let (instructions, input) = crate::llm::messages::build_responses_input(view.events(), since_id);
        let tools_json: Vec<Value> = resolved.iter().map(|t| t.def.to_responses_schema()).collect();
        self.llm.responses(&instructions, &input, &tools_json, previous_response_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::context::NoOpCondenser;
    use crate::llm::messages::ChatMessage;
    use crate::llm::responses::{ResponsesApiResponse, ResponsesInputItem};
    use crate::llm::{ChatChoice, ChatCompletionResponse, ChatResponseMessage, ChatToolCallFunctionRaw, ChatToolCallRaw, ChatUsage};
    use async_trait::async_trait;

    struct StubProvider {
        tool_call: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn call_completions(
            &self,
            _messages: &[ChatMessage],
            _tools: &[Value],
            _opts: &LlmConfig,
        ) -> Result<ChatCompletionResponse> {
            if self.tool_call {
                Ok(ChatCompletionResponse {
                    choices: vec![ChatChoice {
                        message: ChatResponseMessage {
                            content: None,
                            tool_calls: Some(vec![ChatToolCallRaw {
                                id: "call_1".into(),
                                function: ChatToolCallFunctionRaw { name: "finish".into(), arguments: "{}".into() },
                            }]),
                            reasoning_content: None,
                        },
                    }],
                    usage: ChatUsage::default(),
                })
            } else {
                Ok(ChatCompletionResponse {
                    choices: vec![ChatChoice {
                        message: ChatResponseMessage {
                            content: Some("hi".into()),
                            tool_calls: None,
                            reasoning_content: None,
                        },
                    }],
                    usage: ChatUsage::default(),
                })
            }
        }

        async fn call_responses(
            &self,
            _instructions: &str,
            _input: &[ResponsesInputItem],
            _tools: &[Value],
            _opts: &LlmConfig,
            _previous_response_id: Option<&str>,
        ) -> Result<ResponsesApiResponse> {
            unreachable!("test model is configured for the completions path")
        }
    }

    fn test_agent(tool_call: bool) -> Agent<StubProvider> {
        let config = LlmConfig::builder().model("qwen2.5-32b-instruct").base_url("http://x").build().unwrap();
        let llm = LlmAdapter::new(StubProvider { tool_call }, config);
        Agent::new(
            llm,
            vec![ToolSpec::new("finish")],
            SystemPromptOptions { working_directory: "/repo".into(), ..Default::default() },
            MicroagentSet::default(),
            Box::new(NoOpCondenser),
            None,
        )
    }

    #[tokio::test]
    async fn init_state_is_idempotent() {
        let agent = test_agent(false);
        let mut state = ConversationState::new(10);
        agent.init_state(&mut state).unwrap();
        let len_after_first = state.events.len();
        agent.init_state(&mut state).unwrap();
        assert_eq!(state.events.len(), len_after_first);
    }

    #[tokio::test]
    async fn step_without_tool_calls_returns_terminal() {
        let agent = test_agent(false);
        let mut state = ConversationState::new(10);
        agent.init_state(&mut state).unwrap();
        state.events.append(Event::user_message("hello")).unwrap();
        let outcome = agent.step(&mut state).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Terminal(text) if text == "hi"));
    }

    #[tokio::test]
    async fn step_with_tool_call_returns_actions() {
        let agent = test_agent(true);
        let mut state = ConversationState::new(10);
        agent.init_state(&mut state).unwrap();
        state.events.append(Event::user_message("finish up")).unwrap();
        let outcome = agent.step(&mut state).await.unwrap();
        match outcome {
            StepOutcome::Actions { actions, force_confirmation, .. } => {
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].tool_name, "finish");
                assert!(!force_confirmation);
            }
            StepOutcome::Terminal(_) => panic!("expected actions"),
        }
    }
}
