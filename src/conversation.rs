//! The Conversation driver: the step loop tying an `Agent` to a
//! `ConversationState` and dispatching appended events to subscribers.

use std::collections::HashMap;

use serde_json::Value;

use crate::agent::{Agent, StepOutcome};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSource};
use crate::llm::LlmProvider;
use crate::state::{ConversationState, PauseHandle};
use crate::tools::{self, Action as ToolAction, Observation, Tool};
use crate::types::ContentBlock;

/// Receives every event appended to a conversation's log, in order. A
/// subscriber's error is logged and discarded; it never aborts the loop.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&mut self, event: &Event) -> Result<()>;
}

/// Number of trailing identical failing actions that trips stuck detection.
const STUCK_WINDOW: usize = 4;

/// Ties an `Agent` to a `ConversationState`, running the step loop and
/// notifying subscribers of every appended event.
pub struct Conversation<P> {
    agent: Agent<P>,
    state: ConversationState,
    resolved_tools: HashMap<String, Tool>,
    subscribers: Vec<Box<dyn EventSubscriber>>,
}

impl<P: LlmProvider> Conversation<P> {
    /// Resolve the agent's tool specs into live tools once, up front.
    pub fn new(agent: Agent<P>, max_iteration_per_run: u32) -> Result<Self> {
        let mut resolved_tools = HashMap::new();
        for spec in agent.tool_specs() {
            let tool = tools::registry().resolve(spec)?;
            resolved_tools.insert(tool.def.name.clone(), tool);
        }
        Ok(Self {
            agent,
            state: ConversationState::new(max_iteration_per_run),
            resolved_tools,
            subscribers: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.state.pause_handle()
    }

    pub fn set_confirmation_mode(&self, enabled: bool) {
        self.state.set_confirmation_mode(enabled);
    }

    /// Append a user message. Fails once the conversation has finished.
    pub fn send_message(&mut self, text: impl Into<String>) -> Result<()> {
        if self.state.finished {
            return Err(Error::other("cannot send a message to a finished conversation"));
        }
        self.append_and_notify(Event::new(
            EventSource::User,
            EventKind::Message { content: vec![ContentBlock::text(text.into())] },
        ))
    }

    /// Reject every pending (unmatched) action instead of executing it,
    /// clearing the waiting-for-confirmation flag.
    pub fn reject_pending_actions(&mut self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let pending_call_ids = self.state.events.unmatched_action_call_ids();
        for call_id in pending_call_ids {
            self.append_and_notify(Event::new(
                EventSource::System,
                EventKind::RejectedObservation { call_id, reason: reason.clone() },
            ))?;
        }
        self.append_and_notify(Event::new(EventSource::System, EventKind::Rejection { reason }))?;
        self.state.set_waiting_for_confirmation(false);
        Ok(())
    }

    fn append_and_notify(&mut self, event: Event) -> Result<()> {
        self.state.events.append(event)?;
        let appended = self.state.events.snapshot().last().expect("just appended").clone();
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.on_event(&appended) {
                log::warn!("event subscriber failed on {}: {err}", appended.kind.name());
            }
        }
        Ok(())
    }

    /// Run the step loop until it pauses, finishes, hits its iteration cap,
    /// or detects a stuck loop.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.state.is_paused() || self.state.finished {
                return Ok(());
            }

            if self.state.iteration >= self.state.max_iteration_per_run {
                self.append_and_notify(Event::new(
                    EventSource::System,
                    EventKind::AgentError {
                        kind: "iteration_cap".to_string(),
                        message: "maximum iterations per run exceeded".to_string(),
                    },
                ))?;
                return Ok(());
            }

            if self.state.waiting_for_confirmation() {
                self.execute_pending_actions().await?;
                self.state.iteration += 1;
                continue;
            }

            self.agent.init_state(&mut self.state)?;
            let outcome = self.agent.step(&mut self.state).await?;

            match outcome {
                StepOutcome::Actions { batch_id, actions, force_confirmation } => {
                    for (index, pending) in actions.iter().enumerate() {
                        self.append_and_notify(Event::new(
                            EventSource::Agent,
                            EventKind::Action {
                                tool_name: pending.tool_name.clone(),
                                arguments: pending.arguments.clone(),
                                call_id: pending.call_id.clone(),
                                batch_id,
                                index_in_batch: index,
                                reasoning_summary: pending.reasoning_summary.clone(),
                                encrypted_reasoning: pending.encrypted_reasoning.clone(),
                                risk_level: pending.risk_level,
                            },
                        ))?;
                    }

                    // A pause requested while this step's LLM call was in flight is
                    // observed here, before execution, the same way confirmation mode
                    // gates execution: the batch is durable but unexecuted until a
                    // later `run()` call, after resume.
                    if force_confirmation || self.state.confirmation_mode() || self.state.is_paused() {
                        self.state.set_waiting_for_confirmation(true);
                        return Ok(());
                    }

                    self.execute_pending_actions().await?;
                    self.state.iteration += 1;

                    if self.detect_stuck() {
                        self.append_and_notify(Event::new(
                            EventSource::System,
                            EventKind::AgentError {
                                kind: "stuck".to_string(),
                                message: "agent appears stuck repeating the same failing action".to_string(),
                            },
                        ))?;
                        self.state.finished = true;
                        return Ok(());
                    }
                }
                StepOutcome::Terminal(text) => {
                    self.append_and_notify(Event::new(
                        EventSource::Agent,
                        EventKind::Message { content: vec![ContentBlock::text(text)] },
                    ))?;
                    return Ok(());
                }
            }
        }
    }

    /// Execute every unmatched `Action` concurrently, preserving append
    /// order, and append the resulting `Observation`/`AgentFinished` events.
    /// Clears waiting-for-confirmation whether it was set or not, since this
    /// also services the confirmed path.
    async fn execute_pending_actions(&mut self) -> Result<()> {
        let unmatched: std::collections::HashSet<String> =
            self.state.events.unmatched_action_call_ids().into_iter().collect();
        let pending: Vec<(String, String, String)> = self
            .state
            .events
            .snapshot()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Action { tool_name, arguments, call_id, .. } if unmatched.contains(call_id) => {
                    Some((tool_name.clone(), arguments.clone(), call_id.clone()))
                }
                _ => None,
            })
            .collect();

        let resolved_tools = &self.resolved_tools;
        let futures_iter = pending.iter().map(|(tool_name, arguments, call_id)| {
            let action = ToolAction {
                tool_name: tool_name.clone(),
                arguments: serde_json::from_str::<Value>(arguments).unwrap_or(Value::Null),
                call_id: call_id.clone(),
            };
            async move {
                match resolved_tools.get(tool_name) {
                    Some(tool) => tool.executor.execute(&action).await,
                    None => Ok(Observation::error(format!("no tool registered under name '{tool_name}'"))),
                }
            }
        });
        let results = futures::future::join_all(futures_iter).await;

        for ((_, _, call_id), result) in pending.iter().zip(results) {
            match result {
                Ok(obs) if tools::is_finish_observation(&obs) => {
                    self.append_and_notify(Event::new(EventSource::Environment, EventKind::AgentFinished))?;
                    self.state.finished = true;
                }
                Ok(obs) => {
                    self.append_and_notify(Event::new(
                        EventSource::Environment,
                        EventKind::Observation { call_id: call_id.clone(), content: obs.content, is_error: obs.is_error },
                    ))?;
                }
                Err(Error::ToolTransport(message)) => {
                    self.append_and_notify(Event::new(
                        EventSource::Environment,
                        EventKind::Observation { call_id: call_id.clone(), content: message, is_error: true },
                    ))?;
                }
                Err(err) => return Err(err),
            }
        }

        self.state.set_waiting_for_confirmation(false);
        Ok(())
    }

    /// Bounded-window heuristic: the last `STUCK_WINDOW` `Action` events all
    /// name the same tool with canonically-equal arguments and all failed
    /// with the same error text.
    fn detect_stuck(&self) -> bool {
        let events = self.state.events.snapshot();
        let actions: Vec<&Event> = events.iter().filter(|e| matches!(e.kind, EventKind::Action { .. })).collect();
        if actions.len() < STUCK_WINDOW {
            return false;
        }
        let last_window = &actions[actions.len() - STUCK_WINDOW..];

        let mut signature: Option<(String, String, String)> = None;
        for action_event in last_window {
            let EventKind::Action { tool_name, arguments, call_id, .. } = &action_event.kind else {
                unreachable!("filtered to Action events above");
            };
            let error_text = match events.iter().find(|e| e.observation_call_id() == Some(call_id.as_str())) {
                Some(Event { kind: EventKind::Observation { content, is_error: true, .. }, .. }) => content.clone(),
                Some(Event { kind: EventKind::RejectedObservation { reason, .. }, .. }) => reason.clone(),
                _ => return false,
            };
            let canonical_args = canonicalize_arguments(arguments);

            match &signature {
                None => signature = Some((tool_name.clone(), canonical_args, error_text)),
                Some((seen_tool, seen_args, seen_error)) => {
                    if *seen_tool != *tool_name || *seen_args != canonical_args || *seen_error != error_text {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Parse and re-serialize so two textually-different-but-equal argument
/// strings compare equal (`serde_json::Map` is key-sorted without the
/// `preserve_order` feature). Falls back to the raw string if unparsable.
fn canonicalize_arguments(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::context::{MicroagentSet, NoOpCondenser, SystemPromptOptions};
    use crate::llm::messages::ChatMessage;
    use crate::llm::responses::{ResponsesApiResponse, ResponsesInputItem};
    use crate::llm::{ChatChoice, ChatCompletionResponse, ChatResponseMessage, ChatToolCallFunctionRaw, ChatToolCallRaw, ChatUsage, LlmAdapter};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedProvider {
        calls: Arc<AtomicUsize>,
        responses: Vec<ChatCompletionResponse>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn call_completions(
            &self,
            _messages: &[ChatMessage],
            _tools: &[Value],
            _opts: &LlmConfig,
        ) -> Result<ChatCompletionResponse> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[i.min(self.responses.len() - 1)].clone())
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

    fn text_response(text: &str) -> ChatCompletionResponse {
        ChatCompletionResponse {
            choices: vec![ChatChoice {
                message: ChatResponseMessage { content: Some(text.to_string()), tool_calls: None, reasoning_content: None },
            }],
            usage: ChatUsage::default(),
        }
    }

    fn finish_call_response(call_id: &str) -> ChatCompletionResponse {
        ChatCompletionResponse {
            choices: vec![ChatChoice {
                message: ChatResponseMessage {
                    content: None,
                    tool_calls: Some(vec![ChatToolCallRaw {
                        id: call_id.to_string(),
                        function: ChatToolCallFunctionRaw { name: "finish".into(), arguments: "{}".into() },
                    }]),
                    reasoning_content: None,
                },
            }],
            usage: ChatUsage::default(),
        }
    }

    fn conversation_with(responses: Vec<ChatCompletionResponse>) -> Conversation<ScriptedProvider> {
        let config = LlmConfig::builder().model("qwen2.5-32b-instruct").base_url("http://x").build().unwrap();
        let provider = ScriptedProvider { calls: Arc::new(AtomicUsize::new(0)), responses };
        let llm = LlmAdapter::new(provider, config);
        let agent = Agent::new(
            llm,
            vec![crate::tools::ToolSpec::new("finish")],
            SystemPromptOptions { working_directory: "/repo".into(), ..Default::default() },
            MicroagentSet::default(),
            Box::new(NoOpCondenser),
            None,
        );
        Conversation::new(agent, 50).unwrap()
    }

    struct RecordingSubscriber {
        seen: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl EventSubscriber for RecordingSubscriber {
        fn on_event(&mut self, event: &Event) -> Result<()> {
            self.seen.lock().unwrap().push(event.kind.name().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn single_turn_text_response_ends_the_run() {
        let mut convo = conversation_with(vec![text_response("hello there")]);
        convo.send_message("hi").unwrap();
        convo.run().await.unwrap();
        assert!(convo.state().finished == false);
        let last = convo.state().events.snapshot().last().unwrap();
        assert!(matches!(&last.kind, EventKind::Message { .. }));
    }

    #[tokio::test]
    async fn tool_call_then_finish_marks_conversation_finished() {
        let mut convo = conversation_with(vec![finish_call_response("call_1")]);
        convo.send_message("please finish").unwrap();
        convo.run().await.unwrap();
        assert!(convo.state().finished);
        assert!(convo.state().events.snapshot().iter().any(|e| matches!(e.kind, EventKind::AgentFinished)));
    }

    #[tokio::test]
    async fn confirmation_mode_pauses_before_executing_actions() {
        let mut convo = conversation_with(vec![finish_call_response("call_1")]);
        convo.set_confirmation_mode(true);
        convo.send_message("please finish").unwrap();
        convo.run().await.unwrap();
        assert!(!convo.state().finished);
        assert!(convo.state().waiting_for_confirmation());

        convo.run().await.unwrap();
        assert!(convo.state().finished);
        assert!(!convo.state().waiting_for_confirmation());
    }

    #[tokio::test]
    async fn rejecting_pending_actions_clears_the_wait_without_executing() {
        let mut convo = conversation_with(vec![finish_call_response("call_1")]);
        convo.set_confirmation_mode(true);
        convo.send_message("please finish").unwrap();
        convo.run().await.unwrap();
        assert!(convo.state().waiting_for_confirmation());

        convo.reject_pending_actions("not approved").unwrap();
        assert!(!convo.state().waiting_for_confirmation());
        assert!(!convo.state().finished);
        assert!(convo
            .state()
            .events
            .snapshot()
            .iter()
            .any(|e| matches!(&e.kind, EventKind::RejectedObservation { reason, .. } if reason == "not approved")));
    }

    #[tokio::test]
    async fn pause_is_observed_before_the_next_step() {
        let mut convo = conversation_with(vec![text_response("hi")]);
        let handle = convo.pause_handle();
        handle.request_pause();
        convo.send_message("hello").unwrap();
        convo.run().await.unwrap();
        assert!(convo.state().events.snapshot().iter().all(|e| !matches!(e.kind, EventKind::Message { .. } if e.source == EventSource::Agent)));
    }

    #[tokio::test]
    async fn subscriber_receives_every_appended_event_in_order() {
        let mut convo = conversation_with(vec![text_response("hello")]);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        convo.subscribe(Box::new(RecordingSubscriber { seen: seen.clone() }));
        convo.send_message("hi").unwrap();
        convo.run().await.unwrap();
        let kinds = seen.lock().unwrap().clone();
        assert!(kinds.contains(&"message".to_string()));
        assert!(kinds.contains(&"system_prompt".to_string()));
    }

    #[test]
    fn canonicalize_arguments_ignores_key_order() {
        let a = canonicalize_arguments(r#"{"b":1,"a":2}"#);
        let b = canonicalize_arguments(r#"{"a":2,"b":1}"#);
        assert_eq!(a, b);
    }
}
