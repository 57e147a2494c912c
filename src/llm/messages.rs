//! Renders an event view into the two providers' wire shapes: a flat
//! `(role, content)` list for the completions path, and an
//! `instructions` + ordered `input` pair for the responses path.

use uuid::Uuid;

use crate::event::{Event, EventKind, EventSource};
use crate::llm::responses::ResponsesInputItem;
use crate::types::{to_openai_content, ContentBlock, OpenAIContent};

/// A message in the OpenAI chat-completions wire shape, including the
/// `tool_calls` list assistant turns carry and the `tool_call_id` observation
/// messages key on.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: OpenAIContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Provider cache-control marker, set by the adapter on the system
    /// prompt and most recent user message when prompt caching is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<serde_json::Value>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ChatToolCallFunction,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatToolCallFunction {
    pub name: String,
    pub arguments: String,
}

/// Render an event view into the completions path's flat message list.
/// Contiguous `Action` events sharing a batch-id collapse into one assistant
/// message carrying multiple `tool_calls`.
pub fn build_completions_messages(view: &[Event]) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < view.len() {
        let event = &view[i];
        match &event.kind {
            EventKind::SystemPrompt { prompt, .. } => {
                out.push(ChatMessage {
                    role: "system",
                    content: OpenAIContent::Text(prompt.clone()),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                    cache_control: None,
                });
                i += 1;
            }
            EventKind::Message { content } => {
                let role = match event.source {
                    EventSource::User => "user",
                    _ => "assistant",
                };
                out.push(ChatMessage {
                    role,
                    content: to_openai_content(content),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                    cache_control: None,
                });
                i += 1;
            }
            EventKind::MicroagentActivation { name, trigger } => {
                out.push(ChatMessage {
                    role: "system",
                    content: OpenAIContent::Text(format!(
                        "[microagent '{name}' activated by trigger '{trigger}']"
                    )),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                    cache_control: None,
                });
                i += 1;
            }
            EventKind::Action { batch_id, .. } => {
                let batch_id = *batch_id;
                let mut tool_calls = Vec::new();
                let mut thought: Option<ContentBlock> = None;
                while i < view.len() {
                    match &view[i].kind {
                        EventKind::Action { tool_name, arguments, call_id, batch_id: b, .. }
                            if *b == batch_id =>
                        {
                            if thought.is_none() {
                                if let EventKind::Action { reasoning_summary: Some(t), .. } = &view[i].kind {
                                    thought = Some(ContentBlock::text(t.clone()));
                                }
                            }
                            tool_calls.push(ChatToolCall {
                                id: call_id.clone(),
                                kind: "function",
                                function: ChatToolCallFunction {
                                    name: tool_name.clone(),
                                    arguments: arguments.clone(),
                                },
                            });
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let content = match thought {
                    Some(block) => OpenAIContent::Text(block.as_text().unwrap_or_default().to_string()),
                    None => OpenAIContent::Text(String::new()),
                };
                out.push(ChatMessage { role: "assistant", content, tool_calls, tool_call_id: None, cache_control: None });
            }
            EventKind::Observation { call_id, content, .. } => {
                out.push(ChatMessage {
                    role: "tool",
                    content: OpenAIContent::Text(content.clone()),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call_id.clone()),
                    cache_control: None,
                });
                i += 1;
            }
            EventKind::RejectedObservation { call_id, reason } => {
                out.push(ChatMessage {
                    role: "tool",
                    content: OpenAIContent::Text(format!("rejected: {reason}")),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call_id.clone()),
                    cache_control: None,
                });
                i += 1;
            }
            // Control-plane events are not rendered into provider messages.
            EventKind::Condensation { .. }
            | EventKind::Pause
            | EventKind::Rejection { .. }
            | EventKind::AgentError { .. }
            | EventKind::AgentFinished => {
                i += 1;
            }
        }
    }
    out
}

/// Render the responses path's `instructions` plus ordered `input` list.
/// When `since_id` is `Some`, only events after that id are included (a
/// continuation turn); otherwise the full view is sent.
pub fn build_responses_input(view: &[Event], since_id: Option<Uuid>) -> (String, Vec<ResponsesInputItem>) {
    let mut instructions = String::new();
    let mut input = Vec::new();
    let mut seen_since = since_id.is_none();

    for event in view {
        if !seen_since {
            if Some(event.id) == since_id {
                seen_since = true;
            }
            continue;
        }
        if Some(event.id) == since_id {
            // The boundary event itself was already submitted on a prior turn.
            continue;
        }
        match &event.kind {
            EventKind::SystemPrompt { prompt, .. } => {
                if !instructions.is_empty() {
                    instructions.push('\n');
                }
                instructions.push_str(prompt);
            }
            EventKind::Message { content } => {
                let role = match event.source {
                    EventSource::User => "user",
                    _ => "assistant",
                };
                let text = content
                    .iter()
                    .filter_map(ContentBlock::as_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                input.push(ResponsesInputItem::Message { role: role.to_string(), content: text });
            }
            EventKind::MicroagentActivation { name, trigger } => {
                input.push(ResponsesInputItem::Message {
                    role: "system".to_string(),
                    content: format!("[microagent '{name}' activated by trigger '{trigger}']"),
                });
            }
            EventKind::Observation { call_id, content, .. } => {
                input.push(ResponsesInputItem::FunctionCallOutput {
                    call_id: call_id.clone(),
                    output: content.clone(),
                });
            }
            EventKind::RejectedObservation { call_id, reason } => {
                input.push(ResponsesInputItem::FunctionCallOutput {
                    call_id: call_id.clone(),
                    output: format!("rejected: {reason}"),
                });
            }
            // Action events themselves are not re-sent; the provider already
            // knows about its own prior function calls via `previous_response_id`.
            EventKind::Action { .. }
            | EventKind::Condensation { .. }
            | EventKind::Pause
            | EventKind::Rejection { .. }
            | EventKind::AgentError { .. }
            | EventKind::AgentFinished => {}
        }
    }
    (instructions, input)
}
