//! The event log: a discriminated, append-only, typed union with
//! deterministic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{ContentBlock, Message};

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    User,
    Agent,
    Environment,
    System,
}

/// Risk level assigned by a security analyzer to a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// The closed set of event kinds making up the conversation log.
///
/// Tagged with `kind` so a malformed or forward-incompatible record fails
/// loudly at `deserialize()` rather than being silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Free-form message from the user or the assistant.
    Message { content: Vec<ContentBlock> },

    /// An assistant-requested tool call.
    Action {
        tool_name: String,
        /// Arguments as a raw JSON string (provider-supplied, possibly malformed).
        arguments: String,
        call_id: String,
        batch_id: Uuid,
        index_in_batch: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encrypted_reasoning: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        risk_level: Option<RiskLevel>,
    },

    /// The result of executing an `Action` event, by call-id.
    Observation {
        call_id: String,
        content: String,
        is_error: bool,
    },

    /// A synthetic observation recorded when a pending action is rejected
    /// instead of executed.
    RejectedObservation { call_id: String, reason: String },

    /// The rendered system prompt and the tool specs active at turn start.
    SystemPrompt { prompt: String, tool_names: Vec<String> },

    /// A knowledge microagent was triggered by a keyword.
    MicroagentActivation { name: String, trigger: String },

    /// A range of earlier events [start_id, end_id] was replaced by a summary.
    Condensation { covers: Vec<Uuid>, summary: String },

    /// The conversation was paused.
    Pause,

    /// A batch of pending actions was rejected without execution.
    Rejection { reason: String },

    /// A terminal or recoverable error surfaced by the driver or agent.
    AgentError { kind: String, message: String },

    /// The agent emitted the distinguished finish signal.
    AgentFinished,
}

impl EventKind {
    /// A short, stable name for the variant (used in error messages and
    /// stuck-detection signatures).
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Message { .. } => "message",
            EventKind::Action { .. } => "action",
            EventKind::Observation { .. } => "observation",
            EventKind::RejectedObservation { .. } => "rejected_observation",
            EventKind::SystemPrompt { .. } => "system_prompt",
            EventKind::MicroagentActivation { .. } => "microagent_activation",
            EventKind::Condensation { .. } => "condensation",
            EventKind::Pause => "pause",
            EventKind::Rejection { .. } => "rejection",
            EventKind::AgentError { .. } => "agent_error",
            EventKind::AgentFinished => "agent_finished",
        }
    }
}

/// One entry in the conversation's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Construct a fully-formed event with an explicit id/timestamp. Prefer
    /// `EventStore::append`, which assigns both when absent.
    pub fn new(source: EventSource, kind: EventKind) -> Self {
        Self { id: Uuid::new_v4(), timestamp: Utc::now(), source, kind }
    }

    pub fn user_message(text: impl Into<String>) -> Self {
        Self::new(EventSource::User, EventKind::Message { content: vec![ContentBlock::text(text)] })
    }

    pub fn assistant_message(content: Vec<ContentBlock>) -> Self {
        Self::new(EventSource::Agent, EventKind::Message { content })
    }

    /// Whether this event counts as an `Action` awaiting a matching
    /// `Observation`/`RejectedObservation` with the given call id.
    pub fn action_call_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Action { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    pub fn observation_call_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Observation { call_id, .. } => Some(call_id),
            EventKind::RejectedObservation { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

/// The append-only, typed event log.
///
/// `EventStore` owns the durable sequence of `Event`s. `view_for_llm` derives
/// a read-only sequence with condensed ranges collapsed; it never mutates
/// the underlying log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning id/timestamp if absent and enforcing
    /// id-uniqueness and timestamp monotonicity.
    pub fn append(&mut self, mut event: Event) -> Result<&Event> {
        if self.events.iter().any(|e| e.id == event.id) {
            return Err(Error::DuplicateEventId(event.id));
        }
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        }
        self.events.push(event);
        Ok(self.events.last().unwrap())
    }

    /// Immutable view of every event in append order, including condensed ranges.
    pub fn snapshot(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The raw log with condensed ranges replaced by a single synthetic
    /// assistant message carrying the summary text.
    ///
    /// A `Condensation` event's `covers` set marks ids hidden from the LLM;
    /// the summary is inserted where the first hidden event used to be.
    pub fn view_for_llm(&self) -> Vec<Event> {
        let mut hidden: std::collections::HashMap<Uuid, String> = std::collections::HashMap::new();
        for e in &self.events {
            if let EventKind::Condensation { covers, summary } = &e.kind {
                for id in covers {
                    hidden.insert(*id, summary.clone());
                }
            }
        }
        if hidden.is_empty() {
            return self.events.clone();
        }

        let mut out = Vec::with_capacity(self.events.len());
        let mut emitted_summaries: std::collections::HashSet<String> = std::collections::HashSet::new();
        for e in &self.events {
            if matches!(e.kind, EventKind::Condensation { .. }) {
                out.push(e.clone());
                continue;
            }
            match hidden.get(&e.id) {
                Some(summary) => {
                    if emitted_summaries.insert(summary.clone()) {
                        out.push(Event::new(
                            EventSource::System,
                            EventKind::Message {
                                content: vec![ContentBlock::text(format!(
                                    "[condensed summary] {summary}"
                                ))],
                            },
                        ));
                    }
                }
                None => out.push(e.clone()),
            }
        }
        out
    }

    /// Ids of the events hidden by any `Condensation` event so far.
    pub fn hidden_ids(&self) -> std::collections::HashSet<Uuid> {
        let mut hidden = std::collections::HashSet::new();
        for e in &self.events {
            if let EventKind::Condensation { covers, .. } = &e.kind {
                hidden.extend(covers.iter().copied());
            }
        }
        hidden
    }

    /// The call-ids of every `Action` event that has no matching
    /// `Observation`/`RejectedObservation` yet.
    pub fn unmatched_action_call_ids(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for e in &self.events {
            if let Some(id) = e.action_call_id() {
                pending.push(id.to_string());
            }
            if let Some(id) = e.observation_call_id() {
                pending.retain(|c| c != id);
            }
        }
        pending
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(data: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        let store: EventStore = serde_json::from_value(value).map_err(|e| {
            if e.to_string().contains("unknown variant") {
                Error::UnknownEventKind(e.to_string())
            } else {
                Error::Json(e)
            }
        })?;
        Ok(store)
    }
}
