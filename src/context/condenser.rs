//! History condensation: replaces an old window of events with an
//! LLM-generated summary once the view outgrows a token/event budget.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventKind, EventSource, EventStore};
use crate::types::ContentBlock;

/// A pluggable strategy over the event view. `condense` may append a
/// `Condensation` event to `store`; it returns whether it did.
#[async_trait]
pub trait Condenser: Send + Sync {
    async fn condense(&self, store: &mut EventStore) -> Result<bool>;
}

/// Never modifies the view. Used in tests and when condensation is disabled.
pub struct NoOpCondenser;

#[async_trait]
impl Condenser for NoOpCondenser {
    async fn condense(&self, _store: &mut EventStore) -> Result<bool> {
        Ok(false)
    }
}

/// Produces a summary of an old event window via an LLM, the reference
/// condenser strategy.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, window_text: &str) -> Result<String>;
}

/// Summarizes the oldest removable window once `view_for_llm().len()`
/// exceeds `max_size`, always keeping the first `keep_first` events and
/// never splitting a half-open tool call across the covered range.
pub struct LlmSummarizingCondenser<S> {
    pub max_size: usize,
    pub keep_first: usize,
    summarizer: S,
    /// Raw log length as of the last successful condensation, for idempotency.
    last_condensed_at_len: Mutex<Option<usize>>,
}

impl<S: Summarizer> LlmSummarizingCondenser<S> {
    pub fn new(max_size: usize, keep_first: usize, summarizer: S) -> Self {
        Self { max_size, keep_first, summarizer, last_condensed_at_len: Mutex::new(None) }
    }

    fn eligible_window(&self, store: &EventStore) -> Vec<Event> {
        let hidden = store.hidden_ids();
        let unmatched = store.unmatched_action_call_ids();
        let visible: Vec<&Event> = store.snapshot().iter().filter(|e| !hidden.contains(&e.id)).collect();

        let window_size = (self.max_size / 2).max(1);
        visible
            .into_iter()
            .skip(self.keep_first)
            .filter(|e| match e.action_call_id() {
                Some(call_id) => !unmatched.iter().any(|c| c == call_id),
                None => true,
            })
            .take(window_size)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl<S: Summarizer + Send + Sync> Condenser for LlmSummarizingCondenser<S> {
    async fn condense(&self, store: &mut EventStore) -> Result<bool> {
        let view_len = store.view_for_llm().len();
        if view_len <= self.max_size {
            return Ok(false);
        }

        {
            let last = self.last_condensed_at_len.lock().expect("condenser mutex poisoned");
            if *last == Some(store.len()) {
                return Ok(false);
            }
        }

        let window = self.eligible_window(store);
        if window.is_empty() {
            return Ok(false);
        }

        let window_text = window
            .iter()
            .map(render_event_for_summary)
            .collect::<Vec<_>>()
            .join("\n");
        let summary = self.summarizer.summarize(&window_text).await?;

        let covers: Vec<uuid::Uuid> = window.iter().map(|e| e.id).collect();
        store.append(Event::new(EventSource::System, EventKind::Condensation { covers, summary }))?;

        *self.last_condensed_at_len.lock().expect("condenser mutex poisoned") = Some(store.len());
        Ok(true)
    }
}

fn render_event_for_summary(event: &Event) -> String {
    match &event.kind {
        EventKind::Message { content } => content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join(" "),
        EventKind::Action { tool_name, arguments, .. } => format!("called {tool_name}({arguments})"),
        EventKind::Observation { content, .. } => format!("-> {content}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, window_text: &str) -> Result<String> {
            Ok(format!("summary of: {window_text}"))
        }
    }

    fn filled_store(n: usize) -> EventStore {
        let mut store = EventStore::new();
        for i in 0..n {
            store.append(Event::user_message(format!("turn {i}"))).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn noop_condenser_never_changes_the_log() {
        let mut store = filled_store(20);
        let changed = NoOpCondenser.condense(&mut store).await.unwrap();
        assert!(!changed);
        assert_eq!(store.len(), 20);
    }

    #[tokio::test]
    async fn condenses_once_view_exceeds_max_size() {
        let mut store = filled_store(10);
        let condenser = LlmSummarizingCondenser::new(6, 2, EchoSummarizer);
        let changed = condenser.condense(&mut store).await.unwrap();
        assert!(changed);
        assert!(store.view_for_llm().len() < store.len());
    }

    #[tokio::test]
    async fn below_threshold_does_not_condense() {
        let mut store = filled_store(4);
        let condenser = LlmSummarizingCondenser::new(6, 2, EchoSummarizer);
        let changed = condenser.condense(&mut store).await.unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn second_call_with_no_growth_is_idempotent() {
        let mut store = filled_store(10);
        let condenser = LlmSummarizingCondenser::new(6, 2, EchoSummarizer);
        assert!(condenser.condense(&mut store).await.unwrap());
        let len_after_first = store.len();
        let changed_again = condenser.condense(&mut store).await.unwrap();
        assert!(!changed_again);
        assert_eq!(store.len(), len_after_first);
    }

    #[tokio::test]
    async fn never_covers_an_unmatched_action() {
        let mut store = EventStore::new();
        for i in 0..3 {
            store.append(Event::user_message(format!("turn {i}"))).unwrap();
        }
        let call_id = "pending_call".to_string();
        store
            .append(Event::new(
                EventSource::Agent,
                EventKind::Action {
                    tool_name: "bash".into(),
                    arguments: "{}".into(),
                    call_id: call_id.clone(),
                    batch_id: Uuid::new_v4(),
                    index_in_batch: 0,
                    reasoning_summary: None,
                    encrypted_reasoning: None,
                    risk_level: None,
                },
            ))
            .unwrap();
        for i in 0..6 {
            store.append(Event::user_message(format!("filler {i}"))).unwrap();
        }

        let condenser = LlmSummarizingCondenser::new(6, 0, EchoSummarizer);
        condenser.condense(&mut store).await.unwrap();

        let covered: Vec<Uuid> = store
            .snapshot()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Condensation { covers, .. } => Some(covers.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        let pending_event_id =
            store.snapshot().iter().find(|e| e.action_call_id() == Some(call_id.as_str())).unwrap().id;
        assert!(!covered.contains(&pending_event_id));
    }
}
