//! The Agent-facing read-only view: events with condensed ranges applied.
//! The Agent never mutates this; it is rebuilt from the store each turn.

use crate::event::{Event, EventStore};

/// A derived, read-only sequence of events. Produced by applying every
/// `Condensation` event to the raw log via `EventStore::view_for_llm`.
#[derive(Debug, Clone)]
pub struct View {
    events: Vec<Event>,
}

impl View {
    pub fn materialize(store: &EventStore) -> Self {
        Self { events: store.view_for_llm() }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[test]
    fn materialize_reflects_current_store_contents() {
        let mut store = EventStore::new();
        store.append(Event::user_message("hi")).unwrap();
        let view = View::materialize(&store);
        assert_eq!(view.len(), 1);
    }
}
