//! Conversation state: the event log plus the control-plane flags the
//! driver reads at every loop boundary.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventStore;
use crate::metrics::Metrics;

/// Control-plane flags flipped from any thread without requiring an async
/// runtime handle: they live behind a plain `std::sync::Mutex` inside
/// `ConversationState` rather than requiring the caller to hold an `&mut`
/// reference or drive a channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ControlFlags {
    pub paused: bool,
    pub confirmation_mode: bool,
    pub waiting_for_confirmation: bool,
}

/// The durable, mutable-only-through-one-driver-thread state of a single
/// conversation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: Uuid,
    pub events: EventStore,
    pub finished: bool,
    #[serde(with = "flags_serde")]
    flags: Arc<Mutex<ControlFlags>>,
    pub iteration: u32,
    pub max_iteration_per_run: u32,
    pub active_microagents: Vec<String>,
    /// Provider-side continuation id for the responses path.
    pub continuation_handle: Option<String>,
    /// The id of the last event submitted on a responses-path turn, so the
    /// next continuation turn sends only the delta.
    pub last_responses_submitted_event_id: Option<Uuid>,
    pub metrics: Metrics,
}

/// `Mutex<ControlFlags>` isn't `Serialize`/`Deserialize` directly; persist
/// the snapshot and always write back `paused = false` so a reloaded
/// conversation never resumes already paused.
mod flags_serde {
    use super::ControlFlags;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::sync::{Arc, Mutex};

    pub fn serialize<S: Serializer>(flags: &Arc<Mutex<ControlFlags>>, s: S) -> Result<S::Ok, S::Error> {
        let mut snapshot = *flags.lock().expect("control flags mutex poisoned");
        snapshot.paused = false;
        snapshot.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Arc<Mutex<ControlFlags>>, D::Error> {
        let flags = ControlFlags::deserialize(d)?;
        Ok(Arc::new(Mutex::new(flags)))
    }
}

/// A cheap, cloneable handle to a conversation's control flags, usable to
/// request a pause from any thread while the driver's step loop runs on its
/// own thread.
#[derive(Clone)]
pub struct PauseHandle(Arc<Mutex<ControlFlags>>);

impl PauseHandle {
    pub fn request_pause(&self) {
        self.0.lock().expect("control flags mutex poisoned").paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.0.lock().expect("control flags mutex poisoned").paused
    }
}

impl ConversationState {
    pub fn new(max_iteration_per_run: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            events: EventStore::new(),
            finished: false,
            flags: Arc::new(Mutex::new(ControlFlags::default())),
            iteration: 0,
            max_iteration_per_run,
            active_microagents: Vec::new(),
            continuation_handle: None,
            last_responses_submitted_event_id: None,
            metrics: Metrics::new(),
        }
    }

    /// Flip the paused flag. Callable from any thread; observed at the next
    /// loop boundary.
    pub fn request_pause(&self) {
        self.flags.lock().expect("control flags mutex poisoned").paused = true;
    }

    pub fn resume(&self) {
        self.flags.lock().expect("control flags mutex poisoned").paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.flags.lock().expect("control flags mutex poisoned").paused
    }

    pub fn set_confirmation_mode(&self, enabled: bool) {
        self.flags.lock().expect("control flags mutex poisoned").confirmation_mode = enabled;
    }

    pub fn confirmation_mode(&self) -> bool {
        self.flags.lock().expect("control flags mutex poisoned").confirmation_mode
    }

    pub fn set_waiting_for_confirmation(&self, waiting: bool) {
        self.flags.lock().expect("control flags mutex poisoned").waiting_for_confirmation = waiting;
    }

    pub fn waiting_for_confirmation(&self) -> bool {
        self.flags.lock().expect("control flags mutex poisoned").waiting_for_confirmation
    }

    pub fn flags_snapshot(&self) -> ControlFlags {
        *self.flags.lock().expect("control flags mutex poisoned")
    }

    /// A cloneable handle for requesting a pause from another thread.
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle(self.flags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_unpaused_and_not_confirming() {
        let state = ConversationState::new(50);
        assert!(!state.is_paused());
        assert!(!state.confirmation_mode());
        assert!(!state.waiting_for_confirmation());
    }

    #[test]
    fn request_pause_is_observed_and_resume_clears_it() {
        let state = ConversationState::new(50);
        state.request_pause();
        assert!(state.is_paused());
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn pause_handle_is_observed_from_a_different_owner() {
        let state = ConversationState::new(50);
        let handle = state.pause_handle();
        handle.request_pause();
        assert!(state.is_paused());
        assert!(handle.is_paused());
    }

    #[test]
    fn round_trip_serialization_forces_paused_false() {
        let state = ConversationState::new(50);
        state.request_pause();
        state.set_confirmation_mode(true);
        let json = serde_json::to_string(&state).unwrap();
        let reloaded: ConversationState = serde_json::from_str(&json).unwrap();
        assert!(!reloaded.is_paused());
        assert!(reloaded.confirmation_mode());
    }
}
