//! Agent lifecycle state machine (spec.md §2 C1, §4.1).
//!
//! Owns the current [`State`], validates transitions against the DAG in
//! [`State::can_transition_to`], and arbitrates the single execution slot
//! via a non-reentrant try-lock (`execMu` in spec.md) so concurrent
//! `execute` calls observe [`AgentError::Busy`] instead of queueing silently.

use std::sync::{Arc, Mutex};

use neuron_types::event::{Event, EventPayload};
use neuron_types::{AgentError, EventBus, State};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Holder for the single execution slot; dropping it releases the lock.
pub struct ExecGuard(#[allow(dead_code)] OwnedMutexGuard<()>);

/// The state machine for one agent instance.
pub struct StateMachine {
    agent_id: String,
    state: Mutex<State>,
    exec_mu: Arc<AsyncMutex<()>>,
    events: Option<Arc<dyn EventBus>>,
}

impl StateMachine {
    /// Build a new machine starting in [`State::Init`].
    #[must_use]
    pub fn new(agent_id: impl Into<String>, events: Option<Arc<dyn EventBus>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            state: Mutex::new(State::Init),
            exec_mu: Arc::new(AsyncMutex::new(())),
            events,
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }

    /// Attempt `self.state() -> to`, publishing `state.changed` on success.
    /// Event-publish failure is non-fatal: the transition itself already
    /// committed by the time the event is fired.
    pub async fn transition(&self, to: State) -> Result<(), AgentError> {
        let from = {
            let mut guard = self.state.lock().unwrap();
            let from = *guard;
            if !from.can_transition_to(to) {
                return Err(AgentError::InvalidTransition { from, to });
            }
            *guard = to;
            from
        };

        if let Some(events) = &self.events {
            events
                .publish(Event::new(
                    "state.changed",
                    self.agent_id.clone(),
                    EventPayload::StateChanged { from, to },
                ))
                .await;
        }

        Ok(())
    }

    /// Require [`State::Ready`], the only state `execute` may start from.
    pub fn ensure_ready(&self) -> Result<(), AgentError> {
        let state = self.state();
        if state == State::Ready {
            Ok(())
        } else {
            Err(AgentError::NotReady(state))
        }
    }

    /// Unconditionally set the state, bypassing [`State::can_transition_to`].
    /// Used by checkpoint rollback, which restores the agent to a version's
    /// recorded state regardless of the normal lifecycle DAG.
    pub async fn force_state(&self, to: State) {
        let from = {
            let mut guard = self.state.lock().unwrap();
            let from = *guard;
            *guard = to;
            from
        };

        if let Some(events) = &self.events {
            events
                .publish(Event::new(
                    "state.changed",
                    self.agent_id.clone(),
                    EventPayload::StateChanged { from, to },
                ))
                .await;
        }
    }

    /// Attempt to acquire the single execution slot without waiting. Returns
    /// [`AgentError::Busy`] if another call already holds it.
    pub fn try_lock_exec(&self) -> Result<ExecGuard, AgentError> {
        self.exec_mu
            .clone()
            .try_lock_owned()
            .map(ExecGuard)
            .map_err(|_| AgentError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuron_events::InMemoryEventBus;

    #[tokio::test]
    async fn init_can_only_reach_ready() {
        let sm = StateMachine::new("a1", None);
        assert!(sm.transition(State::Running).await.is_err());
        assert!(sm.transition(State::Ready).await.is_ok());
        assert_eq!(sm.state(), State::Ready);
    }

    #[tokio::test]
    async fn ensure_ready_rejects_non_ready_states() {
        let sm = StateMachine::new("a1", None);
        assert!(sm.ensure_ready().is_err());
        sm.transition(State::Ready).await.unwrap();
        assert!(sm.ensure_ready().is_ok());
    }

    #[tokio::test]
    async fn exec_lock_is_non_reentrant() {
        let sm = StateMachine::new("a1", None);
        let guard = sm.try_lock_exec().unwrap();
        assert!(sm.try_lock_exec().is_err());
        drop(guard);
        assert!(sm.try_lock_exec().is_ok());
    }

    #[tokio::test]
    async fn transition_publishes_state_changed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (_id, mut rx) = bus.subscribe("state.changed").await;
        let sm = StateMachine::new("a1", Some(bus.clone()));
        sm.transition(State::Ready).await.unwrap();
        let event = rx.try_recv().expect("event published");
        assert_eq!(event.topic, "state.changed");
    }
}
