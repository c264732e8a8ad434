//! Human-in-the-loop approval subsystem (spec.md §2 C9, §4.9).
//!
//! Each pending request gets exactly one [`tokio::sync::oneshot`] channel, so
//! whichever of approve/reject/timeout/cancel reaches it first wins and every
//! later disposition attempt observes [`ApprovalError::AlreadyResolved`].

use std::collections::HashMap;
use std::sync::Mutex;

use std::sync::Arc;

use async_trait::async_trait;
use neuron_types::approval::{ApprovalRequest, ApprovalResponse, ApprovalStatus};
use neuron_types::duration::DurationMs;
use neuron_types::event::{Event, EventPayload};
use neuron_types::{AgentError, ApprovalError, ApprovalStore, EventBus};
use tokio::sync::oneshot;

/// In-memory [`ApprovalStore`].
#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: Mutex<HashMap<String, ApprovalRequest>>,
}

impl InMemoryApprovalStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn create(&self, request: ApprovalRequest) -> Result<(), AgentError> {
        self.requests.lock().unwrap().insert(request.id.clone(), request);
        Ok(())
    }

    async fn resolve(&self, response: ApprovalResponse) -> Result<(), ApprovalError> {
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .get_mut(&response.approval_id)
            .ok_or_else(|| ApprovalError::NotFound(response.approval_id.clone()))?;
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyResolved(response.approval_id));
        }
        request.status = if response.approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        request.resolved_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_status(&self, id: &str, status: ApprovalStatus) -> Result<(), ApprovalError> {
        let mut requests = self.requests.lock().unwrap();
        let request = requests.get_mut(id).ok_or_else(|| ApprovalError::NotFound(id.to_owned()))?;
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyResolved(id.to_owned()));
        }
        request.status = status;
        request.resolved_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ApprovalRequest, ApprovalError> {
        self.requests
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ApprovalError::NotFound(id.to_owned()))
    }
}

/// Outcome of waiting on an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// A human approved the request.
    Approved,
    /// A human rejected the request.
    Rejected,
    /// `timeout` elapsed with no disposition.
    TimedOut,
    /// [`ApprovalCoordinator::cancel`] was called before a disposition arrived.
    Cancelled,
}

type Waiter = (oneshot::Sender<ApprovalOutcome>, Option<oneshot::Receiver<ApprovalOutcome>>);

/// Drives the request -> wait -> resolve lifecycle over an [`ApprovalStore`].
pub struct ApprovalCoordinator {
    store: Arc<dyn ApprovalStore>,
    events: Option<Arc<dyn EventBus>>,
    waiters: Mutex<HashMap<String, Waiter>>,
}

impl ApprovalCoordinator {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self {
            store,
            events: None,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap a store, publishing `ApprovalRequested`/`ApprovalResponded` events as requests resolve.
    #[must_use]
    pub fn with_events(store: Arc<dyn ApprovalStore>, events: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            events: Some(events),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Create a pending request, returning its id. Pair with [`Self::wait`].
    pub async fn request(&self, agent_id: &str, action: &str, timeout: DurationMs) -> Result<String, AgentError> {
        let id = uuid_like_id();
        let request = ApprovalRequest::new(id.clone(), agent_id, action, timeout);
        self.store.create(request).await?;
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().insert(id.clone(), (tx, Some(rx)));
        if let Some(events) = &self.events {
            events
                .publish(Event::new(
                    "approval.requested",
                    agent_id,
                    EventPayload::ApprovalRequested { approval_id: id.clone(), action: action.to_owned() },
                ))
                .await;
        }
        Ok(id)
    }

    /// Await `id`'s resolution or `timeout`, whichever comes first.
    pub async fn wait(&self, id: &str, timeout: DurationMs) -> ApprovalOutcome {
        let rx = match self.waiters.lock().unwrap().get_mut(id).and_then(|(_, rx)| rx.take()) {
            Some(rx) => rx,
            None => return ApprovalOutcome::Cancelled,
        };
        match tokio::time::timeout(timeout.to_std(), rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                let _ = self.store.mark_status(id, ApprovalStatus::Cancelled).await;
                ApprovalOutcome::Cancelled
            }
            Err(_) => {
                self.waiters.lock().unwrap().remove(id);
                let _ = self.store.mark_status(id, ApprovalStatus::TimedOut).await;
                ApprovalOutcome::TimedOut
            }
        }
    }

    /// Create a pending request and await its resolution or `timeout`, whichever comes first.
    pub async fn request_and_wait(&self, agent_id: &str, action: &str, timeout: DurationMs) -> Result<ApprovalOutcome, AgentError> {
        let id = self.request(agent_id, action, timeout).await?;
        Ok(self.wait(&id, timeout).await)
    }

    /// Apply a human's decision, waking whoever is waiting on it. Only the
    /// first call for a given request id has any effect.
    pub async fn respond(&self, response: ApprovalResponse) -> Result<(), ApprovalError> {
        let approved = response.approved;
        let id = response.approval_id.clone();
        self.store.resolve(response).await?;
        if let Some((tx, _)) = self.waiters.lock().unwrap().remove(&id) {
            let _ = tx.send(if approved { ApprovalOutcome::Approved } else { ApprovalOutcome::Rejected });
        }
        if let Some(events) = &self.events {
            events
                .publish(Event::new("approval.responded", "", EventPayload::ApprovalResponded { approval_id: id, approved }))
                .await;
        }
        Ok(())
    }

    /// Cancel a still-pending request, waking its waiter with [`ApprovalOutcome::Cancelled`].
    pub async fn cancel(&self, id: &str) {
        if let Some((tx, _)) = self.waiters.lock().unwrap().remove(id) {
            let _ = tx.send(ApprovalOutcome::Cancelled);
        }
        let _ = self.store.mark_status(id, ApprovalStatus::Cancelled).await;
    }
}

fn uuid_like_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("appr-{nanos:x}")
}
