//! Human-in-the-loop approval types (spec.md §2 C9, §4.9).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::DurationMs;

/// Disposition of an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// Approved.
    Approved,
    /// Rejected.
    Rejected,
    /// Timed out before any disposition arrived.
    TimedOut,
    /// Cancelled by the requester before any disposition arrived.
    Cancelled,
}

/// A pending or resolved request for human sign-off on some action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique id for this request.
    pub id: String,
    /// Agent requesting approval.
    pub agent_id: String,
    /// Human-readable description of the action awaiting approval.
    pub action: String,
    /// Arbitrary structured detail (e.g. the tool call under review).
    pub detail: HashMap<String, serde_json::Value>,
    /// Current status.
    pub status: ApprovalStatus,
    /// How long to wait before resolving to [`ApprovalStatus::TimedOut`].
    pub timeout: DurationMs,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Resolution timestamp, set once `status` leaves `Pending`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Build a new pending request.
    #[must_use]
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, action: impl Into<String>, timeout: DurationMs) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            action: action.into(),
            detail: HashMap::new(),
            status: ApprovalStatus::Pending,
            timeout,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// A human's decision on an [`ApprovalRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    /// The request being resolved.
    pub approval_id: String,
    /// Whether the action is approved.
    pub approved: bool,
    /// Optional free-text rationale.
    pub reason: String,
}
