//! Audit trail for assignment decisions.
//!
//! Every accepted or rejected ledger mutation is recorded so that a counsellor's
//! `assigned_count` history can be replayed when investigating ledger drift.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::model::{CounsellorId, LeadId};
use crate::util::clock::now_ms;

/// What happened to a lead's counsellor reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Unassigned lead attached to a counsellor.
    Assign,
    /// Lead moved from one counsellor to another.
    Reassign,
    /// Assignment refused because the counsellor was full.
    Reject,
    /// Lead detached from its counsellor.
    Unassign,
    /// Lead deleted, releasing its slot.
    Remove,
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Action taken.
    pub action: AuditAction,
    /// Lead whose reference changed (or would have).
    pub lead_id: LeadId,
    /// Counsellor the lead now references, or the target of a rejected assignment.
    pub counsellor_id: Option<CounsellorId>,
    /// Counsellor the lead referenced before the change.
    pub previous_counsellor_id: Option<CounsellorId>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink with a bounded buffer; oldest events are evicted first.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events touching one lead, oldest first.
    #[must_use]
    pub fn events_for_lead(&self, lead_id: LeadId) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.lead_id == lead_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event stamped with a fresh id and the current time.
#[must_use]
pub fn build_audit_event(
    action: AuditAction,
    lead_id: LeadId,
    counsellor_id: Option<CounsellorId>,
    previous_counsellor_id: Option<CounsellorId>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        action,
        lead_id,
        counsellor_id,
        previous_counsellor_id,
        created_at_ms: now_ms(),
        detail,
    }
}
