//! Tests for audit sink

use counsellor_capacity::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    sink.record(build_audit_event(AuditAction::Assign, 1, Some(4), None, None));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Assign);
    assert_eq!(events[0].lead_id, 1);
    assert_eq!(events[0].counsellor_id, Some(4));
    assert!(!events[0].event_id.is_empty());
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    sink.record(build_audit_event(AuditAction::Assign, 1, Some(1), None, None));
    sink.record(build_audit_event(AuditAction::Assign, 2, Some(1), None, None));
    sink.record(build_audit_event(AuditAction::Unassign, 1, None, Some(1), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].lead_id, 2); // oldest evicted
    assert_eq!(events[1].action, AuditAction::Unassign);
}

#[test]
fn test_zero_capacity_sink_records_nothing() {
    let sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(AuditAction::Remove, 9, None, None, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_events_for_lead_filters() {
    let sink = InMemoryAuditSink::new(8);
    sink.record(build_audit_event(AuditAction::Assign, 1, Some(1), None, None));
    sink.record(build_audit_event(AuditAction::Assign, 2, Some(1), None, None));
    sink.record(build_audit_event(AuditAction::Reassign, 1, Some(2), Some(1), None));

    let history = sink.events_for_lead(1);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].previous_counsellor_id, Some(1));
}

#[test]
fn test_event_ids_are_unique() {
    let a = build_audit_event(AuditAction::Reject, 1, Some(1), None, Some("full".into()));
    let b = build_audit_event(AuditAction::Reject, 1, Some(1), None, Some("full".into()));
    assert_ne!(a.event_id, b.event_id);
    assert_eq!(a.detail.as_deref(), Some("full"));
}
