//! Core capacity accounting: records, storage seam, ledger, and coordinator.

pub mod audit;
pub mod context;
pub mod coordinator;
pub mod counsellors;
pub mod error;
pub mod leads;
pub mod ledger;
pub mod model;
pub mod stats;
pub mod store;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use context::{CancelHandle, RequestContext};
pub use coordinator::{AssignmentCoordinator, AssignmentOutcome, Release};
pub use counsellors::CounsellorStore;
pub use error::{AppResult, CapacityError, CapacityResult, Entity};
pub use leads::LeadStore;
pub use ledger::CapacityLedger;
pub use model::{
    ApplicationStatus, Counsellor, CounsellorId, CounsellorUpdate, FeeStatus, Lead, LeadId,
    NewCounsellor, NewLead, DEFAULT_MAX_CAPACITY,
};
pub use stats::{CounsellorDetail, CounsellorStats, CounsellorSummary, LedgerDrift, StatsAggregator};
pub use store::{CounsellorRow, Storage, Transaction};
