//! Storage seam shared by the stores, the ledger, and the coordinator.
//!
//! Reads on [`Storage`] always observe committed state and are re-fetched on
//! every call. All writes go through a [`Transaction`], which stages them until
//! [`Transaction::commit`] publishes them at once. Dropping a transaction
//! without committing is a rollback.
//!
//! Row locks taken by [`Transaction::lock_counsellor`] and
//! [`Transaction::lock_lead`] are exclusive and held until the transaction
//! ends. Callers lock at most one lead first, then counsellors in ascending id
//! order; every transaction in this crate follows that order so lock waits
//! cannot form a cycle.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::model::{Counsellor, CounsellorId, Lead, LeadId, NewCounsellor, NewLead};
use crate::core::CapacityResult;

/// Row-level values written when inserting a counsellor.
#[derive(Debug, Clone)]
pub struct CounsellorRow {
    /// Validated fields from the caller.
    pub fields: NewCounsellor,
    /// Effective capacity after defaulting.
    pub max_capacity: u32,
    /// Timestamp stamped on both `created_at_ms` and `updated_at_ms`.
    pub now_ms: u128,
}

/// Relational data store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch a committed counsellor row.
    async fn get_counsellor(&self, id: CounsellorId) -> CapacityResult<Option<Counsellor>>;
    /// All committed counsellors ordered by name, then id.
    async fn list_counsellors(&self) -> CapacityResult<Vec<Counsellor>>;
    /// Fetch a committed lead row.
    async fn get_lead(&self, id: LeadId) -> CapacityResult<Option<Lead>>;
    /// Leads referencing a counsellor, newest first.
    async fn list_leads_by_counsellor(&self, id: CounsellorId) -> CapacityResult<Vec<Lead>>;
    /// Live number of leads referencing a counsellor.
    async fn count_leads(&self, id: CounsellorId) -> CapacityResult<u64>;
    /// Live lead counts for every counsellor with at least one lead.
    async fn live_lead_counts(&self) -> CapacityResult<HashMap<CounsellorId, u64>>;
    /// Open a transaction.
    async fn begin(&self) -> CapacityResult<Box<dyn Transaction>>;
}

/// All-or-nothing unit of work against a [`Storage`].
#[async_trait]
pub trait Transaction: Send {
    /// Lock a counsellor row and read it as this transaction sees it.
    async fn lock_counsellor(&mut self, id: CounsellorId) -> CapacityResult<Option<Counsellor>>;
    /// Lock a lead row and read it as this transaction sees it.
    async fn lock_lead(&mut self, id: LeadId) -> CapacityResult<Option<Lead>>;
    /// Number of leads referencing a counsellor, including staged writes.
    async fn count_leads(&mut self, id: CounsellorId) -> CapacityResult<u64>;

    /// Insert a counsellor with `assigned_count = 0`, returning its id.
    async fn insert_counsellor(&mut self, row: CounsellorRow) -> CapacityResult<CounsellorId>;
    /// Replace a counsellor row that was locked by this transaction.
    /// Returns the number of rows affected.
    async fn update_counsellor(&mut self, row: Counsellor) -> CapacityResult<u64>;
    /// Delete a counsellor row. Returns the number of rows affected.
    async fn delete_counsellor(&mut self, id: CounsellorId) -> CapacityResult<u64>;

    /// Insert an unassigned lead, returning its id.
    async fn insert_lead(&mut self, lead: NewLead, now_ms: u128) -> CapacityResult<LeadId>;
    /// Overwrite a lead's counsellor reference. Returns the number of rows affected.
    async fn set_lead_counsellor(
        &mut self,
        id: LeadId,
        counsellor: Option<CounsellorId>,
        now_ms: u128,
    ) -> CapacityResult<u64>;
    /// Delete a lead row. Returns the number of rows affected.
    async fn delete_lead(&mut self, id: LeadId) -> CapacityResult<u64>;

    /// Conditionally add `delta` to a counsellor's `assigned_count`.
    ///
    /// Applies only when the result stays within `0..=max_capacity`; otherwise
    /// nothing changes and zero rows are reported.
    async fn adjust_assigned(
        &mut self,
        id: CounsellorId,
        delta: i32,
        now_ms: u128,
    ) -> CapacityResult<u64>;

    /// Publish every staged write atomically and release row locks.
    async fn commit(self: Box<Self>) -> CapacityResult<()>;
    /// Discard staged writes and release row locks.
    async fn rollback(self: Box<Self>) -> CapacityResult<()>;
}
