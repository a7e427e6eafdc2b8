//! Capacity ledger: the only writer of `assigned_count`.
//!
//! Adjustments are applied through the caller's open transaction so that the
//! count moves together with the lead reference change it accounts for.

use crate::core::model::CounsellorId;
use crate::core::store::Transaction;
use crate::core::{CapacityError, CapacityResult};

/// Keeps each counsellor's cached `assigned_count` in step with lead references.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityLedger;

impl CapacityLedger {
    /// Apply `delta` to `counsellor_id`'s assigned count inside `tx`.
    ///
    /// The write is conditional on the result staying within
    /// `0..=max_capacity`. A refused increment means the counsellor is full; a
    /// refused decrement means the cache had already drifted below the live
    /// reference count.
    pub(crate) async fn adjust(
        self,
        tx: &mut dyn Transaction,
        counsellor_id: CounsellorId,
        max_capacity: u32,
        delta: i32,
        now_ms: u128,
    ) -> CapacityResult<()> {
        let rows = tx.adjust_assigned(counsellor_id, delta, now_ms).await?;
        if rows > 0 {
            tracing::debug!(counsellor_id, delta, "ledger adjusted");
            return Ok(());
        }
        if delta > 0 {
            return Err(CapacityError::CapacityExceeded {
                counsellor_id,
                max_capacity,
            });
        }
        tracing::error!(
            counsellor_id,
            delta,
            "ledger refused decrement; assigned_count already below live lead count"
        );
        Err(CapacityError::Storage(format!(
            "ledger drift on counsellor {counsellor_id}: cannot apply {delta}"
        )))
    }
}
