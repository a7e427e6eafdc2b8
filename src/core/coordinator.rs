//! Assignment coordinator: atomic, capacity-bounded lead assignment.
//!
//! Every operation runs in one storage transaction:
//!
//! 1. lock the lead row,
//! 2. lock the counsellor rows involved, lowest id first,
//! 3. check capacity against the locked counsellor row,
//! 4. move the lead reference and the ledger counts together,
//! 5. commit.
//!
//! The counsellor row lock serializes concurrent assignments to the same
//! counsellor, so two callers can never both claim its last slot. The ledger's
//! conditional update re-checks the bound as part of the write itself. Any
//! early return drops the transaction, which discards its staged writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::context::RequestContext;
use crate::core::leads::LeadStore;
use crate::core::ledger::CapacityLedger;
use crate::core::model::{Counsellor, CounsellorId, LeadId};
use crate::core::store::{Storage, Transaction};
use crate::core::{CapacityError, CapacityResult};
use crate::util::clock::now_ms;

/// Result of a successful [`AssignmentCoordinator::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    /// The lead now references the counsellor.
    Assigned {
        /// Assigned lead.
        lead_id: LeadId,
        /// Counsellor that gained the lead.
        counsellor_id: CounsellorId,
        /// Counsellor that lost the lead, for reassignments.
        previous_counsellor_id: Option<CounsellorId>,
    },
    /// The lead already referenced the counsellor; nothing changed.
    AlreadyAssigned {
        /// Lead.
        lead_id: LeadId,
        /// Its current counsellor.
        counsellor_id: CounsellorId,
    },
}

/// Result of [`AssignmentCoordinator::unassign`] and [`AssignmentCoordinator::remove_lead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Lead that was detached or removed.
    pub lead_id: LeadId,
    /// Counsellor whose slot was freed; `None` if the lead was unassigned.
    pub previous_counsellor_id: Option<CounsellorId>,
}

/// Sole writer of lead references and their ledger counts.
#[derive(Clone)]
pub struct AssignmentCoordinator {
    storage: Arc<dyn Storage>,
    leads: LeadStore,
    ledger: CapacityLedger,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AssignmentCoordinator {
    /// Create a coordinator over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            leads: LeadStore::new(Arc::clone(&storage)),
            storage,
            ledger: CapacityLedger,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Assign `lead_id` to `counsellor_id` if the counsellor has a free slot.
    ///
    /// A lead that already belongs to another counsellor is moved, and that
    /// counsellor's slot is released in the same transaction.
    ///
    /// # Errors
    ///
    /// - [`CapacityError::InvalidInput`] for zero ids
    /// - [`CapacityError::NotFound`] when the lead or counsellor is absent
    /// - [`CapacityError::CapacityExceeded`] when the counsellor is full
    /// - [`CapacityError::Cancelled`] / [`CapacityError::TimedOut`] from `ctx`
    /// - [`CapacityError::Storage`] on backend failure
    ///
    /// In every error case no record is changed.
    pub async fn assign(
        &self,
        ctx: &RequestContext,
        lead_id: LeadId,
        counsellor_id: CounsellorId,
    ) -> CapacityResult<AssignmentOutcome> {
        if lead_id == 0 || counsellor_id == 0 {
            return Err(CapacityError::InvalidInput(
                "lead id and counsellor id are required".into(),
            ));
        }
        let result = ctx.run(self.assign_in_tx(lead_id, counsellor_id)).await;
        match &result {
            Ok(AssignmentOutcome::Assigned {
                previous_counsellor_id,
                ..
            }) => {
                let action = if previous_counsellor_id.is_some() {
                    AuditAction::Reassign
                } else {
                    AuditAction::Assign
                };
                tracing::info!(lead_id, counsellor_id, ?previous_counsellor_id, "lead assigned");
                self.record(action, lead_id, Some(counsellor_id), *previous_counsellor_id, None);
            }
            Ok(AssignmentOutcome::AlreadyAssigned { .. }) => {
                tracing::debug!(lead_id, counsellor_id, "lead already assigned");
            }
            Err(e @ CapacityError::CapacityExceeded { .. }) => {
                tracing::warn!(lead_id, counsellor_id, "assignment rejected: {e}");
                self.record(
                    AuditAction::Reject,
                    lead_id,
                    Some(counsellor_id),
                    None,
                    Some(e.to_string()),
                );
            }
            Err(e) => Self::log_failure("assign", lead_id, e),
        }
        result
    }

    /// Detach a lead from its counsellor, freeing one slot.
    ///
    /// Unassigning a lead that has no counsellor succeeds without changes.
    ///
    /// # Errors
    ///
    /// [`CapacityError::InvalidInput`] for a zero id,
    /// [`CapacityError::NotFound`] when the lead is absent, plus the
    /// cancellation and storage errors of [`Self::assign`].
    pub async fn unassign(&self, ctx: &RequestContext, lead_id: LeadId) -> CapacityResult<Release> {
        require_lead_id(lead_id)?;
        let result = ctx.run(self.release_in_tx(lead_id, false)).await;
        match &result {
            Ok(Release {
                previous_counsellor_id: Some(prev),
                ..
            }) => {
                tracing::info!(lead_id, counsellor_id = *prev, "lead unassigned");
                self.record(AuditAction::Unassign, lead_id, None, Some(*prev), None);
            }
            Ok(_) => tracing::debug!(lead_id, "lead was not assigned"),
            Err(e) => Self::log_failure("unassign", lead_id, e),
        }
        result
    }

    /// Delete a lead, releasing its counsellor's slot in the same transaction.
    ///
    /// # Errors
    ///
    /// Same as [`Self::unassign`].
    pub async fn remove_lead(&self, ctx: &RequestContext, lead_id: LeadId) -> CapacityResult<Release> {
        require_lead_id(lead_id)?;
        let result = ctx.run(self.release_in_tx(lead_id, true)).await;
        match &result {
            Ok(release) => {
                tracing::info!(lead_id, previous = ?release.previous_counsellor_id, "lead removed");
                self.record(AuditAction::Remove, lead_id, None, release.previous_counsellor_id, None);
            }
            Err(e) => Self::log_failure("remove_lead", lead_id, e),
        }
        result
    }

    async fn assign_in_tx(
        &self,
        lead_id: LeadId,
        counsellor_id: CounsellorId,
    ) -> CapacityResult<AssignmentOutcome> {
        let mut tx = self.storage.begin().await?;
        let lead = tx
            .lock_lead(lead_id)
            .await?
            .ok_or(CapacityError::lead_not_found(lead_id))?;
        let previous = lead.counselor_id;
        if previous == Some(counsellor_id) {
            tx.rollback().await?;
            return Ok(AssignmentOutcome::AlreadyAssigned {
                lead_id,
                counsellor_id,
            });
        }

        let (target, previous_row) = lock_pair(tx.as_mut(), counsellor_id, previous).await?;
        let target = target.ok_or(CapacityError::counsellor_not_found(counsellor_id))?;
        if !target.has_capacity() {
            return Err(CapacityError::CapacityExceeded {
                counsellor_id,
                max_capacity: target.max_capacity,
            });
        }

        let now = now_ms();
        self.leads
            .set_counsellor(tx.as_mut(), lead_id, Some(counsellor_id), now)
            .await?;
        self.ledger
            .adjust(tx.as_mut(), counsellor_id, target.max_capacity, 1, now)
            .await?;
        self.release_slot(tx.as_mut(), lead_id, previous, previous_row, now)
            .await?;
        tx.commit().await?;

        Ok(AssignmentOutcome::Assigned {
            lead_id,
            counsellor_id,
            previous_counsellor_id: previous,
        })
    }

    async fn release_in_tx(&self, lead_id: LeadId, delete: bool) -> CapacityResult<Release> {
        let mut tx = self.storage.begin().await?;
        let lead = tx
            .lock_lead(lead_id)
            .await?
            .ok_or(CapacityError::lead_not_found(lead_id))?;
        let previous = lead.counselor_id;
        if previous.is_none() && !delete {
            tx.rollback().await?;
            return Ok(Release {
                lead_id,
                previous_counsellor_id: None,
            });
        }

        let previous_row = match previous {
            Some(id) => tx.lock_counsellor(id).await?,
            None => None,
        };
        let now = now_ms();
        if delete {
            if tx.delete_lead(lead_id).await? == 0 {
                return Err(CapacityError::lead_not_found(lead_id));
            }
        } else {
            self.leads
                .set_counsellor(tx.as_mut(), lead_id, None, now)
                .await?;
        }
        self.release_slot(tx.as_mut(), lead_id, previous, previous_row, now)
            .await?;
        tx.commit().await?;

        Ok(Release {
            lead_id,
            previous_counsellor_id: previous,
        })
    }

    async fn release_slot(
        &self,
        tx: &mut dyn Transaction,
        lead_id: LeadId,
        previous: Option<CounsellorId>,
        previous_row: Option<Counsellor>,
        now: u128,
    ) -> CapacityResult<()> {
        match (previous, previous_row) {
            (_, Some(row)) => {
                self.ledger
                    .adjust(tx, row.id, row.max_capacity, -1, now)
                    .await
            }
            (Some(dangling), None) => {
                tracing::warn!(
                    lead_id,
                    counsellor_id = dangling,
                    "lead referenced a counsellor that no longer exists"
                );
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn record(
        &self,
        action: AuditAction,
        lead_id: LeadId,
        counsellor_id: Option<CounsellorId>,
        previous: Option<CounsellorId>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(
                action,
                lead_id,
                counsellor_id,
                previous,
                detail,
            ));
        }
    }

    fn log_failure(op: &str, lead_id: LeadId, err: &CapacityError) {
        match err {
            CapacityError::Storage(_) => {
                tracing::error!(op, lead_id, error = %err, "ledger operation failed; rolled back");
            }
            CapacityError::Cancelled | CapacityError::TimedOut(_) => {
                tracing::warn!(op, lead_id, error = %err, "ledger operation abandoned; rolled back");
            }
            _ => tracing::debug!(op, lead_id, error = %err, "ledger operation refused"),
        }
    }
}

fn require_lead_id(lead_id: LeadId) -> CapacityResult<()> {
    if lead_id == 0 {
        return Err(CapacityError::InvalidInput("lead id is required".into()));
    }
    Ok(())
}

/// Lock the target counsellor and the lead's previous counsellor, lowest id first.
async fn lock_pair(
    tx: &mut dyn Transaction,
    target: CounsellorId,
    previous: Option<CounsellorId>,
) -> CapacityResult<(Option<Counsellor>, Option<Counsellor>)> {
    match previous {
        None => Ok((tx.lock_counsellor(target).await?, None)),
        Some(prev) if prev < target => {
            let prev_row = tx.lock_counsellor(prev).await?;
            Ok((tx.lock_counsellor(target).await?, prev_row))
        }
        Some(prev) => {
            let target_row = tx.lock_counsellor(target).await?;
            Ok((target_row, tx.lock_counsellor(prev).await?))
        }
    }
}
