//! Lead records. This store never checks capacity; the coordinator does.

use std::sync::Arc;

use crate::core::model::{CounsellorId, Lead, LeadId, NewLead};
use crate::core::store::{Storage, Transaction};
use crate::core::{CapacityError, CapacityResult};
use crate::util::clock::now_ms;

/// Lead store over the shared storage seam.
#[derive(Clone)]
pub struct LeadStore {
    storage: Arc<dyn Storage>,
}

impl LeadStore {
    /// Create a lead store.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Register an unassigned lead and return its id.
    ///
    /// # Errors
    ///
    /// [`CapacityError::InvalidInput`] when the name is blank.
    pub async fn create(&self, lead: NewLead) -> CapacityResult<LeadId> {
        if lead.name.trim().is_empty() {
            return Err(CapacityError::InvalidInput("lead name is required".into()));
        }
        let mut tx = self.storage.begin().await?;
        let id = tx.insert_lead(lead, now_ms()).await?;
        tx.commit().await?;
        tracing::info!(lead_id = id, "lead registered");
        Ok(id)
    }

    /// Fetch one lead.
    ///
    /// # Errors
    ///
    /// [`CapacityError::NotFound`] if absent.
    pub async fn get(&self, id: LeadId) -> CapacityResult<Lead> {
        self.storage
            .get_lead(id)
            .await?
            .ok_or(CapacityError::lead_not_found(id))
    }

    /// Leads referencing a counsellor, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_by_counsellor(&self, id: CounsellorId) -> CapacityResult<Vec<Lead>> {
        self.storage.list_leads_by_counsellor(id).await
    }

    /// Overwrite a lead's counsellor reference inside `tx`, stamping its update time.
    pub(crate) async fn set_counsellor(
        &self,
        tx: &mut dyn Transaction,
        lead_id: LeadId,
        counsellor: Option<CounsellorId>,
        now_ms: u128,
    ) -> CapacityResult<()> {
        match tx.set_lead_counsellor(lead_id, counsellor, now_ms).await? {
            0 => Err(CapacityError::lead_not_found(lead_id)),
            _ => Ok(()),
        }
    }
}
