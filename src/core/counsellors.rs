//! Counsellor records: create, read, edit, and delete.
//!
//! Capacity edits and deletion take the counsellor's row lock, the same lock
//! the assignment coordinator holds while it checks and moves the ledger, so
//! neither can slip between an in-flight assignment's check and its commit.

use std::sync::Arc;

use crate::core::model::{
    Counsellor, CounsellorId, CounsellorUpdate, NewCounsellor, DEFAULT_MAX_CAPACITY,
};
use crate::core::store::{CounsellorRow, Storage};
use crate::core::{CapacityError, CapacityResult};
use crate::util::clock::now_ms;

/// Counsellor store over the shared storage seam.
#[derive(Clone)]
pub struct CounsellorStore {
    storage: Arc<dyn Storage>,
    default_max_capacity: u32,
}

impl CounsellorStore {
    /// Create a store that defaults missing capacities to `default_max_capacity`.
    ///
    /// A zero default is replaced by [`DEFAULT_MAX_CAPACITY`].
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, default_max_capacity: u32) -> Self {
        let default_max_capacity = if default_max_capacity == 0 {
            DEFAULT_MAX_CAPACITY
        } else {
            default_max_capacity
        };
        Self {
            storage,
            default_max_capacity,
        }
    }

    /// Capacity used when a caller supplies `requested`.
    ///
    /// Missing or non-positive requests fall back to the default; requests
    /// beyond `u32::MAX` saturate.
    #[must_use]
    pub fn effective_capacity(&self, requested: Option<i64>) -> u32 {
        match requested {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => self.default_max_capacity,
        }
    }

    /// Fetch one counsellor.
    ///
    /// # Errors
    ///
    /// [`CapacityError::NotFound`] if absent; storage failures otherwise.
    pub async fn get(&self, id: CounsellorId) -> CapacityResult<Counsellor> {
        self.storage
            .get_counsellor(id)
            .await?
            .ok_or(CapacityError::counsellor_not_found(id))
    }

    /// All counsellors by name ascending.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list(&self) -> CapacityResult<Vec<Counsellor>> {
        self.storage.list_counsellors().await
    }

    /// Create a counsellor with an empty ledger and return its id.
    ///
    /// # Errors
    ///
    /// [`CapacityError::InvalidInput`] when name or email is blank.
    pub async fn create(&self, fields: NewCounsellor) -> CapacityResult<CounsellorId> {
        if fields.name.trim().is_empty() || fields.email.trim().is_empty() {
            return Err(CapacityError::InvalidInput(
                "name and email are required".into(),
            ));
        }
        let max_capacity = self.effective_capacity(fields.max_capacity);
        let mut tx = self.storage.begin().await?;
        let id = tx
            .insert_counsellor(CounsellorRow {
                fields,
                max_capacity,
                now_ms: now_ms(),
            })
            .await?;
        tx.commit().await?;
        tracing::info!(counsellor_id = id, max_capacity, "counsellor created");
        Ok(id)
    }

    /// Replace a counsellor's profile fields and capacity.
    ///
    /// # Errors
    ///
    /// [`CapacityError::InvalidInput`] for a zero id, blank name/email, or a
    /// non-positive capacity; [`CapacityError::NotFound`] when no row matches;
    /// [`CapacityError::Conflict`] when the new capacity is below the number
    /// of leads the counsellor already holds.
    pub async fn update(&self, update: CounsellorUpdate) -> CapacityResult<()> {
        if update.id == 0 {
            return Err(CapacityError::InvalidInput(
                "counsellor id is required".into(),
            ));
        }
        if update.name.trim().is_empty() || update.email.trim().is_empty() {
            return Err(CapacityError::InvalidInput(
                "name and email are required".into(),
            ));
        }
        let max_capacity = match u32::try_from(update.max_capacity) {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(CapacityError::InvalidInput(format!(
                    "max_capacity must be between 1 and {}",
                    u32::MAX
                )))
            }
        };

        let mut tx = self.storage.begin().await?;
        let current = tx
            .lock_counsellor(update.id)
            .await?
            .ok_or(CapacityError::counsellor_not_found(update.id))?;
        if max_capacity < current.assigned_count {
            return Err(CapacityError::Conflict(format!(
                "max_capacity {max_capacity} is below {} assigned leads",
                current.assigned_count
            )));
        }
        let rows = tx
            .update_counsellor(Counsellor {
                name: update.name,
                email: update.email,
                phone: update.phone,
                max_capacity,
                updated_at_ms: now_ms(),
                ..current
            })
            .await?;
        if rows == 0 {
            return Err(CapacityError::counsellor_not_found(update.id));
        }
        tx.commit().await?;
        tracing::info!(counsellor_id = update.id, max_capacity, "counsellor updated");
        Ok(())
    }

    /// Delete a counsellor that no lead references.
    ///
    /// The guard uses the live reference count, not the cached
    /// `assigned_count`.
    ///
    /// # Errors
    ///
    /// [`CapacityError::NotFound`] when absent; [`CapacityError::Conflict`]
    /// while any lead references it.
    pub async fn delete(&self, id: CounsellorId) -> CapacityResult<()> {
        let mut tx = self.storage.begin().await?;
        let current = tx
            .lock_counsellor(id)
            .await?
            .ok_or(CapacityError::counsellor_not_found(id))?;
        let live = tx.count_leads(id).await?;
        if live > 0 {
            return Err(CapacityError::Conflict(format!(
                "cannot delete counsellor with {live} assigned leads"
            )));
        }
        if current.assigned_count > 0 {
            tracing::warn!(
                counsellor_id = id,
                cached = current.assigned_count,
                "deleting counsellor whose cached assigned_count drifted from zero live leads"
            );
        }
        if tx.delete_counsellor(id).await? == 0 {
            return Err(CapacityError::counsellor_not_found(id));
        }
        tx.commit().await?;
        tracing::info!(counsellor_id = id, "counsellor deleted");
        Ok(())
    }
}
