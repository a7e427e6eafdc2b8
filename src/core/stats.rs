//! Read-only capacity views: free slots, utilization, and ledger reconciliation.
//!
//! The aggregator trusts nothing cached across requests; every call re-reads
//! storage. Where a cached `assigned_count` disagrees with the live number of
//! referencing leads, the disagreement is logged as ledger drift and reported
//! alongside the row, but it never blocks the read.
//!
//! The counsellor row and its live lead count are separate reads, so a commit
//! landing between them can surface as a one-off drift warning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::model::{Counsellor, CounsellorId, Lead};
use crate::core::store::Storage;
use crate::core::{CapacityError, CapacityResult};

/// Derived capacity figures for one counsellor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounsellorStats {
    /// Counsellor id.
    pub id: CounsellorId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Cached active lead count.
    pub assigned_count: u32,
    /// Configured maximum.
    pub max_capacity: u32,
    /// `max_capacity - assigned_count`, never negative.
    pub available_slots: u32,
    /// `assigned_count / max_capacity * 100`.
    pub utilization: f64,
}

impl CounsellorStats {
    /// Compute stats for `counsellor`.
    ///
    /// # Errors
    ///
    /// [`CapacityError::ZeroCapacity`] when `max_capacity` is zero, rather than
    /// reporting an infinite or NaN utilization.
    pub fn from_counsellor(counsellor: &Counsellor) -> CapacityResult<Self> {
        if counsellor.max_capacity == 0 {
            return Err(CapacityError::ZeroCapacity(counsellor.id));
        }
        Ok(Self {
            id: counsellor.id,
            name: counsellor.name.clone(),
            email: counsellor.email.clone(),
            assigned_count: counsellor.assigned_count,
            max_capacity: counsellor.max_capacity,
            available_slots: counsellor.available_slots(),
            utilization: f64::from(counsellor.assigned_count) / f64::from(counsellor.max_capacity)
                * 100.0,
        })
    }
}

/// One row of the counsellor listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounsellorSummary {
    /// Capacity figures from the cached count.
    #[serde(flatten)]
    pub stats: CounsellorStats,
    /// Live number of leads referencing the counsellor.
    pub active_leads: u64,
    /// Whether the cached count disagreed with `active_leads`.
    pub ledger_drift: bool,
}

/// Counsellor stats plus every lead it currently holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounsellorDetail {
    /// Capacity figures.
    pub counsellor: CounsellorStats,
    /// Leads referencing the counsellor, newest first.
    pub leads: Vec<Lead>,
}

/// A counsellor whose cached count disagrees with its live lead count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDrift {
    /// Affected counsellor.
    pub counsellor_id: CounsellorId,
    /// Cached `assigned_count`.
    pub cached: u32,
    /// Leads actually referencing it.
    pub live: u64,
}

/// Builds read views from counsellor and lead rows.
#[derive(Clone)]
pub struct StatsAggregator {
    storage: Arc<dyn Storage>,
}

impl StatsAggregator {
    /// Create an aggregator over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Every counsellor by name, with live lead counts.
    ///
    /// # Errors
    ///
    /// [`CapacityError::ZeroCapacity`] if any row has zero capacity; storage
    /// failures otherwise.
    pub async fn list(&self) -> CapacityResult<Vec<CounsellorSummary>> {
        let counsellors = self.storage.list_counsellors().await?;
        let live = self.storage.live_lead_counts().await?;
        counsellors
            .iter()
            .map(|c| {
                let active_leads = live.get(&c.id).copied().unwrap_or(0);
                let ledger_drift = drifted(c, active_leads);
                Ok(CounsellorSummary {
                    stats: CounsellorStats::from_counsellor(c)?,
                    active_leads,
                    ledger_drift,
                })
            })
            .collect()
    }

    /// One counsellor's stats and leads.
    ///
    /// # Errors
    ///
    /// [`CapacityError::NotFound`] if absent, [`CapacityError::ZeroCapacity`]
    /// for a zero-capacity row.
    pub async fn detail(&self, id: CounsellorId) -> CapacityResult<CounsellorDetail> {
        let counsellor = self
            .storage
            .get_counsellor(id)
            .await?
            .ok_or(CapacityError::counsellor_not_found(id))?;
        let stats = CounsellorStats::from_counsellor(&counsellor)?;
        let leads = self.storage.list_leads_by_counsellor(id).await?;
        drifted(&counsellor, leads.len() as u64);
        Ok(CounsellorDetail {
            counsellor: stats,
            leads,
        })
    }

    /// Counsellors whose cached count differs from the live lead count.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn verify_ledger(&self) -> CapacityResult<Vec<LedgerDrift>> {
        let counsellors = self.storage.list_counsellors().await?;
        let live = self.storage.live_lead_counts().await?;
        let drift: Vec<LedgerDrift> = counsellors
            .iter()
            .filter_map(|c| {
                let live = live.get(&c.id).copied().unwrap_or(0);
                drifted(c, live).then_some(LedgerDrift {
                    counsellor_id: c.id,
                    cached: c.assigned_count,
                    live,
                })
            })
            .collect();
        if drift.is_empty() {
            tracing::debug!(counsellors = counsellors.len(), "ledger consistent");
        }
        Ok(drift)
    }
}

fn drifted(counsellor: &Counsellor, live: u64) -> bool {
    let drift = u64::from(counsellor.assigned_count) != live;
    if drift {
        tracing::warn!(
            counsellor_id = counsellor.id,
            cached = counsellor.assigned_count,
            live,
            "ledger drift: cached assigned_count differs from live lead count"
        );
    }
    drift
}
