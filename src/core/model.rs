//! Typed records for counsellors and student leads.

use serde::{Deserialize, Serialize};

/// Counsellor identifier allocated by storage.
pub type CounsellorId = u64;
/// Lead identifier allocated by storage.
pub type LeadId = u64;

/// Capacity assigned to new counsellors when the caller omits one.
pub const DEFAULT_MAX_CAPACITY: u32 = 10;

/// A counsellor row with its capacity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counsellor {
    /// Unique identifier.
    pub id: CounsellorId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone; may be empty.
    pub phone: String,
    /// Maximum number of leads this counsellor may hold at once.
    pub max_capacity: u32,
    /// Cached number of leads currently referencing this counsellor.
    pub assigned_count: u32,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Last update timestamp in milliseconds since epoch.
    pub updated_at_ms: u128,
}

impl Counsellor {
    /// Whether one more lead fits under `max_capacity`.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.assigned_count < self.max_capacity
    }

    /// Unused slots; never negative.
    #[must_use]
    pub const fn available_slots(&self) -> u32 {
        self.max_capacity.saturating_sub(self.assigned_count)
    }
}

/// Fields accepted when creating a counsellor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCounsellor {
    /// Display name (required).
    #[serde(default)]
    pub name: String,
    /// Contact email (required).
    #[serde(default)]
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: String,
    /// Requested capacity; missing or non-positive falls back to the configured default.
    #[serde(default)]
    pub max_capacity: Option<i64>,
}

/// Full replacement of a counsellor's editable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounsellorUpdate {
    /// Counsellor to update.
    #[serde(default)]
    pub id: CounsellorId,
    /// New display name.
    #[serde(default)]
    pub name: String,
    /// New email.
    #[serde(default)]
    pub email: String,
    /// New phone.
    #[serde(default)]
    pub phone: String,
    /// New capacity; must be positive and not below the current assigned count.
    #[serde(default)]
    pub max_capacity: i64,
}

/// Fee payment state for a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    /// Not yet paid.
    #[default]
    Pending,
    /// Paid in full.
    Paid,
    /// Fee waived.
    Waived,
}

/// Application progress for a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Fresh lead, nothing started.
    #[default]
    New,
    /// Application being prepared.
    InProgress,
    /// Application submitted.
    Submitted,
    /// Offer made.
    Accepted,
    /// Application declined.
    Rejected,
}

/// A student lead row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier.
    pub id: LeadId,
    /// Student name.
    pub name: String,
    /// Student email.
    pub email: String,
    /// Student phone.
    pub phone: String,
    /// Highest education reported.
    pub education: String,
    /// Where the lead came from.
    pub lead_source: String,
    /// Owning counsellor; `None` while unassigned.
    pub counselor_id: Option<CounsellorId>,
    /// Registration fee state.
    pub registration_fee_status: FeeStatus,
    /// Course fee state.
    pub course_fee_status: FeeStatus,
    /// Application state.
    pub application_status: ApplicationStatus,
    /// Scheduled interview, milliseconds since epoch.
    pub interview_scheduled_at_ms: Option<u128>,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Last update timestamp in milliseconds since epoch.
    pub updated_at_ms: u128,
}

/// Fields accepted when registering a lead. Leads always start unassigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewLead {
    /// Student name (required).
    pub name: String,
    /// Student email.
    pub email: String,
    /// Student phone.
    pub phone: String,
    /// Highest education reported.
    pub education: String,
    /// Where the lead came from.
    pub lead_source: String,
    /// Registration fee state.
    pub registration_fee_status: FeeStatus,
    /// Course fee state.
    pub course_fee_status: FeeStatus,
    /// Application state.
    pub application_status: ApplicationStatus,
    /// Scheduled interview, milliseconds since epoch.
    pub interview_scheduled_at_ms: Option<u128>,
}
