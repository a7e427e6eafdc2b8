//! Error types for capacity ledger operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::model::{CounsellorId, LeadId};

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// A counsellor row.
    Counsellor,
    /// A student lead row.
    Lead,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counsellor => f.write_str("counsellor"),
            Self::Lead => f.write_str("lead"),
        }
    }
}

/// Errors produced by the stores, the ledger, and the assignment coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    /// Missing or malformed caller input; nothing was mutated.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Referenced record is absent, or no row matched an update/delete.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Which table was searched.
        entity: Entity,
        /// Identifier that did not match.
        id: u64,
    },
    /// Assignment would push the counsellor past its maximum capacity.
    #[error("counsellor {counsellor_id} has reached maximum capacity ({max_capacity})")]
    CapacityExceeded {
        /// Counsellor that is full.
        counsellor_id: CounsellorId,
        /// Its configured maximum.
        max_capacity: u32,
    },
    /// Operation conflicts with current state (e.g. deleting a counsellor with leads).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Utilization requested for a counsellor whose capacity is zero.
    #[error("counsellor {0} has zero capacity; utilization is undefined")]
    ZeroCapacity(CounsellorId),
    /// Caller cancelled the operation; the transaction was rolled back.
    #[error("operation cancelled")]
    Cancelled,
    /// Caller deadline elapsed; the transaction was rolled back.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
    /// Storage backend failure with context.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CapacityError {
    /// Counsellor not found.
    #[must_use]
    pub const fn counsellor_not_found(id: CounsellorId) -> Self {
        Self::NotFound {
            entity: Entity::Counsellor,
            id,
        }
    }

    /// Lead not found.
    #[must_use]
    pub const fn lead_not_found(id: LeadId) -> Self {
        Self::NotFound {
            entity: Entity::Lead,
            id,
        }
    }
}

/// Result alias for ledger operations.
pub type CapacityResult<T> = Result<T, CapacityError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
