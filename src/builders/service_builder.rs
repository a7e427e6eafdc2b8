//! Builders to construct the capacity service from configuration.
//!
//! The process entry point owns the storage handle; every component receives
//! a clone of the same `Arc<dyn Storage>`.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::core::{
    AssignmentCoordinator, AuditSink, CapacityError, CapacityResult, CounsellorStore,
    InMemoryAuditSink, LeadStore, StatsAggregator, Storage,
};
use crate::infra::InMemoryStorage;

/// All components wired to one storage handle.
#[derive(Clone)]
pub struct CounsellorService {
    /// Counsellor CRUD.
    pub counsellors: CounsellorStore,
    /// Lead registration and lookup.
    pub leads: LeadStore,
    /// Capacity-bounded assignment.
    pub coordinator: AssignmentCoordinator,
    /// Read views.
    pub stats: StatsAggregator,
    /// Audit buffer, when enabled.
    pub audit: Option<Arc<InMemoryAuditSink>>,
}

/// Open the storage described by `cfg`: journal-backed when a journal is
/// configured, volatile otherwise.
///
/// # Errors
///
/// [`CapacityError::Storage`] if the journal cannot be opened or replayed.
pub fn build_storage(cfg: &ServiceConfig) -> CapacityResult<Arc<dyn Storage>> {
    match &cfg.journal {
        Some(journal) => Ok(Arc::new(InMemoryStorage::open_journal(
            &journal.dir,
            &journal.stream,
        )?)),
        None => Ok(Arc::new(InMemoryStorage::new())),
    }
}

/// Wire every component to `storage` according to `cfg`.
///
/// # Errors
///
/// [`CapacityError::InvalidInput`] if `cfg` does not validate.
pub fn build_service(
    cfg: &ServiceConfig,
    storage: Arc<dyn Storage>,
) -> CapacityResult<CounsellorService> {
    cfg.validate()
        .map_err(|e| CapacityError::InvalidInput(format!("config invalid: {e}")))?;

    let audit = (cfg.audit_capacity > 0)
        .then(|| Arc::new(InMemoryAuditSink::new(cfg.audit_capacity)));
    let mut coordinator = AssignmentCoordinator::new(Arc::clone(&storage));
    if let Some(sink) = &audit {
        coordinator = coordinator.with_audit(Arc::clone(sink) as Arc<dyn AuditSink>);
    }

    Ok(CounsellorService {
        counsellors: CounsellorStore::new(Arc::clone(&storage), cfg.default_max_capacity),
        leads: LeadStore::new(Arc::clone(&storage)),
        coordinator,
        stats: StatsAggregator::new(storage),
        audit,
    })
}
