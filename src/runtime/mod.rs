//! Process-edge wiring and the in-process API surface.

pub mod api;

pub use api::{
    status_for, ApiResponse, AssignLeadRequest, AssignmentResult, CounsellorApi, CounsellorRef,
    CounsellorsView, CreatedCounsellor, LeadRef, UnassignLeadRequest,
};

use anyhow::Context;

use crate::builders::{build_service, build_storage};
use crate::config::ServiceConfig;
use crate::core::AppResult;
use crate::util::telemetry::init_tracing;

/// Read configuration from the environment (and `.env`), install tracing,
/// open storage, and build the API.
///
/// # Errors
///
/// Fails on invalid configuration or when storage cannot be opened.
pub fn bootstrap() -> AppResult<CounsellorApi> {
    init_tracing("counsellor_capacity=info");
    let cfg = ServiceConfig::from_env().context("loading service configuration")?;
    bootstrap_with(&cfg)
}

/// Build the API from an explicit configuration.
///
/// # Errors
///
/// Fails when storage cannot be opened or the configuration is invalid.
pub fn bootstrap_with(cfg: &ServiceConfig) -> AppResult<CounsellorApi> {
    let storage = build_storage(cfg).context("opening storage")?;
    let service = build_service(cfg, storage).context("wiring service")?;
    tracing::info!(
        default_max_capacity = cfg.default_max_capacity,
        journaled = cfg.journal.is_some(),
        "counsellor capacity service ready"
    );
    Ok(CounsellorApi::new(service, cfg.op_timeout()))
}
