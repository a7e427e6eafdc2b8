//! Builders that assemble the service from configuration.

pub mod service_builder;

pub use service_builder::{build_service, build_storage, CounsellorService};
