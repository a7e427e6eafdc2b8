//! Configuration models for the capacity service.

pub mod service;

pub use service::{
    JournalConfig, ServiceConfig, ENV_AUDIT_CAPACITY, ENV_DEFAULT_MAX_CAPACITY, ENV_JOURNAL_PATH,
    ENV_OP_TIMEOUT_MS,
};
