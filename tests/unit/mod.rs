//! Unit tests for individual components

mod audit_test;
mod config_test;
mod error_test;
mod journal_test;
mod memory_store_test;
