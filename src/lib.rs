//! # Counsellor Capacity
//!
//! Capacity-bounded assignment of student leads to admission counsellors.
//!
//! Every counsellor has a `max_capacity` and a cached `assigned_count`. This
//! crate guarantees that, outside an in-flight transaction,
//! `0 <= assigned_count <= max_capacity` and that `assigned_count` equals the
//! number of leads referencing the counsellor, even when many callers assign
//! leads to the same counsellor at once.
//!
//! ## Components
//!
//! - **Storage seam** ([`core::Storage`], [`core::Transaction`]): row locks,
//!   staged writes, atomic commit. [`infra::InMemoryStorage`] implements it,
//!   optionally journaled to disk.
//! - **Counsellor / lead stores**: record CRUD.
//! - **Capacity ledger**: the only writer of `assigned_count`.
//! - **Assignment coordinator**: lock, check, mutate, commit.
//! - **Stats aggregator**: free slots, utilization, ledger drift.
//! - **API** ([`runtime::CounsellorApi`]): JSON in, status + payload out.
//!
//! ```rust,ignore
//! use counsellor_capacity::config::ServiceConfig;
//! use counsellor_capacity::runtime::bootstrap_with;
//!
//! let api = bootstrap_with(&ServiceConfig::default())?;
//! let ctx = api.context();
//! let created = api
//!     .create_counsellor(&ctx, r#"{"name":"Asha","email":"asha@example.com","max_capacity":2}"#)
//!     .await;
//! let lead = api.create_lead(&ctx, r#"{"name":"Ravi"}"#).await;
//! let assigned = api
//!     .assign_lead(&ctx, r#"{"lead_id":1,"counsellor_id":1}"#)
//!     .await;
//! assert_eq!(assigned.status, 200);
//! ```
//!
//! For complete scenarios, see `tests/assignment_flow_test.rs` and
//! `tests/concurrency_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Records, storage seam, ledger, coordinator, and stats.
pub mod core;
/// Configuration models.
pub mod config;
/// Builders that wire components to storage.
pub mod builders;
/// Storage backends.
pub mod infra;
/// API surface and process-edge bootstrap.
pub mod runtime;
/// Shared utilities.
pub mod util;
