//! Storage backends.

pub mod journal;
pub mod memory;

pub use journal::{Journal, JournalEntry, Tables};
pub use memory::{InMemoryStorage, InMemoryTransaction};
