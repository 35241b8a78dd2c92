//! CDD Dictionary - Refreshable dictionary core
//!
//! The in-memory dictionary the service answers from: an atomically swapped
//! snapshot of defaults and per-study overrides, the refresh/expiry state
//! machine that keeps the snapshot fresh, and the resolver that applies
//! override precedence per study.

pub mod cache;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod testutil;

pub use cache::{MAX_CONSECUTIVE_FAILURES, MetadataCache};
pub use service::{ALTERED_DEFAULT_STUDIES, DictionaryService};
pub use snapshot::DictionarySnapshot;
