//! CDD Store - Persistent attribute store
//!
//! Two-region redb persistence for dictionary datasets: a live region
//! mirroring what the service currently serves, and a backup region written
//! on a slower schedule and read only when a cold start cannot reach the
//! metadata source.

pub mod store;
pub mod tables;

pub use store::{AttributeStore, Region, StoreError};
