//! CDD Common - Shared types and errors
//!
//! This crate provides the clinical attribute metadata model and the error
//! types used across all CDD components.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
