//! CDD Graphite - SPARQL metadata source
//!
//! This crate provides the [`ClinicalAttributeSource`] trait the dictionary
//! core consumes, plus the [`GraphiteSource`] implementation that queries the
//! Graphite knowledge base over its SPARQL HTTP endpoint.

mod bindings;
pub mod graphite;
pub mod source;

pub use graphite::{GraphiteConfig, GraphiteSource};
pub use source::{ClinicalAttributeSource, SourceError};
