//! Metadata source abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use cdd_common::ClinicalAttributeMetadata;
use thiserror::Error;

/// Errors a metadata source can return.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached or answered with a failure status.
    #[error("metadata source unavailable: {0}")]
    Unavailable(String),

    /// The request timed out.
    #[error("metadata source request timed out")]
    Timeout,

    /// The response arrived but could not be decoded.
    #[error("malformed metadata source response: {0}")]
    Malformed(String),

    /// The source is misconfigured.
    #[error("source configuration error: {0}")]
    Configuration(String),
}

/// A queryable home for clinical attribute metadata.
///
/// Implementations always return whole datasets: the complete set of default
/// attribute records, and the complete per-study override map. Incremental
/// fetches are not part of the contract; the dictionary core replaces its
/// state wholesale on every successful fetch.
#[async_trait]
pub trait ClinicalAttributeSource: Send + Sync {
    /// Fetches every published default attribute record.
    async fn fetch_attributes(&self) -> Result<Vec<ClinicalAttributeMetadata>, SourceError>;

    /// Fetches every published override record, grouped by study id.
    async fn fetch_overrides(
        &self,
    ) -> Result<HashMap<String, Vec<ClinicalAttributeMetadata>>, SourceError>;

    /// Name of this source for logs.
    fn name(&self) -> &str;
}
