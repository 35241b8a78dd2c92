//! Error types for the clinical data dictionary.

use thiserror::Error;

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Errors surfaced by dictionary lookups and refreshes.
#[derive(Clone, Debug, Error)]
pub enum DictionaryError {
    /// The metadata source could not be reached or answered with garbage.
    #[error("clinical attribute metadata source unavailable: {0}")]
    SourceUnavailable(String),

    /// The cached dictionary has expired and could not be rebuilt.
    #[error("clinical attribute metadata cache is invalid")]
    CacheInvalid,

    /// No overrides are known for the named cancer study.
    #[error("cancer study not found: {0}")]
    StudyNotFound(String),

    /// One or more column headers have no metadata.
    #[error("clinical attribute not found: {}", .names.join(", "))]
    AttributeNotFound { names: Vec<String> },
}

impl DictionaryError {
    /// Builds an [`DictionaryError::AttributeNotFound`] from any collection
    /// of column headers.
    pub fn attribute_not_found<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AttributeNotFound {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this error means the caller asked for something that does not
    /// exist, as opposed to the dictionary being unable to answer at all.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::StudyNotFound(_) | Self::AttributeNotFound { .. }
        )
    }

    /// Maps the error to an HTTP status code.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SourceUnavailable(_) | Self::CacheInvalid => 503,
            Self::StudyNotFound(_) | Self::AttributeNotFound { .. } => 404,
        }
    }
}
