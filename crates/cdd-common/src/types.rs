//! Core types for the clinical data dictionary.

use serde::{Deserialize, Serialize};

/// Normalize a column header for use as a lookup key.
///
/// Column headers are case-insensitive throughout the dictionary. Every map
/// key and every incoming lookup goes through this one function so the rest
/// of the code can compare keys directly.
#[must_use]
pub fn normalize_column_header(column_header: &str) -> String {
    column_header.to_uppercase()
}

/// Metadata for one clinical attribute (a column in a clinical data file).
///
/// Default records carry every descriptive field and no `study_id`. Override
/// records always carry `study_id` and `column_header`, plus whichever
/// descriptive fields the override actually redefines; the rest stay unset
/// and are omitted from serialized output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalAttributeMetadata {
    pub column_header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<String>,
    /// String-encoded integer; higher values sort earlier in consuming UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Present only on study override records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,
}

impl ClinicalAttributeMetadata {
    /// Creates a fully-populated default record. The column header is kept
    /// verbatim; normalization happens where map keys and lookups are formed.
    #[must_use]
    pub fn new(
        column_header: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        datatype: impl Into<String>,
        attribute_type: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            column_header: column_header.into(),
            display_name: Some(display_name.into()),
            description: Some(description.into()),
            datatype: Some(datatype.into()),
            attribute_type: Some(attribute_type.into()),
            priority: Some(priority.into()),
            study_id: None,
        }
    }

    /// Returns a copy of this record with the priority replaced.
    #[must_use]
    pub fn with_priority(&self, priority: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.priority = Some(priority.into());
        copy
    }
}

/// A cancer study known to the dictionary by way of at least one override.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancerStudy {
    pub name: String,
}

impl CancerStudy {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
