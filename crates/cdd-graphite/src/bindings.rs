//! JSON model for SPARQL `application/sparql-results+json` payloads.

use cdd_common::ClinicalAttributeMetadata;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<RowBinding>,
}

/// One result row. Each selected variable arrives as a `{"type": ...,
/// "value": ...}` object; variables the row leaves unbound are absent.
#[derive(Debug, Deserialize)]
pub(crate) struct RowBinding {
    pub study_id: Option<BoundValue>,
    pub column_header: Option<BoundValue>,
    pub display_name: Option<BoundValue>,
    pub attribute_type: Option<BoundValue>,
    pub datatype: Option<BoundValue>,
    pub description: Option<BoundValue>,
    pub priority: Option<BoundValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoundValue {
    pub value: String,
}

fn bound(value: &Option<BoundValue>) -> Option<String> {
    value.as_ref().map(|v| v.value.clone())
}

impl RowBinding {
    /// Maps a defaults-query row into a metadata record, binding each field
    /// only when the row carries it. Rows without a column header are
    /// unusable and map to `None`.
    pub(crate) fn into_attribute(self) -> Option<ClinicalAttributeMetadata> {
        let column_header = self.column_header.as_ref()?.value.clone();
        Some(ClinicalAttributeMetadata {
            column_header,
            display_name: bound(&self.display_name),
            description: bound(&self.description),
            datatype: bound(&self.datatype),
            attribute_type: bound(&self.attribute_type),
            priority: bound(&self.priority),
            study_id: None,
        })
    }

    /// Maps an overrides-query row, keyed by study id. Rows without a study
    /// id or a column header map to `None`.
    pub(crate) fn into_override(self) -> Option<(String, ClinicalAttributeMetadata)> {
        let study_id = self.study_id.as_ref()?.value.clone();
        let mut attribute = self.into_attribute()?;
        attribute.study_id = Some(study_id.clone());
        Some((study_id, attribute))
    }
}
