//! Immutable dictionary snapshots.

use std::collections::HashMap;

use cdd_common::{ClinicalAttributeMetadata, normalize_column_header};

/// One internally consistent view of the dictionary.
///
/// A snapshot bundles the defaults map and the overrides map so readers can
/// never observe one without the other. It is built off to the side during a
/// refresh and installed with a single pointer swap.
#[derive(Debug)]
pub struct DictionarySnapshot {
    /// Normalized column header to default record.
    attributes: HashMap<String, ClinicalAttributeMetadata>,
    /// Study id to (normalized column header to override record).
    overrides: HashMap<String, HashMap<String, ClinicalAttributeMetadata>>,
    version: u64,
}

impl DictionarySnapshot {
    /// Builds a snapshot from freshly fetched datasets. Map keys are
    /// normalized here; the records themselves keep their source form.
    #[must_use]
    pub fn build(
        attributes: Vec<ClinicalAttributeMetadata>,
        overrides: HashMap<String, Vec<ClinicalAttributeMetadata>>,
        version: u64,
    ) -> Self {
        let attributes = attributes
            .into_iter()
            .map(|record| (normalize_column_header(&record.column_header), record))
            .collect();
        let overrides = overrides
            .into_iter()
            .map(|(study_id, records)| {
                let keyed = records
                    .into_iter()
                    .map(|record| (normalize_column_header(&record.column_header), record))
                    .collect();
                (study_id, keyed)
            })
            .collect();
        Self {
            attributes,
            overrides,
            version,
        }
    }

    /// Looks up the default record for a column header, case-insensitively.
    #[must_use]
    pub fn attribute(&self, column_header: &str) -> Option<&ClinicalAttributeMetadata> {
        self.attributes.get(&normalize_column_header(column_header))
    }

    /// Looks up a study's override record for a column header.
    #[must_use]
    pub fn override_for(
        &self,
        study_id: &str,
        column_header: &str,
    ) -> Option<&ClinicalAttributeMetadata> {
        self.overrides
            .get(study_id)?
            .get(&normalize_column_header(column_header))
    }

    /// Whether the study has any overrides. Presence here is what makes a
    /// study known to the dictionary; there is no separate registry.
    #[must_use]
    pub fn has_study(&self, study_id: &str) -> bool {
        self.overrides.contains_key(study_id)
    }

    /// Normalized column headers of every default record, in map order.
    pub fn column_headers(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Ids of every study with at least one override, in map order.
    pub fn study_ids(&self) -> impl Iterator<Item = &str> {
        self.overrides.keys().map(String::as_str)
    }

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn study_count(&self) -> usize {
        self.overrides.len()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the datasets in their source shape, for persistence.
    #[must_use]
    pub fn to_datasets(
        &self,
    ) -> (
        Vec<ClinicalAttributeMetadata>,
        HashMap<String, Vec<ClinicalAttributeMetadata>>,
    ) {
        let attributes = self.attributes.values().cloned().collect();
        let overrides = self
            .overrides
            .iter()
            .map(|(study_id, records)| (study_id.clone(), records.values().cloned().collect()))
            .collect();
        (attributes, overrides)
    }
}
