//! Study-aware metadata resolution.

use std::collections::HashSet;
use std::sync::Arc;

use cdd_common::{CancerStudy, ClinicalAttributeMetadata, DictionaryError, Result};

use crate::cache::MetadataCache;
use crate::snapshot::DictionarySnapshot;

/// Studies that receive a copy of the default record with priority `"0"`
/// for any column they do not explicitly override.
pub const ALTERED_DEFAULT_STUDIES: [&str; 2] = ["mskimpact", "sclc_mskimpact_2017"];

/// Read facade over the cache: validates the request, then resolves every
/// requested column against a single snapshot.
///
/// Per-column precedence for a study:
/// 1. no study given: the default record;
/// 2. the study has an explicit override for the column: that record,
///    verbatim, with no merge against the default;
/// 3. the study is an altered-default study: a copy of the default record
///    with priority `"0"`;
/// 4. otherwise: the default record.
///
/// A column without a default record is unknown, even if some override
/// names it.
pub struct DictionaryService {
    cache: Arc<MetadataCache>,
    altered_default_studies: HashSet<String>,
}

impl DictionaryService {
    #[must_use]
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self {
            cache,
            altered_default_studies: ALTERED_DEFAULT_STUDIES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replaces the altered-default study set.
    #[must_use]
    pub fn with_altered_default_studies<I, S>(mut self, studies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.altered_default_studies = studies.into_iter().map(Into::into).collect();
        self
    }

    fn current_snapshot(&self) -> Result<Arc<DictionarySnapshot>> {
        self.cache.snapshot().ok_or(DictionaryError::CacheInvalid)
    }

    /// Resolves the given column headers for a study, preserving request
    /// order. The whole request fails if any column is unknown.
    pub fn resolve(
        &self,
        cancer_study: Option<&str>,
        column_headers: &[String],
    ) -> Result<Vec<ClinicalAttributeMetadata>> {
        let snapshot = self.current_snapshot()?;
        self.resolve_in(&snapshot, cancer_study, column_headers)
    }

    /// Resolves a single column header for a study.
    pub fn metadata_for_header(
        &self,
        cancer_study: Option<&str>,
        column_header: &str,
    ) -> Result<ClinicalAttributeMetadata> {
        let mut records = self.resolve(cancer_study, &[column_header.to_string()])?;
        Ok(records.remove(0))
    }

    /// Resolves every column in the dictionary for a study. The universe of
    /// selectable columns is always the defaults map, so a study cannot
    /// introduce a column that has no global default. Output is sorted by
    /// column header to keep listings stable across refreshes.
    pub fn all_metadata(
        &self,
        cancer_study: Option<&str>,
    ) -> Result<Vec<ClinicalAttributeMetadata>> {
        let snapshot = self.current_snapshot()?;
        let mut column_headers: Vec<String> = snapshot.column_headers().map(String::from).collect();
        column_headers.sort_unstable();
        self.resolve_in(&snapshot, cancer_study, &column_headers)
    }

    /// Every study known to the dictionary, sorted by name.
    pub fn cancer_studies(&self) -> Result<Vec<CancerStudy>> {
        let snapshot = self.current_snapshot()?;
        let mut names: Vec<&str> = snapshot.study_ids().collect();
        names.sort_unstable();
        Ok(names.into_iter().map(CancerStudy::new).collect())
    }

    /// Forces an immediate refresh and confirms the dictionary is usable
    /// afterwards.
    pub async fn force_refresh(&self) -> Result<()> {
        self.cache.refresh(true).await?;
        self.current_snapshot()?;
        Ok(())
    }

    fn resolve_in(
        &self,
        snapshot: &DictionarySnapshot,
        cancer_study: Option<&str>,
        column_headers: &[String],
    ) -> Result<Vec<ClinicalAttributeMetadata>> {
        if let Some(study_id) = cancer_study {
            if !snapshot.has_study(study_id) {
                return Err(DictionaryError::StudyNotFound(study_id.to_string()));
            }
        }
        let altered_default =
            cancer_study.is_some_and(|study_id| self.altered_default_studies.contains(study_id));

        let mut resolved = Vec::with_capacity(column_headers.len());
        let mut unknown = Vec::new();
        for column_header in column_headers {
            let Some(default) = snapshot.attribute(column_header) else {
                unknown.push(column_header.clone());
                continue;
            };
            let record = match cancer_study {
                None => default.clone(),
                Some(study_id) => match snapshot.override_for(study_id, column_header) {
                    Some(record) => record.clone(),
                    None if altered_default => default.with_priority("0"),
                    None => default.clone(),
                },
            };
            resolved.push(record);
        }
        if !unknown.is_empty() {
            return Err(DictionaryError::AttributeNotFound { names: unknown });
        }
        Ok(resolved)
    }
}
