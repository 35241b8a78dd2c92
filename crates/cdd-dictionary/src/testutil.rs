//! Scripted source and datasets for cache and resolver tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cdd_common::ClinicalAttributeMetadata;
use cdd_graphite::{ClinicalAttributeSource, SourceError};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Five default attributes, the fixture most tests start from.
pub(crate) fn primary_attributes() -> Vec<ClinicalAttributeMetadata> {
    vec![
        ClinicalAttributeMetadata::new(
            "AGE",
            "Diagnosis Age",
            "Age at which a condition or disease was first diagnosed.",
            "NUMBER",
            "PATIENT",
            "1",
        ),
        ClinicalAttributeMetadata::new(
            "LAST_STATUS",
            "Last Status",
            "Last Status.",
            "STRING",
            "PATIENT",
            "1",
        ),
        ClinicalAttributeMetadata::new(
            "DISEASE_STAGE",
            "Disease Stage",
            "Disease Stage.",
            "STRING",
            "SAMPLE",
            "1",
        ),
        ClinicalAttributeMetadata::new(
            "CLIN_M_STAGE",
            "Clinical M Stage",
            "Clinical M Stage.",
            "STRING",
            "SAMPLE",
            "1",
        ),
        ClinicalAttributeMetadata::new(
            "SAMPLE_TYPE",
            "Sample Type",
            "The type of sample.",
            "STRING",
            "SAMPLE",
            "1",
        ),
    ]
}

/// An override record as ingestion produces it: study id, column header, and
/// only the fields the override actually redefines.
pub(crate) fn override_record(
    study_id: &str,
    column_header: &str,
    priority: &str,
) -> ClinicalAttributeMetadata {
    ClinicalAttributeMetadata {
        column_header: column_header.to_string(),
        display_name: None,
        description: None,
        datatype: None,
        attribute_type: None,
        priority: Some(priority.to_string()),
        study_id: Some(study_id.to_string()),
    }
}

/// Overrides for two studies: one plain, one in the altered-default set.
pub(crate) fn primary_overrides() -> HashMap<String, Vec<ClinicalAttributeMetadata>> {
    HashMap::from([
        (
            "test_override_study".to_string(),
            vec![
                override_record("test_override_study", "AGE", "100"),
                override_record("test_override_study", "DISEASE_STAGE", "10"),
            ],
        ),
        (
            "mskimpact".to_string(),
            vec![override_record("mskimpact", "LAST_STATUS", "1")],
        ),
    ])
}

/// A smaller dictionary a later fetch might return.
pub(crate) fn updated_attributes() -> Vec<ClinicalAttributeMetadata> {
    vec![
        ClinicalAttributeMetadata::new(
            "AGE",
            "Diagnosis Age",
            "Age at which a condition or disease was first diagnosed.",
            "NUMBER",
            "PATIENT",
            "1",
        ),
        ClinicalAttributeMetadata::new(
            "LAST_STATUS",
            "Patient Last Status",
            "Last known status of the patient.",
            "STRING",
            "PATIENT",
            "1",
        ),
    ]
}

pub(crate) fn updated_overrides() -> HashMap<String, Vec<ClinicalAttributeMetadata>> {
    HashMap::from([(
        "updated_override_study".to_string(),
        vec![override_record("updated_override_study", "AGE", "5")],
    )])
}

#[derive(Clone, Copy)]
pub(crate) enum SourceMode {
    Working,
    Broken,
    Updated,
    /// Like `Working`, but `fetch_attributes` blocks until
    /// [`ScriptedSource::release_one`] is called.
    Stalled,
}

/// In-memory source whose behavior can be re-scripted mid-test.
pub(crate) struct ScriptedSource {
    mode: Mutex<SourceMode>,
    fetches: AtomicUsize,
    gate: Semaphore,
}

impl ScriptedSource {
    pub(crate) fn working() -> Self {
        Self::with_mode(SourceMode::Working)
    }

    pub(crate) fn broken() -> Self {
        Self::with_mode(SourceMode::Broken)
    }

    pub(crate) fn with_mode(mode: SourceMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            fetches: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub(crate) fn set_mode(&self, mode: SourceMode) {
        *self.mode.lock() = mode;
    }

    /// Number of `fetch_attributes` calls made so far.
    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Lets one stalled fetch proceed.
    pub(crate) fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ClinicalAttributeSource for ScriptedSource {
    async fn fetch_attributes(&self) -> Result<Vec<ClinicalAttributeMetadata>, SourceError> {
        let mode = *self.mode.lock();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match mode {
            SourceMode::Working => Ok(primary_attributes()),
            SourceMode::Updated => Ok(updated_attributes()),
            SourceMode::Broken => Err(SourceError::Unavailable("scripted outage".to_string())),
            SourceMode::Stalled => {
                self.gate.acquire().await.expect("gate closed").forget();
                Ok(primary_attributes())
            }
        }
    }

    async fn fetch_overrides(
        &self,
    ) -> Result<HashMap<String, Vec<ClinicalAttributeMetadata>>, SourceError> {
        match *self.mode.lock() {
            SourceMode::Working | SourceMode::Stalled => Ok(primary_overrides()),
            SourceMode::Updated => Ok(updated_overrides()),
            SourceMode::Broken => Err(SourceError::Unavailable("scripted outage".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
