//! Persistent attribute store backed by redb.

use std::collections::HashMap;
use std::path::PathBuf;

use cdd_common::ClinicalAttributeMetadata;
use redb::Database;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::tables::{ATTRIBUTES_KEY, METADATA_TABLE, OVERRIDES_KEY};

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Boxed because redb::TransactionError is large
impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Transaction(Box::new(err))
    }
}

/// Which persisted copy of the dictionary to touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Mirrors whatever the in-memory dictionary currently serves.
    Live,
    /// Written on a slower schedule; read only during cold-start recovery.
    Backup,
}

impl Region {
    fn file_name(self) -> &'static str {
        match self {
            Self::Live => "live.redb",
            Self::Backup => "backup.redb",
        }
    }
}

/// Persistent store for dictionary datasets, one redb database per region.
///
/// Databases are opened for the duration of a single call and closed on
/// return, so neither region holds a file lock while the service is idle.
pub struct AttributeStore {
    dir: PathBuf,
}

impl AttributeStore {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "attribute store ready");
        Ok(Self { dir })
    }

    fn region_path(&self, region: Region) -> PathBuf {
        self.dir.join(region.file_name())
    }

    /// Serializes `value` under `key` in the given region, replacing any
    /// previous value.
    fn put_json<T: Serialize>(
        &self,
        region: Region,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let db = Database::create(self.region_path(region))?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(METADATA_TABLE)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!(region = ?region, key, bytes = bytes.len(), "stored dataset");
        Ok(())
    }

    /// Reads and deserializes the value under `key`. Returns `None` when the
    /// region has never been written.
    fn get_json<T: DeserializeOwned>(
        &self,
        region: Region,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.region_path(region);
        if !path.exists() {
            return Ok(None);
        }
        let db = Database::open(path)?;
        let read_txn = db.begin_read()?;
        let table = match read_txn.open_table(METADATA_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(guard) = table.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(guard.value())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    /// Replaces the stored default attribute list in the given region.
    pub fn save_attributes(
        &self,
        region: Region,
        attributes: &[ClinicalAttributeMetadata],
    ) -> Result<(), StoreError> {
        self.put_json(region, ATTRIBUTES_KEY, &attributes)
    }

    /// Loads the stored default attribute list from the given region.
    pub fn load_attributes(
        &self,
        region: Region,
    ) -> Result<Option<Vec<ClinicalAttributeMetadata>>, StoreError> {
        self.get_json(region, ATTRIBUTES_KEY)
    }

    /// Replaces the stored per-study override map in the given region.
    pub fn save_overrides(
        &self,
        region: Region,
        overrides: &HashMap<String, Vec<ClinicalAttributeMetadata>>,
    ) -> Result<(), StoreError> {
        self.put_json(region, OVERRIDES_KEY, overrides)
    }

    /// Loads the stored per-study override map from the given region.
    pub fn load_overrides(
        &self,
        region: Region,
    ) -> Result<Option<HashMap<String, Vec<ClinicalAttributeMetadata>>>, StoreError> {
        self.get_json(region, OVERRIDES_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attributes() -> Vec<ClinicalAttributeMetadata> {
        vec![
            ClinicalAttributeMetadata::new(
                "AGE",
                "Diagnosis Age",
                "Age at diagnosis.",
                "NUMBER",
                "PATIENT",
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

    fn sample_overrides() -> HashMap<String, Vec<ClinicalAttributeMetadata>> {
        let mut record = ClinicalAttributeMetadata::new(
            "AGE",
            "Age",
            "Age of the patient.",
            "NUMBER",
            "PATIENT",
            "100",
        );
        record.study_id = Some("test_override_study".to_string());
        HashMap::from([("test_override_study".to_string(), vec![record])])
    }

    #[test]
    fn test_load_from_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttributeStore::new(dir.path()).unwrap();
        assert!(store.load_attributes(Region::Live).unwrap().is_none());
        assert!(store.load_overrides(Region::Backup).unwrap().is_none());
    }

    #[test]
    fn test_attributes_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttributeStore::new(dir.path()).unwrap();
        store
            .save_attributes(Region::Live, &sample_attributes())
            .unwrap();
        let loaded = store.load_attributes(Region::Live).unwrap().unwrap();
        assert_eq!(loaded, sample_attributes());
    }

    #[test]
    fn test_overrides_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttributeStore::new(dir.path()).unwrap();
        store
            .save_overrides(Region::Backup, &sample_overrides())
            .unwrap();
        let loaded = store.load_overrides(Region::Backup).unwrap().unwrap();
        assert_eq!(loaded, sample_overrides());
    }

    #[test]
    fn test_regions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttributeStore::new(dir.path()).unwrap();
        store
            .save_attributes(Region::Live, &sample_attributes())
            .unwrap();
        assert!(store.load_attributes(Region::Backup).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttributeStore::new(dir.path()).unwrap();
        store
            .save_attributes(Region::Live, &sample_attributes())
            .unwrap();
        let shorter = vec![sample_attributes().remove(0)];
        store.save_attributes(Region::Live, &shorter).unwrap();
        let loaded = store.load_attributes(Region::Live).unwrap().unwrap();
        assert_eq!(loaded, shorter);
    }

    #[test]
    fn test_reopened_store_sees_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AttributeStore::new(dir.path()).unwrap();
            store
                .save_attributes(Region::Live, &sample_attributes())
                .unwrap();
        }
        let store = AttributeStore::new(dir.path()).unwrap();
        let loaded = store.load_attributes(Region::Live).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
