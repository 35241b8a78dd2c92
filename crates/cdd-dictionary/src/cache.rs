//! Refreshable metadata cache.
//!
//! Owns the current [`DictionarySnapshot`] and the refresh/expiry state
//! machine around it. Every successful refresh replaces the snapshot
//! wholesale and clears the failure counter; failed refreshes are tolerated
//! up to [`MAX_CONSECUTIVE_FAILURES`] in a row before the dictionary is
//! dropped and readers start failing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use cdd_common::{ClinicalAttributeMetadata, DictionaryError};
use cdd_graphite::{ClinicalAttributeSource, SourceError};
use cdd_store::{AttributeStore, Region};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::snapshot::DictionarySnapshot;

/// How many consecutive refresh failures are tolerated while the previous
/// dictionary keeps being served. One more failure drops it.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Cache of the dictionary datasets, refreshed from a
/// [`ClinicalAttributeSource`].
///
/// Readers take the current snapshot with [`MetadataCache::snapshot`] and
/// resolve against that; installation of a new snapshot is a single pointer
/// swap, so a reader can never observe the defaults of one fetch paired with
/// the overrides of another.
pub struct MetadataCache {
    source: Arc<dyn ClinicalAttributeSource>,
    store: Option<Arc<AttributeStore>>,
    snapshot: RwLock<Option<Arc<DictionarySnapshot>>>,
    consecutive_failures: AtomicU32,
    version: AtomicU64,
    backup_recovery_attempted: AtomicBool,
    /// Serializes refreshes; holders fetch and install one at a time.
    refresh_lock: Mutex<()>,
}

impl MetadataCache {
    /// Creates an empty cache. Nothing can be served until the first
    /// successful [`MetadataCache::refresh`].
    #[must_use]
    pub fn new(source: Arc<dyn ClinicalAttributeSource>) -> Self {
        Self {
            source,
            store: None,
            snapshot: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            version: AtomicU64::new(0),
            backup_recovery_attempted: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Attaches persistent storage. Successful refreshes are mirrored into
    /// the live region, and a cold start with an unreachable source can be
    /// recovered from the backup region.
    #[must_use]
    pub fn with_store(mut self, store: Arc<AttributeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current snapshot, or `None` when the dictionary is invalid.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<DictionarySnapshot>> {
        self.snapshot.read().clone()
    }

    /// Whether reads can currently be served.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.snapshot.read().is_some()
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Refreshes the dictionary from the source.
    ///
    /// At most one refresh runs at a time. A non-forced call that finds
    /// another refresh in flight returns immediately; a forced call waits
    /// its turn and then performs its own fetch.
    ///
    /// A fetch failure is absorbed into the failure counter (the previous
    /// snapshot stays up until the counter passes
    /// [`MAX_CONSECUTIVE_FAILURES`]) and also reported to the caller, so an
    /// explicit refresh request can tell its initiator the source is down.
    pub async fn refresh(&self, force: bool) -> Result<(), DictionaryError> {
        let _guard = if force {
            self.refresh_lock.lock().await
        } else {
            match self.refresh_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("refresh already in flight, skipping");
                    return Ok(());
                }
            }
        };

        match self.fetch_datasets().await {
            Ok((attributes, overrides)) => {
                self.install(attributes, overrides);
                Ok(())
            }
            Err(e) => {
                self.note_failure(&e);
                Err(DictionaryError::SourceUnavailable(e.to_string()))
            }
        }
    }

    /// Persists the currently served datasets to the backup region. A no-op
    /// when the dictionary is invalid or no store is attached.
    pub fn backup(&self) {
        let Some(store) = &self.store else { return };
        let Some(snapshot) = self.snapshot() else {
            debug!("skipping backup, no dictionary to persist");
            return;
        };
        let (attributes, overrides) = snapshot.to_datasets();
        if let Err(e) = store.save_attributes(Region::Backup, &attributes) {
            error!(error = %e, "failed to persist attributes to backup region");
            return;
        }
        if let Err(e) = store.save_overrides(Region::Backup, &overrides) {
            error!(error = %e, "failed to persist overrides to backup region");
            return;
        }
        info!(version = snapshot.version(), "dictionary backed up");
    }

    async fn fetch_datasets(
        &self,
    ) -> Result<
        (
            Vec<ClinicalAttributeMetadata>,
            HashMap<String, Vec<ClinicalAttributeMetadata>>,
        ),
        SourceError,
    > {
        let attributes = self.source.fetch_attributes().await?;
        let overrides = self.source.fetch_overrides().await?;
        Ok((attributes, overrides))
    }

    /// Builds and swaps in a snapshot from freshly fetched datasets, and
    /// mirrors them into the live region. The in-memory dictionary is
    /// authoritative; a persistence failure is logged and swallowed.
    fn install(
        &self,
        attributes: Vec<ClinicalAttributeMetadata>,
        overrides: HashMap<String, Vec<ClinicalAttributeMetadata>>,
    ) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_attributes(Region::Live, &attributes) {
                error!(error = %e, "failed to persist attributes to live region");
            }
            if let Err(e) = store.save_overrides(Region::Live, &overrides) {
                error!(error = %e, "failed to persist overrides to live region");
            }
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = DictionarySnapshot::build(attributes, overrides, version);
        info!(
            version,
            attributes = snapshot.attribute_count(),
            studies = snapshot.study_count(),
            source = self.source.name(),
            "dictionary refreshed"
        );
        *self.snapshot.write() = Some(Arc::new(snapshot));
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    fn note_failure(&self, error: &SourceError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > MAX_CONSECUTIVE_FAILURES {
            warn!(
                failures,
                error = %error,
                "dictionary refresh failed, dropping expired dictionary"
            );
            *self.snapshot.write() = None;
        } else {
            warn!(
                failures,
                error = %error,
                "dictionary refresh failed, keeping current dictionary"
            );
        }
        // One recovery read per process, only when nothing is being served.
        // In practice this is a cold start with the source down.
        if self.snapshot.read().is_none()
            && !self.backup_recovery_attempted.swap(true, Ordering::SeqCst)
        {
            self.restore_from_backup();
        }
    }

    /// Loads both datasets from the backup region and serves them. The
    /// failure counter is left alone: the source is still unreachable and a
    /// restored dictionary must not extend the expiry window.
    fn restore_from_backup(&self) {
        let Some(store) = &self.store else { return };
        let attributes = match store.load_attributes(Region::Backup) {
            Ok(Some(attributes)) => attributes,
            Ok(None) => {
                info!("backup region is empty, nothing to restore");
                return;
            }
            Err(e) => {
                error!(error = %e, "failed to read attributes from backup region");
                return;
            }
        };
        let overrides = match store.load_overrides(Region::Backup) {
            Ok(Some(overrides)) => overrides,
            Ok(None) => {
                info!("backup region has no overrides, nothing to restore");
                return;
            }
            Err(e) => {
                error!(error = %e, "failed to read overrides from backup region");
                return;
            }
        };
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = DictionarySnapshot::build(attributes, overrides, version);
        info!(
            version,
            attributes = snapshot.attribute_count(),
            studies = snapshot.study_count(),
            "dictionary restored from backup region"
        );
        *self.snapshot.write() = Some(Arc::new(snapshot));
    }
}
